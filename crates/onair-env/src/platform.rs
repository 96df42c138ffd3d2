//! Platform-dependent defaults.

/// The operating system's shared font directory.
///
/// Detected per compile target rather than assuming one operating system;
/// platforms without a conventional system font location fall back to a
/// `fonts` directory under the current directory.  Pure, trailing-separator-
/// terminated, and independent of the configured environment.
pub fn system_font_folder() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        "C:\\Windows\\Fonts\\"
    }

    #[cfg(target_os = "macos")]
    {
        "/Library/Fonts/"
    }

    #[cfg(target_os = "linux")]
    {
        "/usr/share/fonts/"
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        "./fonts/"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_font_folder_ends_with_separator() {
        let folder = system_font_folder();

        assert!(!folder.is_empty());
        assert!(
            folder.ends_with('/') || folder.ends_with('\\'),
            "font folder must end with a separator, got {folder}"
        );
    }
}
