//! Process-wide environment configuration store.
//!
//! The playout server reads a single XML configuration document at startup
//! and derives its filesystem layout from it: where media, logs, templates,
//! data, fonts, and thumbnails live.  [`configure`] performs that load
//! exactly once; every other component then reads the resolved folders
//! through the accessors in this module.
//!
//! Two API layers are provided:
//!
//! - [`Environment`] – an explicit configuration object.  [`Environment::load`]
//!   builds one from a base directory and file name with no global state,
//!   which is what unit and integration tests use.
//! - Free functions ([`configure`], [`media_folder`], …) – the process-wide
//!   store backed by a [`OnceCell`].  The Unconfigured → Configured
//!   transition happens once and never reverses; accessors fail with
//!   [`EnvError::NotConfigured`] until it has happened.
//!
//! # Failure policy
//!
//! Only an unreadable or malformed configuration document aborts startup.
//! Filesystem side effects – copying template hosts, creating the configured
//! directories – are best-effort: each failure is logged, recorded as a
//! [`SetupWarning`] on the environment, and swallowed.  The one special case
//! is the log directory, which silently downgrades to [`LOG_DIR_FALLBACK`]
//! when it cannot be created so that logging never blocks startup.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::tree::{ParseError, PropertyTree, ReadOptions};

/// In-memory replacement for the log path when the configured log directory
/// cannot be created.
pub const LOG_DIR_FALLBACK: &str = "./";

/// Substring marking a file in the base directory as a template host,
/// eligible for migration into the template directory at configure time.
const TEMPLATE_HOST_MARKER: &str = ".fth";

static ENVIRONMENT: OnceCell<Environment> = OnceCell::new();

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors surfaced by [`configure`] and the environment accessors.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The configuration file could not be opened or read.
    #[error("configuration file {} could not be read: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration file is not a well-formed document.
    #[error("configuration file {} is malformed: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    /// The document has no `configuration.paths` section.
    #[error("configuration file {} has no configuration.paths section", .path.display())]
    MissingPaths { path: PathBuf },

    /// An accessor was called before [`configure`] completed.
    #[error("environment properties have not been configured")]
    NotConfigured,

    /// [`configure`] was called after the environment was already configured.
    #[error("environment is already configured")]
    AlreadyConfigured,
}

// ── Path roles ────────────────────────────────────────────────────────────────

/// The six directory settings managed by the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRole {
    Media,
    Log,
    Template,
    Data,
    Font,
    Thumbnails,
}

impl PathRole {
    /// The key under `configuration.paths` holding this setting.
    pub fn key(self) -> &'static str {
        match self {
            PathRole::Media => "media-path",
            PathRole::Log => "log-path",
            PathRole::Template => "template-path",
            PathRole::Data => "data-path",
            PathRole::Font => "font-path",
            PathRole::Thumbnails => "thumbnails-path",
        }
    }

    /// Directory name under the base directory used when the key is absent.
    /// Thumbnails share the data directory by default.
    fn default_dir(self) -> &'static str {
        match self {
            PathRole::Media => "media",
            PathRole::Log => "log",
            PathRole::Template => "template",
            PathRole::Data => "data",
            PathRole::Font => "fonts",
            PathRole::Thumbnails => "data",
        }
    }
}

impl fmt::Display for PathRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PathRole::Media => "media",
            PathRole::Log => "log",
            PathRole::Template => "template",
            PathRole::Data => "data",
            PathRole::Font => "font",
            PathRole::Thumbnails => "thumbnails",
        };
        f.write_str(name)
    }
}

// ── Setup warnings ────────────────────────────────────────────────────────────

/// A non-fatal failure recorded while provisioning the environment.
///
/// Warnings are logged at the point of occurrence and kept on the
/// [`Environment`] so callers can inspect what was skipped without any
/// error-based control flow.
#[derive(Debug, Error)]
pub enum SetupWarning {
    /// The base directory could not be scanned for template hosts.
    #[error("could not scan {} for template hosts: {source}", .dir.display())]
    TemplateScan {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A template host could not be copied into the template directory.
    #[error("could not copy template host {} to {}: {source}", .from.display(), .to.display())]
    TemplateCopy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A configured directory could not be created.
    #[error("could not create {role} directory {path}: {source}")]
    CreateDir {
        role: PathRole,
        path: String,
        #[source]
        source: io::Error,
    },

    /// The log directory could not be created; the in-memory log path was
    /// downgraded to [`LOG_DIR_FALLBACK`].
    #[error("could not create log directory {attempted}: {source}; falling back to ./")]
    LogFallback {
        attempted: String,
        #[source]
        source: io::Error,
    },
}

// ── Resolved path set ─────────────────────────────────────────────────────────

/// The six resolved directory strings.  Invariant: every value ends with
/// exactly one trailing separator.
#[derive(Debug, Clone)]
struct PathSet {
    media: String,
    log: String,
    template: String,
    data: String,
    font: String,
    thumbnails: String,
}

impl PathSet {
    fn get(&self, role: PathRole) -> &str {
        match role {
            PathRole::Media => &self.media,
            PathRole::Log => &self.log,
            PathRole::Template => &self.template,
            PathRole::Data => &self.data,
            PathRole::Font => &self.font,
            PathRole::Thumbnails => &self.thumbnails,
        }
    }

    fn from_document(properties: &PropertyTree, base_dir: &Path) -> Option<Self> {
        let paths = properties.get_child("configuration.paths")?;

        let read = |role: PathRole| -> String {
            let default = base_dir
                .join(role.default_dir())
                .to_string_lossy()
                .into_owned();
            paths.get_or(role.key(), &default)
        };

        Some(Self {
            media: normalize_dir(read(PathRole::Media)),
            log: normalize_dir(read(PathRole::Log)),
            // The template path is the only one resolved to an absolute
            // form, since template hosts are copied into it by path string.
            template: normalize_dir(absolutize(read(PathRole::Template), base_dir)),
            data: normalize_dir(read(PathRole::Data)),
            font: normalize_dir(read(PathRole::Font)),
            thumbnails: normalize_dir(read(PathRole::Thumbnails)),
        })
    }
}

/// Reduces any run of trailing `/` to exactly one, appending one when the
/// path ends without a separator.  A trailing `\` from a Windows-style value
/// is left as-is.
fn normalize_dir(mut path: String) -> String {
    while path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    if !path.ends_with('/') && !path.ends_with('\\') {
        path.push('/');
    }
    path
}

/// Resolves `path` against `base_dir` unless it is already absolute.
fn absolutize(path: String, base_dir: &Path) -> String {
    if Path::new(&path).is_absolute() {
        path
    } else {
        base_dir.join(&path).to_string_lossy().into_owned()
    }
}

// ── Environment ───────────────────────────────────────────────────────────────

/// A fully loaded environment configuration.
///
/// Construction implies a successfully parsed document, so every accessor
/// here is total; the "not configured" failure mode exists only on the
/// process-wide free functions.
#[derive(Debug)]
pub struct Environment {
    initial: PathBuf,
    paths: PathSet,
    properties: PropertyTree,
    warnings: Vec<SetupWarning>,
}

impl Environment {
    /// Loads `base_dir/filename`, resolves and normalizes the six directory
    /// settings, migrates template hosts, and provisions the configured
    /// directories.
    ///
    /// Filesystem side effects are best-effort and reported through
    /// [`Environment::warnings`]; only reading or parsing the document can
    /// fail.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::Read`], [`EnvError::Malformed`], or
    /// [`EnvError::MissingPaths`] when the configuration document is
    /// unusable.  The failure is logged at error level before it propagates.
    pub fn load(base_dir: &Path, filename: &str) -> Result<Self, EnvError> {
        let config_path = base_dir.join(filename);
        match Self::load_inner(base_dir, &config_path) {
            Ok(environment) => Ok(environment),
            Err(err) => {
                error!("invalid configuration file: {err}");
                Err(err)
            }
        }
    }

    fn load_inner(base_dir: &Path, config_path: &Path) -> Result<Self, EnvError> {
        let text = fs::read_to_string(config_path).map_err(|source| EnvError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;

        let properties = PropertyTree::from_xml_str(&text, ReadOptions::default()).map_err(
            |source| EnvError::Malformed {
                path: config_path.to_path_buf(),
                source,
            },
        )?;

        let paths = PathSet::from_document(&properties, base_dir).ok_or_else(|| {
            EnvError::MissingPaths {
                path: config_path.to_path_buf(),
            }
        })?;

        let mut environment = Self {
            initial: base_dir.to_path_buf(),
            paths,
            properties,
            warnings: Vec::new(),
        };
        environment.migrate_template_hosts();
        environment.provision_directories();
        Ok(environment)
    }

    /// Copies every template host found in the base directory into the
    /// template directory, replacing existing destination files.
    ///
    /// Runs before directory provisioning, so when the template directory
    /// does not exist yet the copies fail and are recorded as warnings; the
    /// directory is then created empty by the provisioning step.
    fn migrate_template_hosts(&mut self) {
        let entries = match fs::read_dir(&self.initial) {
            Ok(entries) => entries,
            Err(source) => {
                self.record(SetupWarning::TemplateScan {
                    dir: self.initial.clone(),
                    source,
                });
                return;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) => {
                    self.record(SetupWarning::TemplateScan {
                        dir: self.initial.clone(),
                        source,
                    });
                    return;
                }
            };

            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.contains(TEMPLATE_HOST_MARKER) {
                continue;
            }
            if !entry.file_type().map(|kind| kind.is_file()).unwrap_or(false) {
                continue;
            }

            let from = entry.path();
            let to = PathBuf::from(format!("{}{name}", self.paths.template));
            match copy_replacing(&from, &to) {
                Ok(()) => debug!("copied template host {} to {}", from.display(), to.display()),
                Err(source) => self.record(SetupWarning::TemplateCopy { from, to, source }),
            }
        }
    }

    /// Creates each configured directory that does not exist yet.
    ///
    /// Every directory is attempted independently; a failure on one never
    /// prevents attempts on the others.  The log directory is special-cased:
    /// on failure the in-memory log path downgrades to [`LOG_DIR_FALLBACK`]
    /// so that logging stays possible somewhere.
    fn provision_directories(&mut self) {
        let log_dir = PathBuf::from(&self.paths.log);
        if !log_dir.exists() {
            if let Err(source) = fs::create_dir_all(&log_dir) {
                self.record(SetupWarning::LogFallback {
                    attempted: self.paths.log.clone(),
                    source,
                });
                self.paths.log = LOG_DIR_FALLBACK.to_string();
            }
        }

        for role in [
            PathRole::Media,
            PathRole::Template,
            PathRole::Data,
            PathRole::Font,
            PathRole::Thumbnails,
        ] {
            let path = self.paths.get(role).to_string();
            if Path::new(&path).exists() {
                continue;
            }
            if let Err(source) = fs::create_dir_all(Path::new(&path)) {
                self.record(SetupWarning::CreateDir { role, path, source });
            }
        }
    }

    fn record(&mut self, warning: SetupWarning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    /// The base directory the configuration file name and all path defaults
    /// were resolved against.
    pub fn initial_folder(&self) -> &Path {
        &self.initial
    }

    /// The resolved media directory, trailing-separator-terminated.
    pub fn media_folder(&self) -> &str {
        &self.paths.media
    }

    /// The resolved log directory.  [`LOG_DIR_FALLBACK`] when the configured
    /// directory could not be created.
    pub fn log_folder(&self) -> &str {
        &self.paths.log
    }

    /// The resolved template directory, always absolute.
    pub fn template_folder(&self) -> &str {
        &self.paths.template
    }

    /// The resolved data directory.
    pub fn data_folder(&self) -> &str {
        &self.paths.data
    }

    /// The resolved font directory.
    pub fn font_folder(&self) -> &str {
        &self.paths.font
    }

    /// The resolved thumbnail directory.  Defaults to the data directory.
    pub fn thumbnails_folder(&self) -> &str {
        &self.paths.thumbnails
    }

    /// The directory for the given role.
    pub fn folder(&self, role: PathRole) -> &str {
        self.paths.get(role)
    }

    /// The whole parsed configuration document, for generic lookups by other
    /// components.  Every node of the source document is present.
    pub fn properties(&self) -> &PropertyTree {
        &self.properties
    }

    /// Non-fatal failures recorded while migrating template hosts and
    /// creating directories, in order of occurrence.
    pub fn warnings(&self) -> &[SetupWarning] {
        &self.warnings
    }
}

/// Deletes `to` when it already exists, then copies `from` over.
fn copy_replacing(from: &Path, to: &Path) -> io::Result<()> {
    if to.exists() {
        fs::remove_file(to)?;
    }
    fs::copy(from, to)?;
    Ok(())
}

// ── Process-wide store ────────────────────────────────────────────────────────

/// Loads the configuration file named `filename`, resolved against the
/// process current directory, and installs it as the process-wide
/// environment.
///
/// Expected to be called exactly once, before other components start.  The
/// `OnceCell` guards the Unconfigured → Configured transition, so a second
/// call – concurrent or sequential – fails with
/// [`EnvError::AlreadyConfigured`] and leaves the first configuration
/// visible.
///
/// # Errors
///
/// Propagates the [`Environment::load`] errors, plus
/// [`EnvError::AlreadyConfigured`] on repeated calls.  A failure to
/// determine the current directory is reported as [`EnvError::Read`].
pub fn configure(filename: &str) -> Result<(), EnvError> {
    if ENVIRONMENT.get().is_some() {
        return Err(EnvError::AlreadyConfigured);
    }

    let base_dir = std::env::current_dir().map_err(|source| EnvError::Read {
        path: PathBuf::from(filename),
        source,
    })?;

    let environment = Environment::load(&base_dir, filename)?;
    ENVIRONMENT
        .set(environment)
        .map_err(|_| EnvError::AlreadyConfigured)?;

    info!(
        "environment configured from {}",
        base_dir.join(filename).display()
    );
    Ok(())
}

/// The process-wide environment.
///
/// # Errors
///
/// [`EnvError::NotConfigured`] until [`configure`] has succeeded.
pub fn environment() -> Result<&'static Environment, EnvError> {
    ENVIRONMENT.get().ok_or(EnvError::NotConfigured)
}

/// Process-wide accessor for [`Environment::media_folder`].
pub fn media_folder() -> Result<&'static str, EnvError> {
    Ok(environment()?.media_folder())
}

/// Process-wide accessor for [`Environment::log_folder`].
pub fn log_folder() -> Result<&'static str, EnvError> {
    Ok(environment()?.log_folder())
}

/// Process-wide accessor for [`Environment::template_folder`].
pub fn template_folder() -> Result<&'static str, EnvError> {
    Ok(environment()?.template_folder())
}

/// Process-wide accessor for [`Environment::data_folder`].
pub fn data_folder() -> Result<&'static str, EnvError> {
    Ok(environment()?.data_folder())
}

/// Process-wide accessor for [`Environment::font_folder`].
pub fn font_folder() -> Result<&'static str, EnvError> {
    Ok(environment()?.font_folder())
}

/// Process-wide accessor for [`Environment::thumbnails_folder`].
pub fn thumbnails_folder() -> Result<&'static str, EnvError> {
    Ok(environment()?.thumbnails_folder())
}

/// Process-wide accessor for [`Environment::properties`].
pub fn properties() -> Result<&'static PropertyTree, EnvError> {
    Ok(environment()?.properties())
}

/// Process-wide accessor for [`Environment::initial_folder`].
pub fn initial_folder() -> Result<&'static Path, EnvError> {
    Ok(environment()?.initial_folder())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Filesystem-touching scenarios live in tests/; these cover the pure
    // resolution helpers.

    #[test]
    fn test_normalize_appends_missing_separator() {
        assert_eq!(normalize_dir("/srv/media".to_string()), "/srv/media/");
        assert_eq!(normalize_dir("relative/dir".to_string()), "relative/dir/");
    }

    #[test]
    fn test_normalize_keeps_single_separator() {
        assert_eq!(normalize_dir("/srv/media/".to_string()), "/srv/media/");
    }

    #[test]
    fn test_normalize_collapses_repeated_separators() {
        assert_eq!(normalize_dir("/srv/media///".to_string()), "/srv/media/");
    }

    #[test]
    fn test_normalize_keeps_root() {
        assert_eq!(normalize_dir("/".to_string()), "/");
    }

    #[test]
    fn test_normalize_accepts_backslash_terminated_values() {
        assert_eq!(normalize_dir("C:\\media\\".to_string()), "C:\\media\\");
    }

    #[test]
    fn test_absolutize_keeps_absolute_paths() {
        let base = Path::new("/opt/onair");
        assert_eq!(absolutize("/srv/template".to_string(), base), "/srv/template");
    }

    #[test]
    fn test_absolutize_resolves_relative_against_base() {
        let base = Path::new("/opt/onair");
        assert_eq!(
            absolutize("template".to_string(), base),
            Path::new("/opt/onair")
                .join("template")
                .to_string_lossy()
                .into_owned()
        );
    }

    #[test]
    fn test_path_role_keys_match_document_shape() {
        assert_eq!(PathRole::Media.key(), "media-path");
        assert_eq!(PathRole::Thumbnails.key(), "thumbnails-path");
    }
}
