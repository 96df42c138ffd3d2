//! Build version identifier.
//!
//! The server reports its version as four components plus a release tag,
//! in the fixed format `"<generation>.<major>.<minor>.<revision> <tag>"`.
//! The string is assembled once per process and is independent of
//! [`configure`](crate::env::configure).

use once_cell::sync::Lazy;

// ── Build identifier components ───────────────────────────────────────────────

/// Product generation.  Bumped only for ground-up reworks.
pub const GENERATION: u32 = 1;

/// Major feature release within the current generation.
pub const MAJOR: u32 = 2;

/// Backwards-compatible update level.
pub const MINOR: u32 = 0;

/// Source revision, stamped by release tooling through the `ONAIR_REV`
/// build environment variable.  `"0"` for local builds.
pub const REVISION: &str = match option_env!("ONAIR_REV") {
    Some(revision) => revision,
    None => "0",
};

/// Release tag appended after the numeric components.
pub const TAG: &str = "Beta";

static VERSION: Lazy<String> =
    Lazy::new(|| format!("{GENERATION}.{MAJOR}.{MINOR}.{REVISION} {TAG}"));

/// The full build identifier, e.g. `"1.2.0.0 Beta"`.
///
/// Computed on first use and cached for the process lifetime; repeated calls
/// return the same string.
pub fn version() -> &'static str {
    VERSION.as_str()
}
