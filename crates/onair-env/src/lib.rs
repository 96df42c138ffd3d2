//! # onair-env
//!
//! Environment configuration store for the OnAir playout server.
//!
//! The server derives its filesystem layout – media, log, template, data,
//! font, and thumbnail directories – from a single XML configuration
//! document read once at startup.  This crate owns that bootstrap step and
//! exposes the resolved settings to every other component.
//!
//! # Startup sequence
//!
//! ```text
//! main()
//!  └─ env::configure("onair.config")
//!       ├─ parse the document into a PropertyTree   (fatal on failure)
//!       ├─ resolve + normalize the six directories  (defaults under cwd)
//!       ├─ migrate *.fth template hosts             (best-effort)
//!       └─ create missing directories               (best-effort)
//!  └─ env::media_folder() / env::properties() / ...  from anywhere
//! ```
//!
//! Accessors fail with [`EnvError::NotConfigured`] until `configure` has
//! succeeded; after that the environment is immutable for the process
//! lifetime.  For code that should not touch process-wide state – tests in
//! particular – [`Environment::load`] builds the same configuration as an
//! explicit object.

pub mod env;
pub mod platform;
pub mod tree;
pub mod version;

// Re-export the startup entry point and the read surface at the crate root
// so callers can write `onair_env::media_folder()`.
pub use env::{
    configure, data_folder, environment, font_folder, initial_folder, log_folder, media_folder,
    properties, template_folder, thumbnails_folder, EnvError, Environment, PathRole, SetupWarning,
    LOG_DIR_FALLBACK,
};
pub use platform::system_font_folder;
pub use tree::{ParseError, PropertyTree, ReadOptions};
pub use version::version;
