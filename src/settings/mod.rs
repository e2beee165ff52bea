//! Settings for the store itself.
//!
//! # Data Flow
//! ```text
//! live-config.toml
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → StoreSettings (immutable)
//!     → ConfigStore::new
//! ```
//!
//! # Design Decisions
//! - Every field has a default, so an empty file is a valid configuration
//! - Validation separates syntactic (serde) from semantic checks
//! - Unlike managed documents, the settings file is never written back

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_settings, parse_settings, SettingsError};
pub use schema::{
    BindingSettings, DocumentSettings, LogFormat, LoggingSettings, ObservabilitySettings, StoreSettings,
    WatchSettings,
};
pub use validation::{validate_settings, ValidationError};
