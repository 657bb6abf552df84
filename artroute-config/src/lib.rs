//! Configuration library for artroute.
//!
//! Settings are layered from built-in defaults, an optional TOML file, the
//! process environment (optionally seeded from a `.env` file), and finally
//! any CLI overrides the binary applies on top of the loaded [`Config`].
//! Non-fatal findings are reported as [`ConfigWarnings`] rather than logged
//! here, so the caller decides when logging is ready.

pub mod loader;
pub mod models;
pub mod sources;
pub mod util;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{
    Config, ConfigMetadata, KubernetesConfig, RegistryConfig, ServerConfig,
    SqsConfig, TlsConfig,
};
pub use validation::{ConfigWarning, ConfigWarnings};
