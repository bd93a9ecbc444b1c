pub mod error;
pub mod loader;
pub mod profiles;
pub mod raw;

pub use error::ConfigError;
pub use loader::{load, ControllerConfig};
pub use profiles::load_profiles;
