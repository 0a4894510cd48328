pub mod loader;
pub mod models;
pub mod secrets;
pub mod validation;

pub use loader::load_config;
pub use models::*;
pub use secrets::resolve_secret;
pub use validation::{ServerConfigValidator, ValidationError, ValidationResult};
