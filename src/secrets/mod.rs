pub mod error;
pub mod store;

pub use error::SecretsError;
pub use store::SecretStore;
