pub mod configuration;
pub mod error;
pub mod handlers;
pub mod models;

pub use error::{Result, UteError};
pub use handlers::ute::{ClientOptions, ReadingOptions, UteClient};
pub use models::snapshot::AccountSnapshot;
