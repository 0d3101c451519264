pub mod api;
pub mod reader;
pub mod session;

pub use session::{ClientOptions, ReadingOptions, UteClient};
