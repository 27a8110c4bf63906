pub mod client;
pub mod error;
pub mod types;

pub use client::{ZohoConfig, ZohoMailClient};
pub use error::{ZohoError, ZohoResult};
pub use types::*;
