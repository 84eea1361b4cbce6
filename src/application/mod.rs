pub mod error;
pub mod reporting;
pub mod service;

pub use error::*;
pub use service::*;
