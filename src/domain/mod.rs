mod error;
mod expense;
mod invoice;
mod product;
pub mod recycle;
mod returns;

pub use error::*;
pub use expense::*;
pub use invoice::*;
pub use product::*;
pub use returns::*;
