pub mod error;
pub mod value;

pub use error::{Result, VaultError};
pub use value::{DataType, Value};
