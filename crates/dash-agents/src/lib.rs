pub mod adapter;
pub mod error;
pub mod prompt;
pub mod types;

pub use adapter::*;
pub use error::*;
pub use prompt::*;
pub use types::*;
