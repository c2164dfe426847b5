pub mod ident;
pub mod scenario;
pub mod types;

pub use ident::*;
pub use scenario::*;
pub use types::*;
