pub mod constants;
pub mod errors;
pub mod protocol;
pub mod types;

pub use constants::*;
pub use errors::DecodeError;
pub use protocol::*;
pub use types::*;
