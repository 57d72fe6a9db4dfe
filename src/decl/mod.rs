//! Declaration vocabulary and literal decoding.

mod decode;
mod types;

pub use decode::*;
pub use types::*;
