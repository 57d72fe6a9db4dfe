//! Normalized interface model shared by both analyzer backends.

mod client;
mod types;

pub use client::ClientModel;
pub use types::*;
