#![forbid(unsafe_code)]
#![doc = "Error types, certificate verification flags and algorithm identifiers shared by the embtls crates."]

pub mod algorithm;
pub mod error;
pub mod verify;

pub use algorithm::*;
pub use error::*;
pub use verify::VerifyFlags;
