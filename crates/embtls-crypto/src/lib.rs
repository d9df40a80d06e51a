#![forbid(unsafe_code)]
#![doc = "Public-key engines and primitive plumbing for embtls."]
//!
//! Digests and bulk ciphers come from RustCrypto; this crate selects them by
//! algorithm id and adds the pieces the TLS engine builds on: CBC chaining
//! with carried IV state, PKCS#1 v1.5 RSA, and Diffie-Hellman.

pub mod cipher;
pub mod dhm;
pub mod hash;
pub mod hmac;
pub mod rand;
pub mod rsa;

pub use rand::{OsRandom, RandomSource};
