#![forbid(unsafe_code)]
#![doc = "X.509 certificate parsing, chain verification and RSA private key files for embtls."]

pub mod key;
pub mod x509;

pub use key::{load_rsa_private_key, parse_rsa_private_key};
pub use x509::Certificate;
