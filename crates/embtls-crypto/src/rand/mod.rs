//! Randomness source used for nonces, padding and ephemeral keys.

use embtls_types::CryptoError;

/// A source of cryptographically secure random bytes.
///
/// Shared between connections, so implementations must tolerate concurrent
/// calls.
pub trait RandomSource: Send + Sync {
    fn fill(&self, buf: &mut [u8]) -> Result<(), CryptoError>;
}

/// The operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<(), CryptoError> {
        getrandom::getrandom(buf).map_err(|_| CryptoError::RngFail)
    }
}

/// Fill `buf` with random bytes none of which is zero.
pub fn fill_nonzero(rng: &dyn RandomSource, buf: &mut [u8]) -> Result<(), CryptoError> {
    rng.fill(buf)?;
    let mut byte = [0u8; 1];
    for slot in buf.iter_mut() {
        while *slot == 0 {
            rng.fill(&mut byte)?;
            *slot = byte[0];
        }
    }
    Ok(())
}
