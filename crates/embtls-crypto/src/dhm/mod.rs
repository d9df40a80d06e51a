//! Diffie-Hellman over a prime field, as used by the EDH cipher suites.
//!
//! The ServerKeyExchange wire form of the parameters is three
//! length-prefixed big-endian integers: `P`, `G` and the sender's public
//! value.

mod groups;

pub use groups::DhmGroup;

use crate::rand::RandomSource;
use embtls_types::CryptoError;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use zeroize::Zeroizing;

/// Accepted modulus sizes in bytes.
pub const MIN_PRIME_LEN: usize = 64;
pub const MAX_PRIME_LEN: usize = 256;

/// A Diffie-Hellman exchange in progress.
pub struct DhmContext {
    p: BigUint,
    g: BigUint,
    /// Own private exponent.
    x: BigUint,
    /// Own public value `G^X mod P`.
    gx: BigUint,
    /// Peer public value.
    gy: BigUint,
}

impl std::fmt::Debug for DhmContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DhmContext")
            .field("prime_len", &self.len())
            .finish()
    }
}

impl Drop for DhmContext {
    fn drop(&mut self) {
        self.x.set_zero();
    }
}

impl DhmContext {
    /// Start from explicit big-endian `P` and `G`.
    pub fn new(p: &[u8], g: &[u8]) -> Result<Self, CryptoError> {
        Self::from_parts(BigUint::from_bytes_be(p), BigUint::from_bytes_be(g))
    }

    pub fn from_group(group: DhmGroup) -> Result<Self, CryptoError> {
        let p = BigUint::parse_bytes(group.prime_hex().as_bytes(), 16)
            .ok_or(CryptoError::DhmBadInputData)?;
        Self::from_parts(p, BigUint::from(2u32))
    }

    fn from_parts(p: BigUint, g: BigUint) -> Result<Self, CryptoError> {
        let len = (p.bits() as usize).div_ceil(8);
        if !(MIN_PRIME_LEN..=MAX_PRIME_LEN).contains(&len) {
            return Err(CryptoError::DhmInvalidModulusSize(len));
        }
        if g <= BigUint::one() || g >= p {
            return Err(CryptoError::DhmBadInputData);
        }
        Ok(Self {
            p,
            g,
            x: BigUint::zero(),
            gx: BigUint::zero(),
            gy: BigUint::zero(),
        })
    }

    /// Parse `P`, `G` and the peer public value from their 2-byte
    /// length-prefixed wire form. Returns the context and the number of
    /// bytes consumed.
    pub fn read_params(input: &[u8]) -> Result<(Self, usize), CryptoError> {
        let mut pos = 0;
        let p = read_mpi(input, &mut pos)?;
        let g = read_mpi(input, &mut pos)?;
        let gy = read_mpi(input, &mut pos)?;
        let mut ctx = Self::new(p, g)?;
        ctx.read_public(gy)?;
        Ok((ctx, pos))
    }

    /// Pick a private exponent and emit `P || G || GX` in wire form.
    pub fn make_params(&mut self, rng: &dyn RandomSource) -> Result<Vec<u8>, CryptoError> {
        self.generate(rng)?;
        let mut out = Vec::new();
        for v in [&self.p, &self.g, &self.gx] {
            let bytes = v.to_bytes_be();
            out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
            out.extend_from_slice(&bytes);
        }
        Ok(out)
    }

    /// Store the peer public value after checking `1 < GY < P - 1`.
    pub fn read_public(&mut self, gy: &[u8]) -> Result<(), CryptoError> {
        let gy = BigUint::from_bytes_be(gy);
        if gy <= BigUint::one() || gy >= &self.p - 1u32 {
            return Err(CryptoError::DhmInvalidPublic);
        }
        self.gy = gy;
        Ok(())
    }

    /// Pick a private exponent and return `GX`, left-padded to the modulus
    /// length.
    pub fn make_public(&mut self, rng: &dyn RandomSource) -> Result<Vec<u8>, CryptoError> {
        self.generate(rng)?;
        let bytes = self.gx.to_bytes_be();
        let mut out = vec![0u8; self.len() - bytes.len()];
        out.extend_from_slice(&bytes);
        Ok(out)
    }

    /// The shared secret `GY^X mod P`, without leading zero bytes.
    pub fn calc_secret(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        if self.x.is_zero() || self.gy.is_zero() {
            return Err(CryptoError::DhmBadInputData);
        }
        let k = self.gy.modpow(&self.x, &self.p);
        Ok(Zeroizing::new(k.to_bytes_be()))
    }

    /// Modulus length in bytes.
    pub fn len(&self) -> usize {
        (self.p.bits() as usize).div_ceil(8)
    }

    pub fn is_empty(&self) -> bool {
        self.p.is_zero()
    }

    pub fn p_bytes(&self) -> Vec<u8> {
        self.p.to_bytes_be()
    }

    pub fn g_bytes(&self) -> Vec<u8> {
        self.g.to_bytes_be()
    }

    /// Private exponent uniform-ish in `[2, P - 2]`.
    fn generate(&mut self, rng: &dyn RandomSource) -> Result<(), CryptoError> {
        let mut buf = Zeroizing::new(vec![0u8; self.len()]);
        rng.fill(&mut buf)?;
        self.x = BigUint::from_bytes_be(&buf) % (&self.p - 3u32) + 2u32;
        self.gx = self.g.modpow(&self.x, &self.p);
        Ok(())
    }
}

fn read_mpi<'a>(input: &'a [u8], pos: &mut usize) -> Result<&'a [u8], CryptoError> {
    let hdr = input
        .get(*pos..*pos + 2)
        .ok_or(CryptoError::DhmBadInputData)?;
    let len = u16::from_be_bytes([hdr[0], hdr[1]]) as usize;
    let start = *pos + 2;
    let value = input
        .get(start..start + len)
        .ok_or(CryptoError::DhmBadInputData)?;
    if value.is_empty() {
        return Err(CryptoError::DhmBadInputData);
    }
    *pos = start + len;
    Ok(value)
}
