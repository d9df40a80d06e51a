//! RSA with PKCS#1 v1.5 padding.
//!
//! Private-key operations use the CRT parameters and blind the input with a
//! fresh random factor. Big-number arithmetic is delegated to `num-bigint`;
//! `modpow` on odd moduli runs Montgomery multiplication internally.

mod pkcs1v15;

use crate::rand::RandomSource;
use embtls_types::{CryptoError, HashAlgId};
use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};
use subtle::{Choice, ConditionallySelectable};
use zeroize::Zeroizing;

const MIN_BITS: u64 = 128;
const MAX_BITS: u64 = 4096;

/// An RSA public key.
#[derive(Clone, PartialEq, Eq)]
pub struct RsaPublicKey {
    n: BigUint,
    e: BigUint,
    /// Modulus length in bytes.
    k: usize,
}

impl std::fmt::Debug for RsaPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaPublicKey")
            .field("bits", &self.bits())
            .finish()
    }
}

impl RsaPublicKey {
    /// Build a key from big-endian modulus and exponent and check it.
    pub fn new(n: &[u8], e: &[u8]) -> Result<Self, CryptoError> {
        let n = BigUint::from_bytes_be(n);
        let e = BigUint::from_bytes_be(e);
        let k = (n.bits() as usize).div_ceil(8);
        let key = Self { n, e, k };
        key.check()?;
        Ok(key)
    }

    /// Sanity checks on the public half: odd modulus of 128 to 4096 bits,
    /// odd exponent of 2 to 64 bits.
    pub fn check(&self) -> Result<(), CryptoError> {
        if self.n.is_even() || self.e.is_even() {
            return Err(CryptoError::RsaKeyCheckFail);
        }
        if !(MIN_BITS..=MAX_BITS).contains(&self.n.bits()) {
            return Err(CryptoError::RsaKeyCheckFail);
        }
        if !(2..=64).contains(&self.e.bits()) {
            return Err(CryptoError::RsaKeyCheckFail);
        }
        Ok(())
    }

    pub fn bits(&self) -> usize {
        self.n.bits() as usize
    }

    /// Modulus length in bytes; every ciphertext and signature has this size.
    pub fn len(&self) -> usize {
        self.k
    }

    pub fn is_empty(&self) -> bool {
        self.k == 0
    }

    pub fn n_bytes(&self) -> Vec<u8> {
        self.n.to_bytes_be()
    }

    pub fn e_bytes(&self) -> Vec<u8> {
        self.e.to_bytes_be()
    }

    /// RSAEP/RSAVP1: `input^E mod N`.
    pub fn public(&self, input: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if input.len() != self.k {
            return Err(CryptoError::BufferTooSmall {
                need: self.k,
                got: input.len(),
            });
        }
        let m = BigUint::from_bytes_be(input);
        if m >= self.n {
            return Err(CryptoError::InvalidArg);
        }
        Ok(to_padded(&m.modpow(&self.e, &self.n), self.k))
    }

    /// PKCS#1 v1.5 encryption of `msg`, at most `len() - 11` bytes.
    pub fn encrypt_pkcs1(
        &self,
        rng: &dyn RandomSource,
        msg: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let em = pkcs1v15::encrypt_pad(rng, msg, self.k)?;
        self.public(&em)
    }

    /// Verify a PKCS#1 v1.5 signature. `hash == None` expects the raw
    /// `hashed` bytes without a DigestInfo wrapper.
    pub fn verify_pkcs1(
        &self,
        hash: Option<HashAlgId>,
        hashed: &[u8],
        sig: &[u8],
    ) -> Result<(), CryptoError> {
        if sig.len() != self.k {
            return Err(CryptoError::RsaVerifyFail);
        }
        let em = self.public(sig).map_err(|_| CryptoError::RsaVerifyFail)?;
        pkcs1v15::verify_unpad(&em, hash, hashed)
    }
}

/// An RSA private key with CRT parameters.
pub struct RsaPrivateKey {
    public: RsaPublicKey,
    d: BigUint,
    p: BigUint,
    q: BigUint,
    dp: BigUint,
    dq: BigUint,
    qinv: BigUint,
}

impl std::fmt::Debug for RsaPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaPrivateKey")
            .field("bits", &self.public.bits())
            .finish()
    }
}

impl Drop for RsaPrivateKey {
    fn drop(&mut self) {
        for x in [
            &mut self.d,
            &mut self.p,
            &mut self.q,
            &mut self.dp,
            &mut self.dq,
            &mut self.qinv,
        ] {
            x.set_zero();
        }
    }
}

impl RsaPrivateKey {
    /// Build a private key from its big-endian components, derive the CRT
    /// parameters and run [`check`](Self::check).
    pub fn from_components(
        n: &[u8],
        e: &[u8],
        d: &[u8],
        p: &[u8],
        q: &[u8],
    ) -> Result<Self, CryptoError> {
        let public = RsaPublicKey::new(n, e)?;
        let key = Self::assemble(
            public,
            BigUint::from_bytes_be(d),
            BigUint::from_bytes_be(p),
            BigUint::from_bytes_be(q),
        )?;
        key.check()?;
        Ok(key)
    }

    fn assemble(
        public: RsaPublicKey,
        d: BigUint,
        p: BigUint,
        q: BigUint,
    ) -> Result<Self, CryptoError> {
        let one = BigUint::one();
        if p <= one || q <= one {
            return Err(CryptoError::RsaKeyCheckFail);
        }
        let dp = &d % (&p - &one);
        let dq = &d % (&q - &one);
        let qinv = q.modinv(&p).ok_or(CryptoError::BnNoInverse)?;
        Ok(Self {
            public,
            d,
            p,
            q,
            dp,
            dq,
            qinv,
        })
    }

    /// Generate a key of `bits` bits with public exponent `exponent`.
    ///
    /// `bits` must be even and between 128 and 4096.
    pub fn generate(
        rng: &dyn RandomSource,
        bits: usize,
        exponent: u64,
    ) -> Result<Self, CryptoError> {
        if bits % 2 != 0 || !(MIN_BITS..=MAX_BITS).contains(&(bits as u64)) {
            return Err(CryptoError::RsaInvalidKeyBits);
        }
        if exponent < 3 || exponent % 2 == 0 {
            return Err(CryptoError::InvalidArg);
        }
        let e = BigUint::from(exponent);
        let one = BigUint::one();
        let half = bits / 2;

        for _ in 0..64 {
            let p = generate_prime(rng, half, &e)?;
            let q = generate_prime(rng, half, &e)?;
            if p == q {
                continue;
            }
            let (p, q) = if p > q { (p, q) } else { (q, p) };
            let n = &p * &q;
            if n.bits() as usize != bits {
                continue;
            }
            let lambda = (&p - &one).lcm(&(&q - &one));
            let Some(d) = e.modinv(&lambda) else {
                continue;
            };
            let k = bits.div_ceil(8);
            let public = RsaPublicKey { n, e: e.clone(), k };
            let key = Self::assemble(public, d, p, q)?;
            key.check()?;
            return Ok(key);
        }
        Err(CryptoError::BnPrimeGenFail)
    }

    /// Consistency check: `N = P*Q` and `D*E ≡ 1 (mod lcm(P-1, Q-1))`.
    pub fn check(&self) -> Result<(), CryptoError> {
        self.public.check()?;
        let one = BigUint::one();
        if &self.p * &self.q != self.public.n {
            return Err(CryptoError::RsaKeyCheckFail);
        }
        let lambda = (&self.p - &one).lcm(&(&self.q - &one));
        if (&self.d * &self.public.e) % &lambda != one {
            return Err(CryptoError::RsaKeyCheckFail);
        }
        let phi = (&self.p - &one) * (&self.q - &one);
        if !self.public.e.gcd(&phi).is_one() {
            return Err(CryptoError::RsaKeyCheckFail);
        }
        Ok(())
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    pub fn len(&self) -> usize {
        self.public.k
    }

    pub fn is_empty(&self) -> bool {
        self.public.k == 0
    }

    /// RSADP/RSASP1 through the CRT: `input^D mod N`.
    ///
    /// The input is multiplied by `r^E` before exponentiation and the result
    /// by `r^-1` after it, with `r` drawn from `rng` on every call.
    pub fn private(&self, rng: &dyn RandomSource, input: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let k = self.public.k;
        if input.len() != k {
            return Err(CryptoError::BufferTooSmall {
                need: k,
                got: input.len(),
            });
        }
        let c = BigUint::from_bytes_be(input);
        if c >= self.public.n {
            return Err(CryptoError::InvalidArg);
        }
        let n = &self.public.n;
        let (r, r_inv) = self.blinding_pair(rng)?;
        let blinded = (c * r.modpow(&self.public.e, n)) % n;
        let m = (self.crt(&blinded) * r_inv) % n;
        Ok(to_padded(&m, k))
    }

    fn crt(&self, c: &BigUint) -> BigUint {
        let m1 = c.modpow(&self.dp, &self.p);
        let m2 = c.modpow(&self.dq, &self.q);
        let h = (&self.qinv * ((&m1 + &self.p) - (&m2 % &self.p))) % &self.p;
        m2 + h * &self.q
    }

    /// A random `r` in `[2, N)` that is invertible mod N, with its inverse.
    fn blinding_pair(&self, rng: &dyn RandomSource) -> Result<(BigUint, BigUint), CryptoError> {
        let n = &self.public.n;
        let mut buf = Zeroizing::new(vec![0u8; self.public.k]);
        for _ in 0..32 {
            rng.fill(&mut buf)?;
            let r = BigUint::from_bytes_be(&buf) % n;
            if r <= BigUint::one() {
                continue;
            }
            if let Some(r_inv) = r.modinv(n) {
                return Ok((r, r_inv));
            }
        }
        Err(CryptoError::RngFail)
    }

    /// PKCS#1 v1.5 decryption.
    pub fn decrypt_pkcs1(
        &self,
        rng: &dyn RandomSource,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let em = self.private(rng, ciphertext)?;
        let (ok, off) = pkcs1v15::decrypt_unpad(&em);
        if bool::from(ok) {
            Ok(em[off..].to_vec())
        } else {
            Err(CryptoError::RsaInvalidPadding)
        }
    }

    /// PKCS#1 v1.5 decryption of a message whose length is known in advance.
    ///
    /// The trailing `out.len()` bytes of the decrypted block are always copied
    /// into `out`; the returned bit says whether the padding was valid and the
    /// message had exactly that length. Nothing about the outcome is
    /// branched on, so callers can substitute data in constant time.
    pub fn decrypt_pkcs1_fixed(
        &self,
        rng: &dyn RandomSource,
        ciphertext: &[u8],
        out: &mut [u8],
    ) -> Choice {
        let k = self.public.k;
        let Ok(em) = self.private(rng, ciphertext) else {
            return Choice::from(0);
        };
        if out.len() > k {
            return Choice::from(0);
        }
        let (ok, off) = pkcs1v15::decrypt_unpad(&em);
        let len_ok = subtle::ConstantTimeEq::ct_eq(&((k - off) as u64), &(out.len() as u64));
        out.copy_from_slice(&em[k - out.len()..]);
        ok & len_ok
    }

    /// PKCS#1 v1.5 signature over `hashed`; see
    /// [`RsaPublicKey::verify_pkcs1`] for the meaning of `hash`.
    pub fn sign_pkcs1(
        &self,
        rng: &dyn RandomSource,
        hash: Option<HashAlgId>,
        hashed: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let em = pkcs1v15::sign_pad(hash, hashed, self.public.k)?;
        self.private(rng, &em)
    }

    pub fn d_bytes(&self) -> Vec<u8> {
        self.d.to_bytes_be()
    }

    pub fn p_bytes(&self) -> Vec<u8> {
        self.p.to_bytes_be()
    }

    pub fn q_bytes(&self) -> Vec<u8> {
        self.q.to_bytes_be()
    }

    pub fn dp_bytes(&self) -> Vec<u8> {
        self.dp.to_bytes_be()
    }

    pub fn dq_bytes(&self) -> Vec<u8> {
        self.dq.to_bytes_be()
    }

    pub fn qinv_bytes(&self) -> Vec<u8> {
        self.qinv.to_bytes_be()
    }
}

/// Constant-time conditional copy: `dst = if choice { src } else { dst }`.
pub fn ct_select_into(dst: &mut [u8], src: &[u8], choice: Choice) {
    for (d, s) in dst.iter_mut().zip(src) {
        d.conditional_assign(s, choice);
    }
}

fn to_padded(x: &BigUint, k: usize) -> Vec<u8> {
    let bytes = x.to_bytes_be();
    let mut out = vec![0u8; k.saturating_sub(bytes.len())];
    out.extend_from_slice(&bytes);
    out
}

const SMALL_PRIMES: [u32; 54] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89,
    97, 101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191,
    193, 197, 199, 211, 223, 227, 229, 233, 239, 241, 251,
];

/// Random `bits`-bit integer with the two top bits and the low bit set.
fn random_odd(rng: &dyn RandomSource, bits: usize) -> Result<BigUint, CryptoError> {
    let nbytes = bits.div_ceil(8);
    let mut buf = vec![0u8; nbytes];
    rng.fill(&mut buf)?;
    let excess = nbytes * 8 - bits;
    buf[0] &= 0xFF >> excess;
    let mut x = BigUint::from_bytes_be(&buf);
    x.set_bit(bits as u64 - 1, true);
    x.set_bit(bits as u64 - 2, true);
    x.set_bit(0, true);
    Ok(x)
}

fn generate_prime(
    rng: &dyn RandomSource,
    bits: usize,
    e: &BigUint,
) -> Result<BigUint, CryptoError> {
    let one = BigUint::one();
    for _ in 0..10 * bits {
        let candidate = random_odd(rng, bits)?;
        if !(&candidate - &one).gcd(e).is_one() {
            continue;
        }
        if is_probable_prime(rng, &candidate)? {
            return Ok(candidate);
        }
    }
    Err(CryptoError::BnPrimeGenFail)
}

/// Trial division followed by Miller-Rabin; the round count shrinks with
/// the candidate size per FIPS 186 table C.2.
pub fn is_probable_prime(rng: &dyn RandomSource, n: &BigUint) -> Result<bool, CryptoError> {
    for &sp in SMALL_PRIMES.iter() {
        let sp = BigUint::from(sp);
        if *n == sp {
            return Ok(true);
        }
        if (n % &sp).is_zero() {
            return Ok(false);
        }
    }
    if *n < BigUint::from(4u32) {
        return Ok(false);
    }

    let bits = n.bits();
    let rounds = match bits {
        1300.. => 2,
        850.. => 3,
        650.. => 4,
        350.. => 8,
        250.. => 12,
        150.. => 18,
        _ => 27,
    };

    let one = BigUint::one();
    let two = BigUint::from(2u32);
    let n_minus_1 = n - &one;
    let s = n_minus_1.trailing_zeros().unwrap_or(0);
    let d = &n_minus_1 >> s;
    let nbytes = (bits as usize).div_ceil(8);
    let mut buf = vec![0u8; nbytes];

    'witness: for _ in 0..rounds {
        rng.fill(&mut buf)?;
        // a in [2, n - 2]
        let a = BigUint::from_bytes_be(&buf) % (n - 3u32) + &two;
        let mut x = a.modpow(&d, n);
        if x.is_one() || x == n_minus_1 {
            continue;
        }
        for _ in 1..s {
            x = x.modpow(&two, n);
            if x == n_minus_1 {
                continue 'witness;
            }
        }
        return Ok(false);
    }
    Ok(true)
}
