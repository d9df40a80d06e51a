//! TLS 1.0 PRF (RFC 2246 §5).
//!
//! ```text
//! PRF(secret, label, seed) = P_MD5(S1, label + seed) XOR
//!                            P_SHA-1(S2, label + seed)
//! ```
//!
//! `S1` and `S2` are the two halves of the secret; for odd lengths they
//! share the middle byte.

use embtls_crypto::hmac::HmacCtx;
use embtls_types::{HashAlgId, TlsError};
use zeroize::Zeroizing;

/// Derive `output_len` bytes from `secret`, `label` and `seed`.
pub fn prf(
    secret: &[u8],
    label: &str,
    seed: &[u8],
    output_len: usize,
) -> Result<Zeroizing<Vec<u8>>, TlsError> {
    let mut label_seed = Vec::with_capacity(label.len() + seed.len());
    label_seed.extend_from_slice(label.as_bytes());
    label_seed.extend_from_slice(seed);

    let half = secret.len().div_ceil(2);
    let s1 = &secret[..half];
    let s2 = &secret[secret.len() - half..];

    let mut out = p_hash(HashAlgId::Md5, s1, &label_seed, output_len)?;
    let sha = p_hash(HashAlgId::Sha1, s2, &label_seed, output_len)?;
    for (o, s) in out.iter_mut().zip(sha.iter()) {
        *o ^= s;
    }
    Ok(out)
}

/// P_hash expansion.
fn p_hash(
    alg: HashAlgId,
    secret: &[u8],
    seed: &[u8],
    output_len: usize,
) -> Result<Zeroizing<Vec<u8>>, TlsError> {
    let mut result = Zeroizing::new(Vec::with_capacity(output_len + 20));

    // A(0) = seed
    let mut a = seed.to_vec();
    while result.len() < output_len {
        // A(i) = HMAC_hash(secret, A(i-1))
        let mut ctx = HmacCtx::new(alg, secret)?;
        ctx.update(&a);
        a = ctx.finish();

        let mut ctx = HmacCtx::new(alg, secret)?;
        ctx.update(&a);
        ctx.update(seed);
        result.extend_from_slice(&ctx.finish());
    }
    result.truncate(output_len);
    Ok(result)
}
