//! RSA key generation command implementation.

use embtls_crypto::rsa::RsaPrivateKey;
use embtls_crypto::OsRandom;
use embtls_pki::key::encode_rsa_private_key_pem;

const PUBLIC_EXPONENT: u64 = 65537;

pub fn run(bits: usize, output: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Generating RSA private key, {bits} bit long modulus");
    let key = RsaPrivateKey::generate(&OsRandom, bits, PUBLIC_EXPONENT)
        .map_err(|e| format!("key generation failed: {e}"))?;
    let pem = encode_rsa_private_key_pem(&key);

    match output {
        Some(path) => {
            std::fs::write(path, pem.as_bytes())
                .map_err(|e| format!("cannot write '{path}': {e}"))?;
            eprintln!("Key written to {path}");
        }
        None => print!("{}", pem.as_str()),
    }
    Ok(())
}
