//! Certificate chain verification command implementation.

use embtls_pki::x509::{load_certificates, verify};
use embtls_types::PkiError;

pub fn run(ca_file: &str, host: Option<&str>, cert_file: &str) -> Result<(), Box<dyn std::error::Error>> {
    let trusted = load_certificates(ca_file)
        .map_err(|e| format!("cannot load CA file '{ca_file}': {e}"))?;
    let chain = load_certificates(cert_file)
        .map_err(|e| format!("cannot load certificate '{cert_file}': {e}"))?;

    match verify(&chain, &trusted, host) {
        Ok(()) => {
            println!("{cert_file}: OK");
            for (i, c) in chain.iter().enumerate() {
                println!("  [{i}] {}", c.subject);
            }
            Ok(())
        }
        Err(PkiError::VerifyFailed(flags)) => {
            println!("{cert_file}: FAIL");
            Err(format!("verification failed: {flags}").into())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        format!("{}/../../testdata/{name}", env!("CARGO_MANIFEST_DIR"))
    }

    /// Leaf and intermediate concatenated into one temporary file.
    fn chain_file(name: &str, parts: &[&str]) -> std::path::PathBuf {
        let mut data = String::new();
        for part in parts {
            data.push_str(&std::fs::read_to_string(fixture(part)).unwrap());
        }
        let path = std::env::temp_dir().join(format!("embtls_verify_{name}_{}.pem", std::process::id()));
        std::fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn test_run_self_signed() {
        let small = fixture("small.pem");
        run(&small, None, &small).unwrap();
    }

    #[test]
    fn test_run_chain_with_host() {
        let path = chain_file("ok", &["srv.pem", "int.pem"]);
        let result = run(&fixture("root.pem"), Some("localhost"), path.to_str().unwrap());
        let _ = std::fs::remove_file(&path);
        result.unwrap();
    }

    #[test]
    fn test_run_host_mismatch() {
        let path = chain_file("mismatch", &["srv.pem", "int.pem"]);
        let result = run(&fixture("root.pem"), Some("other.host"), path.to_str().unwrap());
        let _ = std::fs::remove_file(&path);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("name mismatch"), "{err}");
    }

    #[test]
    fn test_run_missing_intermediate() {
        let err = run(&fixture("root.pem"), None, &fixture("srv.pem"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("not trusted"), "{err}");
    }

    #[test]
    fn test_run_missing_ca_file() {
        assert!(run("/nonexistent/ca.pem", None, &fixture("srv.pem")).is_err());
    }
}
