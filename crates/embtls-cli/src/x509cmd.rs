//! X.509 certificate display command implementation.

use embtls_pki::x509::load_certificates;
use embtls_pki::Certificate;

pub fn run(input: &str, text: bool) -> Result<(), Box<dyn std::error::Error>> {
    let certs = load_certificates(input)
        .map_err(|e| format!("failed to parse certificate(s) in '{input}': {e}"))?;
    if certs.is_empty() {
        return Err(format!("no certificates found in '{input}'").into());
    }

    for (i, cert) in certs.iter().enumerate() {
        if certs.len() > 1 {
            println!("[{i}]");
        }
        if text {
            print!("{}", cert.to_text("  "));
        } else {
            print!("{}", summary(cert));
        }
    }
    Ok(())
}

fn summary(cert: &Certificate) -> String {
    format!(
        "subject= {}\nissuer= {}\nserial= {}\nnotBefore= {}\nnotAfter= {}\n",
        cert.subject,
        cert.issuer,
        hex_str(&cert.serial),
        cert.not_before,
        cert.not_after,
    )
}

fn hex_str(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        format!("{}/../../testdata/{name}", env!("CARGO_MANIFEST_DIR"))
    }

    // -----------------------------------------------------------------------
    // hex_str
    // -----------------------------------------------------------------------

    #[test]
    fn test_hex_str() {
        assert_eq!(hex_str(&[0x00, 0xab, 0x10]), "00:ab:10");
        assert_eq!(hex_str(&[]), "");
    }

    // -----------------------------------------------------------------------
    // summary
    // -----------------------------------------------------------------------

    #[test]
    fn test_summary_fields() {
        let certs = load_certificates(fixture("srv.pem")).unwrap();
        let out = summary(&certs[0]);
        assert!(out.contains("subject= "));
        assert!(out.contains("CN=localhost"));
        assert!(out.contains("issuer= "));
        assert!(out.lines().any(|l| l.starts_with("notAfter= ")));
    }

    // -----------------------------------------------------------------------
    // run
    // -----------------------------------------------------------------------

    #[test]
    fn test_run_summary_and_text() {
        run(&fixture("srv.pem"), false).unwrap();
        run(&fixture("root.pem"), true).unwrap();
    }

    #[test]
    fn test_run_missing_file() {
        assert!(run("/nonexistent/cert.pem", false).is_err());
    }

    #[test]
    fn test_run_not_a_certificate() {
        assert!(run(&fixture("srv.key"), false).is_err());
    }
}
