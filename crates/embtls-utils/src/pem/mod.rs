//! PEM armor: locating, decoding and producing `-----BEGIN ...-----` blocks.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use embtls_types::Asn1Error;

/// A decoded PEM block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PemBlock {
    /// The label, e.g. `CERTIFICATE` or `RSA PRIVATE KEY`.
    pub label: String,
    /// The DER payload.
    pub data: Vec<u8>,
}

const BEGIN_PREFIX: &str = "-----BEGIN ";
const END_PREFIX: &str = "-----END ";
const DASHES_SUFFIX: &str = "-----";

/// Returns true when the buffer contains a PEM begin marker.
pub fn is_pem(input: &[u8]) -> bool {
    input
        .windows(BEGIN_PREFIX.len())
        .any(|w| w == BEGIN_PREFIX.as_bytes())
}

/// Parse every PEM block in `input`. Text outside of blocks is ignored.
///
/// Header lines such as `Proc-Type:` inside a block are rejected: encrypted
/// PEM is not supported.
pub fn parse(input: &str) -> Result<Vec<PemBlock>, Asn1Error> {
    let mut blocks = Vec::new();
    let mut lines = input.lines();

    while let Some(line) = lines.next() {
        let line = line.trim();
        let Some(label) = line
            .strip_prefix(BEGIN_PREFIX)
            .and_then(|s| s.strip_suffix(DASHES_SUFFIX))
        else {
            continue;
        };
        let end_marker = format!("{END_PREFIX}{label}{DASHES_SUFFIX}");

        let mut body = String::new();
        let mut found_end = false;
        for inner in lines.by_ref() {
            let inner = inner.trim();
            if inner == end_marker {
                found_end = true;
                break;
            }
            if inner.contains(':') {
                return Err(Asn1Error::MalformedPem(format!(
                    "unsupported header in {label} block"
                )));
            }
            body.push_str(inner);
        }
        if !found_end {
            return Err(Asn1Error::MalformedPem(format!("missing {end_marker}")));
        }

        let data = STANDARD
            .decode(body.as_bytes())
            .map_err(|e| Asn1Error::MalformedPem(e.to_string()))?;
        blocks.push(PemBlock {
            label: label.to_string(),
            data,
        });
    }

    Ok(blocks)
}

/// Parse `input` and return the payloads of all blocks carrying `label`.
pub fn parse_label(input: &str, label: &str) -> Result<Vec<Vec<u8>>, Asn1Error> {
    Ok(parse(input)?
        .into_iter()
        .filter(|b| b.label == label)
        .map(|b| b.data)
        .collect())
}

/// Encode `data` as a PEM block, wrapping the base64 body at 64 columns.
pub fn encode(label: &str, data: &[u8]) -> String {
    let body = STANDARD.encode(data);
    let mut out = format!("{BEGIN_PREFIX}{label}{DASHES_SUFFIX}\n");
    let mut rest = body.as_str();
    while !rest.is_empty() {
        let (line, tail) = rest.split_at(rest.len().min(64));
        out.push_str(line);
        out.push('\n');
        rest = tail;
    }
    out.push_str(&format!("{END_PREFIX}{label}{DASHES_SUFFIX}\n"));
    out
}
