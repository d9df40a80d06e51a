//! Chain verification against a trust store.

use embtls_types::{PkiError, VerifyFlags};
use embtls_utils::asn1::Asn1Time;
use log::debug;

use super::{matches_hostname, Certificate, KeyUsage};

/// Check `chain` (leaf first, then any intermediates in any order) against
/// the `trust` anchors at time `now`, returning every problem found.
///
/// Validity and host name are checked on the leaf only. From the leaf, each
/// step first tries to close on a trust anchor whose raw subject equals the
/// current raw issuer, trying every such anchor until one signed it within
/// its pathLenConstraint. Otherwise the step climbs onto an unused chain
/// member that is a CA with the matching raw subject. Chain members that
/// are themselves trust anchors are never climbed onto, so they do not count
/// as intermediates. A bad signature on the way up ends the walk with
/// `NOT_TRUSTED`.
pub fn check_chain(
    chain: &[Certificate],
    trust: &[Certificate],
    hostname: Option<&str>,
    now: &Asn1Time,
) -> VerifyFlags {
    let Some(leaf) = chain.first() else {
        return VerifyFlags::NOT_TRUSTED;
    };

    let mut flags = VerifyFlags::empty();
    if !leaf.is_valid_at(now) {
        flags |= VerifyFlags::EXPIRED;
        if *now < leaf.not_before {
            flags |= VerifyFlags::NOT_YET_VALID;
        }
    }
    if let Some(host) = hostname {
        if !matches_hostname(leaf, host) {
            flags |= VerifyFlags::CN_MISMATCH;
        }
    }
    flags |= VerifyFlags::NOT_TRUSTED;

    let mut unused: Vec<&Certificate> = chain[1..]
        .iter()
        .filter(|c| !trust.iter().any(|anchor| anchor.raw == c.raw))
        .collect();
    let mut current = leaf;
    let mut intermediates: u32 = 0;
    loop {
        if closes_on_anchor(current, trust, intermediates) {
            flags.remove(VerifyFlags::NOT_TRUSTED);
            return flags;
        }
        let Some(pos) = unused.iter().position(|c| can_issue(c, current)) else {
            return flags;
        };
        let issuer = unused.swap_remove(pos);
        if !signed_by(current, issuer) {
            debug!("signature of '{}' does not verify", current.subject);
            return flags;
        }
        intermediates += 1;
        current = issuer;
    }
}

/// True if some anchor named as `cert`'s issuer signed it and allows
/// `intermediates` CAs below itself.
fn closes_on_anchor(cert: &Certificate, trust: &[Certificate], intermediates: u32) -> bool {
    trust
        .iter()
        .filter(|anchor| anchor.subject_raw == cert.issuer_raw)
        .any(|anchor| {
            if anchor.max_pathlen.is_some_and(|max| intermediates > max) {
                debug!(
                    "{intermediates} intermediates exceed constraint of '{}'",
                    anchor.subject
                );
                false
            } else if !usage_allows_signing(anchor) {
                debug!("trust anchor '{}' lacks keyCertSign", anchor.subject);
                false
            } else if signed_by(cert, anchor) {
                true
            } else {
                debug!("trust anchor '{}' did not sign '{}'", anchor.subject, cert.subject);
                false
            }
        })
}

fn can_issue(issuer: &Certificate, subject: &Certificate) -> bool {
    issuer.is_ca && usage_allows_signing(issuer) && issuer.subject_raw == subject.issuer_raw
}

fn usage_allows_signing(cert: &Certificate) -> bool {
    cert.key_usage
        .map_or(true, |ku| ku.has(KeyUsage::KEY_CERT_SIGN))
}

fn signed_by(cert: &Certificate, issuer: &Certificate) -> bool {
    let hashed = embtls_crypto::hash::digest(cert.sig_hash, &cert.tbs_raw);
    issuer
        .public_key
        .verify_pkcs1(Some(cert.sig_hash), &hashed, &cert.signature)
        .is_ok()
}

/// [`check_chain`] at time `now`, failing with the accumulated flags.
pub fn verify_at(
    chain: &[Certificate],
    trust: &[Certificate],
    hostname: Option<&str>,
    now: &Asn1Time,
) -> Result<(), PkiError> {
    let flags = check_chain(chain, trust, hostname, now);
    if flags.is_empty() {
        Ok(())
    } else {
        Err(PkiError::VerifyFailed(flags))
    }
}

/// [`verify_at`] against the current wall-clock time.
pub fn verify(
    chain: &[Certificate],
    trust: &[Certificate],
    hostname: Option<&str>,
) -> Result<(), PkiError> {
    verify_at(chain, trust, hostname, &Asn1Time::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::x509::parse_certificates;

    macro_rules! fixture {
        ($name:literal) => {
            include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../testdata/", $name))
        };
    }

    fn load(pems: &[&str]) -> Vec<Certificate> {
        pems.iter()
            .flat_map(|p| parse_certificates(p.as_bytes()).unwrap().0)
            .collect()
    }

    fn at(year: u16) -> Asn1Time {
        Asn1Time {
            year,
            month: 6,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }

    #[test]
    fn test_valid_chain() {
        let chain = load(&[fixture!("srv.pem"), fixture!("int.pem")]);
        let trust = load(&[fixture!("root.pem")]);
        assert_eq!(
            check_chain(&chain, &trust, Some("localhost"), &at(2030)),
            VerifyFlags::empty()
        );
        assert!(verify_at(&chain, &trust, Some("www.example.test"), &at(2030)).is_ok());
        assert!(verify_at(&chain, &trust, None, &at(2030)).is_ok());
    }

    #[test]
    fn test_chain_order_and_extra_root() {
        let chain = load(&[fixture!("srv.pem"), fixture!("root.pem"), fixture!("int.pem")]);
        let trust = load(&[fixture!("root.pem")]);
        assert!(check_chain(&chain, &trust, None, &at(2030)).is_empty());
    }

    #[test]
    fn test_intermediates_out_of_order() {
        let trust = load(&[fixture!("roll_new.pem")]);
        let ordered = load(&[fixture!("leaf3.pem"), fixture!("mid_b.pem"), fixture!("mid_a.pem")]);
        assert!(check_chain(&ordered, &trust, Some("localhost"), &at(2030)).is_empty());

        let reversed = load(&[fixture!("leaf3.pem"), fixture!("mid_a.pem"), fixture!("mid_b.pem")]);
        assert!(check_chain(&reversed, &trust, Some("localhost"), &at(2030)).is_empty());

        // each chain member is used once
        let short = load(&[fixture!("leaf3.pem"), fixture!("mid_a.pem")]);
        assert_eq!(
            check_chain(&short, &trust, None, &at(2030)),
            VerifyFlags::NOT_TRUSTED
        );
    }

    #[test]
    fn test_anchors_sharing_a_subject() {
        let chain = load(&[fixture!("leaf3.pem"), fixture!("mid_b.pem"), fixture!("mid_a.pem")]);
        let old = load(&[fixture!("roll_old.pem")]);
        let both = load(&[fixture!("roll_old.pem"), fixture!("roll_new.pem")]);
        assert_eq!(old[0].subject_raw, both[1].subject_raw);

        assert_eq!(
            check_chain(&chain, &old, None, &at(2030)),
            VerifyFlags::NOT_TRUSTED
        );
        assert!(check_chain(&chain, &both, None, &at(2030)).is_empty());
    }

    #[test]
    fn test_missing_intermediate_not_trusted() {
        let chain = load(&[fixture!("srv.pem")]);
        let trust = load(&[fixture!("root.pem")]);
        assert_eq!(
            check_chain(&chain, &trust, None, &at(2030)),
            VerifyFlags::NOT_TRUSTED
        );
        assert_eq!(check_chain(&[], &trust, None, &at(2030)), VerifyFlags::NOT_TRUSTED);
    }

    #[test]
    fn test_non_ca_middle_cannot_extend_chain() {
        let chain = load(&[fixture!("leaf2.pem"), fixture!("bad.pem"), fixture!("root.pem")]);
        let trust = load(&[fixture!("root.pem")]);
        // linkage by bytes holds
        assert_eq!(chain[0].issuer_raw, chain[1].subject_raw);
        assert_eq!(chain[1].issuer_raw, trust[0].subject_raw);
        match verify_at(&chain, &trust, Some("localhost"), &at(2030)) {
            Err(PkiError::VerifyFailed(flags)) => assert_eq!(flags, VerifyFlags::NOT_TRUSTED),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_pathlen_constraint() {
        let trust = load(&[fixture!("root0.pem")]);
        // leaf -> int0 -> root0 (pathlen 0): one intermediate is too many
        let chain = load(&[fixture!("leaf0.pem"), fixture!("int0.pem")]);
        assert_eq!(
            check_chain(&chain, &trust, None, &at(2030)),
            VerifyFlags::NOT_TRUSTED
        );
        // int0 directly under root0 is fine
        let chain = load(&[fixture!("int0.pem")]);
        assert!(check_chain(&chain, &trust, None, &at(2030)).is_empty());
    }

    #[test]
    fn test_anchor_sent_in_chain_is_not_an_intermediate() {
        let trust = load(&[fixture!("root0.pem")]);
        let chain = load(&[fixture!("int0.pem"), fixture!("root0.pem")]);
        assert!(check_chain(&chain, &trust, None, &at(2030)).is_empty());

        // still one intermediate too many with the root appended
        let chain = load(&[fixture!("leaf0.pem"), fixture!("int0.pem"), fixture!("root0.pem")]);
        assert_eq!(
            check_chain(&chain, &trust, None, &at(2030)),
            VerifyFlags::NOT_TRUSTED
        );

        let trust = load(&[fixture!("root.pem")]);
        let chain = load(&[fixture!("srv.pem"), fixture!("int.pem"), fixture!("root.pem")]);
        assert!(check_chain(&chain, &trust, Some("localhost"), &at(2030)).is_empty());
    }

    #[test]
    fn test_flags_accumulate() {
        let chain = load(&[fixture!("srv.pem"), fixture!("int.pem")]);
        let trust = load(&[fixture!("root.pem")]);

        let flags = check_chain(&chain, &trust, Some("other.host"), &at(2030));
        assert_eq!(flags, VerifyFlags::CN_MISMATCH);

        let flags = check_chain(&chain, &trust, Some("other.host"), &at(2052));
        assert_eq!(flags, VerifyFlags::CN_MISMATCH | VerifyFlags::EXPIRED);

        let flags = check_chain(&chain, &[], None, &at(2019));
        assert_eq!(
            flags,
            VerifyFlags::EXPIRED | VerifyFlags::NOT_YET_VALID | VerifyFlags::NOT_TRUSTED
        );
    }

    #[test]
    fn test_tampered_signature() {
        let mut chain = load(&[fixture!("srv.pem"), fixture!("int.pem")]);
        let trust = load(&[fixture!("root.pem")]);
        let last = chain[0].signature.len() - 1;
        chain[0].signature[last] ^= 0x01;
        assert_eq!(
            check_chain(&chain, &trust, None, &at(2030)),
            VerifyFlags::NOT_TRUSTED
        );

        let mut chain = load(&[fixture!("srv.pem"), fixture!("int.pem")]);
        chain[1].tbs_raw[10] ^= 0x01;
        assert_eq!(
            check_chain(&chain, &trust, None, &at(2030)),
            VerifyFlags::NOT_TRUSTED
        );
    }

    #[test]
    fn test_md5_self_signed_anchor() {
        let small = load(&[fixture!("small.pem")]);
        assert!(verify_at(&small, &small, Some("localhost"), &at(2030)).is_ok());
        let other = load(&[fixture!("root.pem")]);
        assert!(verify_at(&small, &other, None, &at(2030)).is_err());
    }

    #[test]
    fn test_client_chain() {
        let chain = load(&[fixture!("client.pem"), fixture!("int.pem")]);
        let trust = load(&[fixture!("root.pem"), fixture!("small.pem")]);
        assert!(verify_at(&chain, &trust, Some("emtls Client"), &at(2030)).is_ok());
    }
}
