//! Certificate verification result flags.

use bitflags::bitflags;

bitflags! {
    /// Outcome of a certificate chain verification.
    ///
    /// Flags accumulate: a chain can be expired, mismatched and untrusted at once.
    /// An empty set means the chain verified.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VerifyFlags: u32 {
        /// The current time is past `not_after` (or before `not_before`).
        const EXPIRED = 0x01;
        /// The expected host name matched neither the CN nor a SAN entry.
        const CN_MISMATCH = 0x04;
        /// No trusted root closes the chain.
        const NOT_TRUSTED = 0x08;
        /// The current time is before `not_before`. Always reported alongside `EXPIRED`.
        const NOT_YET_VALID = 0x10;
    }
}

impl std::fmt::Display for VerifyFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return f.write_str("ok");
        }
        let mut parts = Vec::new();
        if self.contains(Self::EXPIRED) {
            parts.push("expired");
        }
        if self.contains(Self::NOT_YET_VALID) {
            parts.push("not yet valid");
        }
        if self.contains(Self::CN_MISMATCH) {
            parts.push("name mismatch");
        }
        if self.contains(Self::NOT_TRUSTED) {
            parts.push("not trusted");
        }
        f.write_str(&parts.join(", "))
    }
}
