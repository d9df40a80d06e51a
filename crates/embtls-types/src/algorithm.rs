/// Hash algorithm identifiers.
///
/// MD5 and SHA-1 drive the record MAC, key derivation and the handshake
/// transcript. The rest only appear in certificate signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgId {
    Md2,
    Md4,
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgId {
    /// Digest length in bytes.
    pub fn output_len(self) -> usize {
        match self {
            HashAlgId::Md2 | HashAlgId::Md4 | HashAlgId::Md5 => 16,
            HashAlgId::Sha1 => 20,
            HashAlgId::Sha224 => 28,
            HashAlgId::Sha256 => 32,
            HashAlgId::Sha384 => 48,
            HashAlgId::Sha512 => 64,
        }
    }
}

/// Bulk cipher identifiers for the record layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherAlgId {
    Arc4_128,
    Des3Cbc,
    Aes128Cbc,
    Aes256Cbc,
    Camellia128Cbc,
    Camellia256Cbc,
}

impl CipherAlgId {
    /// Key length in bytes.
    pub fn key_len(self) -> usize {
        match self {
            CipherAlgId::Arc4_128 => 16,
            CipherAlgId::Des3Cbc => 24,
            CipherAlgId::Aes128Cbc | CipherAlgId::Camellia128Cbc => 16,
            CipherAlgId::Aes256Cbc | CipherAlgId::Camellia256Cbc => 32,
        }
    }

    /// Block size in bytes; zero for the stream cipher.
    pub fn block_size(self) -> usize {
        match self {
            CipherAlgId::Arc4_128 => 0,
            CipherAlgId::Des3Cbc => 8,
            _ => 16,
        }
    }

    /// IV length in bytes (equal to the block size for CBC modes).
    pub fn iv_len(self) -> usize {
        self.block_size()
    }
}
