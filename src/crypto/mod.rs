//! Cryptographic primitives behind the standard security handler.
//!
//! Hashing is delegated to the RustCrypto digest crates; RC4 is small
//! enough to carry inline. Random bytes come from the operating system
//! and only fall back to a time-seeded generator if the OS source is
//! unavailable.

mod aes128;
mod rc4;

pub use aes128::{aes128_cbc_decrypt, aes128_cbc_encrypt};
pub use rc4::Rc4;

use md5::{Digest, Md5};
use sha2::Sha256;

/// One-shot MD5 over a list of byte slices.
pub fn md5(parts: &[&[u8]]) -> [u8; 16] {
    let mut hasher = Md5::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Incremental SHA-256, used for the content fingerprint of a document.
pub struct Sha256Builder {
    inner: Sha256,
}

impl Sha256Builder {
    pub fn new() -> Self {
        Sha256Builder {
            inner: Sha256::new(),
        }
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    pub fn finish(self) -> [u8; 32] {
        self.inner.finalize().into()
    }
}

impl Default for Sha256Builder {
    fn default() -> Self {
        Self::new()
    }
}

/// Fill `out` with cryptographically strong random bytes.
///
/// Falls back to a time-seeded PRNG only when the OS source fails,
/// which keeps file-ID and IV generation working in constrained
/// environments at reduced quality.
pub fn random(out: &mut [u8]) {
    if getrandom::fill(out).is_ok() {
        return;
    }
    use rand::{RngCore, SeedableRng, rngs::StdRng};
    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    StdRng::seed_from_u64(seed).fill_bytes(out);
}
