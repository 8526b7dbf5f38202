//! The PDF "Standard" security handler: password-based RC4 and AES-128
//! encryption of strings and streams.
//!
//! Supported modes follow the classical V/R pairs; AES-256 (V6/R6) is
//! out of scope. Key derivation, the owner/user verification entries,
//! and the per-object keys live in [`standard`].

mod standard;

pub(crate) use standard::SecurityHandler;

use bitflags::bitflags;

use crate::error::{PdfError, Result};

bitflags! {
    /// User access permissions, the `P` entry bits that matter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Permissions: u32 {
        /// Print the document (possibly degraded).
        const PRINT = 1 << 2;
        /// Modify contents.
        const MODIFY = 1 << 3;
        /// Copy text and graphics.
        const COPY = 1 << 4;
        /// Add or modify annotations.
        const ANNOTATE = 1 << 5;
        /// Fill in form fields.
        const FILL_FORMS = 1 << 8;
        /// Extract for accessibility.
        const EXTRACT_ACCESSIBLE = 1 << 9;
        /// Assemble (insert, rotate, delete pages).
        const ASSEMBLE = 1 << 10;
        /// Print at full resolution.
        const PRINT_HIGH_RES = 1 << 11;
    }
}

impl Permissions {
    /// Build from a stored `P` value, masking the reserved bits.
    pub fn from_p_value(p: i32) -> Self {
        Permissions::from_bits_truncate(p as u32)
    }

    /// The `P` value to store: permission bits with every reserved bit
    /// set, as the signed 32-bit number the format wants.
    pub fn to_p_value(self) -> i32 {
        (0xFFFF_F0C0u32 | self.bits()) as i32
    }
}

/// Cipher and key length, the supported V/R pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMode {
    /// V=1, R=2: RC4 with a 40-bit key. Read-only; too weak to write.
    Rc4_40,
    /// V=2, R=3: RC4 with a 128-bit key.
    Rc4_128,
    /// V=4, R=4: AES-128-CBC.
    Aes128,
}

impl EncryptionMode {
    /// File-key length in bytes.
    pub fn key_length(&self) -> usize {
        match self {
            EncryptionMode::Rc4_40 => 5,
            EncryptionMode::Rc4_128 | EncryptionMode::Aes128 => 16,
        }
    }

    /// The (V, R) pair stored in the encryption dictionary.
    pub fn version_revision(&self) -> (i64, i64) {
        match self {
            EncryptionMode::Rc4_40 => (1, 2),
            EncryptionMode::Rc4_128 => (2, 3),
            EncryptionMode::Aes128 => (4, 4),
        }
    }

    pub fn is_aes(&self) -> bool {
        matches!(self, EncryptionMode::Aes128)
    }
}

/// Encryption settings for writing a document.
///
/// ```
/// use pdfkern::{EncryptionMode, EncryptionOptions, Permissions};
/// let opts = EncryptionOptions::new(EncryptionMode::Aes128)
///     .owner_password("owner")
///     .user_password("user")
///     .permissions(Permissions::PRINT);
/// assert!(opts.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct EncryptionOptions {
    pub(crate) mode: EncryptionMode,
    pub(crate) owner_password: Vec<u8>,
    pub(crate) user_password: Vec<u8>,
    pub(crate) permissions: Permissions,
    pub(crate) encrypt_metadata: bool,
}

impl EncryptionOptions {
    pub fn new(mode: EncryptionMode) -> Self {
        EncryptionOptions {
            mode,
            owner_password: Vec::new(),
            user_password: Vec::new(),
            permissions: Permissions::all(),
            encrypt_metadata: true,
        }
    }

    /// Owner password; defaults to the user password when empty.
    pub fn owner_password(mut self, password: impl AsRef<[u8]>) -> Self {
        self.owner_password = password.as_ref().to_vec();
        self
    }

    pub fn user_password(mut self, password: impl AsRef<[u8]>) -> Self {
        self.user_password = password.as_ref().to_vec();
        self
    }

    pub fn permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Whether the document metadata stream is encrypted too. On by
    /// default.
    pub fn encrypt_metadata(mut self, encrypt: bool) -> Self {
        self.encrypt_metadata = encrypt;
        self
    }

    /// Reject configurations this handler cannot write.
    pub fn validate(&self) -> Result<()> {
        if self.mode == EncryptionMode::Rc4_40 {
            return Err(PdfError::Contract(
                "RC4-40 is supported for reading only".into(),
            ));
        }
        Ok(())
    }
}

/// Supplies password candidates during unlock, one per attempt.
///
/// Returning `None` stops the attempts early.
pub trait PasswordProvider {
    fn password(&mut self, attempt: u32) -> Option<Vec<u8>>;
}

impl<F: FnMut(u32) -> Option<Vec<u8>>> PasswordProvider for F {
    fn password(&mut self, attempt: u32) -> Option<Vec<u8>> {
        self(attempt)
    }
}

/// Fixed list of candidates, tried in order.
#[derive(Debug, Clone, Default)]
pub struct PasswordList(pub Vec<Vec<u8>>);

impl PasswordProvider for PasswordList {
    fn password(&mut self, attempt: u32) -> Option<Vec<u8>> {
        self.0.get(attempt as usize).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p_value_sets_reserved_bits() {
        let p = Permissions::PRINT.to_p_value();
        assert!(p < 0, "P is a negative 32-bit value in practice");
        assert!(Permissions::from_p_value(p).contains(Permissions::PRINT));
        assert!(!Permissions::from_p_value(p).contains(Permissions::MODIFY));
    }

    #[test]
    fn mode_table_matches_spec() {
        assert_eq!(EncryptionMode::Rc4_40.key_length(), 5);
        assert_eq!(EncryptionMode::Rc4_128.version_revision(), (2, 3));
        assert_eq!(EncryptionMode::Aes128.version_revision(), (4, 4));
        assert!(EncryptionMode::Aes128.is_aes());
    }

    #[test]
    fn writing_rc4_40_is_rejected() {
        assert!(
            EncryptionOptions::new(EncryptionMode::Rc4_40)
                .validate()
                .is_err()
        );
    }
}
