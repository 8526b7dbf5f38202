use super::{EncryptionMode, EncryptionOptions, PasswordProvider, Permissions};
use crate::crypto::{Rc4, aes128_cbc_decrypt, aes128_cbc_encrypt, md5, random};
use crate::error::{PdfError, Result};
use crate::object::{Dictionary, ObjectId, Value};

/// The 32-byte padding string every password is extended with.
const PAD: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01,
    0x08, 0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53,
    0x69, 0x7A,
];

/// Unlock attempt budget.
const MAX_ATTEMPTS: u32 = 4;

fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let n = password.len().min(32);
    padded[..n].copy_from_slice(&password[..n]);
    padded[n..].copy_from_slice(&PAD[..32 - n]);
    padded
}

/// MD5 re-hash loop used by R3+: hash the first `keep` bytes of the
/// previous digest, fifty times.
fn rehash_50(mut digest: [u8; 16], keep: usize) -> [u8; 16] {
    for _ in 0..50 {
        digest = md5(&[&digest[..keep]]);
    }
    digest
}

/// RC4 key for the owner entry: MD5 of the padded owner password,
/// re-hashed for R3+.
fn owner_rc4_key(padded_owner: &[u8; 32], revision: i64, len: usize) -> Vec<u8> {
    let mut digest = md5(&[padded_owner]);
    if revision >= 3 {
        digest = rehash_50(digest, 16);
    }
    digest[..len].to_vec()
}

/// The stored `O` entry: the padded user password under the owner key,
/// with nineteen extra XOR rounds for R3+.
fn compute_owner_entry(
    padded_owner: &[u8; 32],
    padded_user: &[u8; 32],
    revision: i64,
    len: usize,
) -> Vec<u8> {
    let key = owner_rc4_key(padded_owner, revision, len);
    let mut out = Rc4::crypt_to_vec(&key, padded_user);
    if revision >= 3 {
        for round in 1..=19u8 {
            let round_key: Vec<u8> = key.iter().map(|b| b ^ round).collect();
            out = Rc4::crypt_to_vec(&round_key, &out);
        }
    }
    out
}

/// Recover the padded user password from the `O` entry with the owner
/// password (the XOR rounds run in reverse).
fn decrypt_owner_entry(
    padded_owner: &[u8; 32],
    owner_entry: &[u8],
    revision: i64,
    len: usize,
) -> Vec<u8> {
    let key = owner_rc4_key(padded_owner, revision, len);
    let mut out = owner_entry.to_vec();
    if revision >= 3 {
        for round in (1..=19u8).rev() {
            let round_key: Vec<u8> = key.iter().map(|b| b ^ round).collect();
            out = Rc4::crypt_to_vec(&round_key, &out);
        }
    }
    Rc4::new(&key).crypt(&mut out);
    out
}

/// Derive the file key from a padded user password.
fn compute_file_key(
    padded_user: &[u8; 32],
    owner_entry: &[u8],
    p_value: i32,
    file_id0: &[u8],
    revision: i64,
    len: usize,
    encrypt_metadata: bool,
) -> Vec<u8> {
    let p_bytes = p_value.to_le_bytes();
    let no_meta = [0xFFu8; 4];
    let mut parts: Vec<&[u8]> = vec![padded_user, owner_entry, &p_bytes, file_id0];
    if revision >= 4 && !encrypt_metadata {
        parts.push(&no_meta);
    }
    let mut digest = md5(&parts);
    if revision >= 3 {
        digest = rehash_50(digest, len);
    }
    digest[..len].to_vec()
}

/// The stored `U` entry for a given file key.
fn compute_user_entry(file_key: &[u8], file_id0: &[u8], revision: i64) -> [u8; 32] {
    let mut out = [0u8; 32];
    if revision == 2 {
        let mut buf = PAD;
        Rc4::new(file_key).crypt(&mut buf);
        out.copy_from_slice(&buf);
    } else {
        let digest = md5(&[&PAD, file_id0]);
        let mut buf = Rc4::crypt_to_vec(file_key, &digest);
        for round in 1..=19u8 {
            let round_key: Vec<u8> = file_key.iter().map(|b| b ^ round).collect();
            buf = Rc4::crypt_to_vec(&round_key, &buf);
        }
        // Only the first 16 bytes are significant for R3+.
        out[..16].copy_from_slice(&buf);
    }
    out
}

fn user_entry_matches(candidate: &[u8; 32], stored: &[u8], revision: i64) -> bool {
    if revision == 2 {
        stored.len() >= 32 && &candidate[..] == &stored[..32]
    } else {
        stored.len() >= 16 && candidate[..16] == stored[..16]
    }
}

/// Unlocked state of the standard security handler: everything needed
/// to derive per-object keys.
#[derive(Debug)]
pub(crate) struct SecurityHandler {
    mode: EncryptionMode,
    file_key: Vec<u8>,
    permissions: Permissions,
    encrypt_metadata: bool,
}

impl SecurityHandler {
    /// Build the handler and its `Encrypt` dictionary for writing.
    pub fn create(options: &EncryptionOptions, file_id0: &[u8]) -> Result<(Self, Dictionary)> {
        options.validate()?;
        let mode = options.mode;
        let (version, revision) = mode.version_revision();
        let len = mode.key_length();

        let owner_password = if options.owner_password.is_empty() {
            &options.user_password
        } else {
            &options.owner_password
        };
        let padded_owner = pad_password(owner_password);
        let padded_user = pad_password(&options.user_password);
        let p_value = options.permissions.to_p_value();

        let owner_entry = compute_owner_entry(&padded_owner, &padded_user, revision, len);
        let file_key = compute_file_key(
            &padded_user,
            &owner_entry,
            p_value,
            file_id0,
            revision,
            len,
            options.encrypt_metadata,
        );
        let user_entry = compute_user_entry(&file_key, file_id0, revision);

        let mut dict = Dictionary::new();
        dict.set("Filter", Value::name("Standard"));
        dict.set("V", version);
        dict.set("R", revision);
        dict.set("Length", (len * 8) as i64);
        dict.set("O", Value::binary(&owner_entry));
        dict.set("U", Value::binary(user_entry));
        dict.set("P", p_value as i64);
        if mode.is_aes() {
            let mut std_cf = Dictionary::new();
            std_cf.set("CFM", Value::name("AESV2"));
            std_cf.set("AuthEvent", Value::name("DocOpen"));
            std_cf.set("Length", 16i64);
            let mut cf = Dictionary::new();
            cf.set("StdCF", std_cf);
            dict.set("CF", cf);
            dict.set("StmF", Value::name("StdCF"));
            dict.set("StrF", Value::name("StdCF"));
        }
        if !options.encrypt_metadata {
            dict.set("EncryptMetadata", false);
        }

        Ok((
            SecurityHandler {
                mode,
                file_key,
                permissions: options.permissions,
                encrypt_metadata: options.encrypt_metadata,
            },
            dict,
        ))
    }

    /// Verify passwords against a parsed `Encrypt` dictionary and
    /// derive the file key. Tries each candidate as the user and then
    /// the owner password, up to four attempts.
    pub fn unlock(
        encrypt: &Dictionary,
        file_id0: &[u8],
        provider: &mut dyn PasswordProvider,
    ) -> Result<Self> {
        match encrypt.get_name(b"Filter") {
            Some(name) if name == &"Standard" => {}
            Some(name) => {
                return Err(PdfError::Encryption(format!(
                    "unsupported security handler {name:?}"
                )));
            }
            None => {
                return Err(PdfError::Encryption(
                    "Encrypt dictionary has no Filter".into(),
                ));
            }
        }
        let version = encrypt.get_i64(b"V").unwrap_or(0);
        let revision = encrypt.get_i64(b"R").unwrap_or(0);
        let mode = match (version, revision) {
            (1, 2) | (2, 2) => EncryptionMode::Rc4_40,
            (2, 3) => EncryptionMode::Rc4_128,
            (4, 4) => {
                // The crypt filter decides between AESV2 and plain V2.
                let cfm = encrypt
                    .get_dict(b"CF")
                    .and_then(|cf| cf.get_dict(b"StdCF"))
                    .and_then(|std_cf| std_cf.get_name(b"CFM"));
                match cfm {
                    Some(name) if name == &"V2" => EncryptionMode::Rc4_128,
                    _ => EncryptionMode::Aes128,
                }
            }
            (v, r) => {
                return Err(PdfError::Encryption(format!(
                    "unsupported encryption V={v} R={r}"
                )));
            }
        };
        let len = match encrypt.get_i64(b"Length") {
            Some(bits) if bits % 8 == 0 && (40..=128).contains(&bits) => (bits / 8) as usize,
            Some(bits) => {
                return Err(PdfError::Encryption(format!("bad key length {bits}")));
            }
            None => mode.key_length(),
        };
        let owner_entry = encrypt
            .get_string(b"O")
            .ok_or_else(|| PdfError::Encryption("Encrypt dictionary has no O entry".into()))?
            .to_vec();
        let user_entry = encrypt
            .get_string(b"U")
            .ok_or_else(|| PdfError::Encryption("Encrypt dictionary has no U entry".into()))?
            .to_vec();
        let p_value = encrypt.get_i64(b"P").ok_or_else(|| {
            PdfError::Encryption("Encrypt dictionary has no P entry".into())
        })? as i32;
        let encrypt_metadata = match encrypt.get(b"EncryptMetadata") {
            Some(Value::Boolean(b)) => *b,
            _ => true,
        };

        let try_key = |padded_user: &[u8; 32]| -> Option<Vec<u8>> {
            let key = compute_file_key(
                padded_user,
                &owner_entry,
                p_value,
                file_id0,
                revision,
                len,
                encrypt_metadata,
            );
            let candidate = compute_user_entry(&key, file_id0, revision);
            user_entry_matches(&candidate, &user_entry, revision).then_some(key)
        };

        for attempt in 0..MAX_ATTEMPTS {
            let password = match provider.password(attempt) {
                Some(p) => p,
                None => break,
            };
            // User-password path.
            if let Some(file_key) = try_key(&pad_password(&password)) {
                return Ok(SecurityHandler {
                    mode,
                    file_key,
                    permissions: Permissions::from_p_value(p_value),
                    encrypt_metadata,
                });
            }
            // Owner-password path: decrypting O yields the padded user
            // password directly.
            let padded_owner = pad_password(&password);
            let recovered = decrypt_owner_entry(&padded_owner, &owner_entry, revision, len);
            if recovered.len() == 32 {
                let mut padded_user = [0u8; 32];
                padded_user.copy_from_slice(&recovered);
                if let Some(file_key) = try_key(&padded_user) {
                    return Ok(SecurityHandler {
                        mode,
                        file_key,
                        permissions: Permissions::from_p_value(p_value),
                        encrypt_metadata,
                    });
                }
            }
        }
        Err(PdfError::Encryption(
            "password incorrect after all attempts".into(),
        ))
    }

    pub fn permissions(&self) -> Permissions {
        self.permissions
    }

    pub fn encrypt_metadata(&self) -> bool {
        self.encrypt_metadata
    }

    /// Key for one object: MD5 of the file key, the low object-number
    /// and generation bytes, and the AES salt when applicable.
    fn object_key(&self, id: ObjectId) -> Vec<u8> {
        let num = id.number.to_le_bytes();
        let generation = id.generation.to_le_bytes();
        let tail = [num[0], num[1], num[2], generation[0], generation[1]];
        let digest = if self.mode.is_aes() {
            md5(&[&self.file_key, &tail, b"sAlT"])
        } else {
            md5(&[&self.file_key, &tail])
        };
        let keep = (self.file_key.len() + 5).min(16);
        digest[..keep].to_vec()
    }

    /// Encrypt string or stream bytes belonging to object `id`.
    pub fn encrypt_data(&self, id: ObjectId, data: &[u8]) -> Vec<u8> {
        let key = self.object_key(id);
        if self.mode.is_aes() {
            let mut iv = [0u8; 16];
            random(&mut iv);
            let key: [u8; 16] = key.try_into().expect("AES object keys are 16 bytes");
            let mut out = iv.to_vec();
            out.extend(aes128_cbc_encrypt(&key, &iv, data));
            out
        } else {
            let mut out = data.to_vec();
            Rc4::new(&key).crypt(&mut out);
            out
        }
    }

    /// Clone `value` with every string encrypted under the object key.
    /// Ciphertext routinely contains arbitrary bytes, so encrypted
    /// strings are carried in hex form; dates encrypt as their `D:`
    /// string rendering.
    pub fn encrypt_value(&self, id: ObjectId, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::binary(self.encrypt_data(id, s)),
            Value::Binary(b) => Value::binary(self.encrypt_data(id, b)),
            Value::Date(stamp) => {
                let plain = format!("D:{}Z", stamp.format("%Y%m%d%H%M%S"));
                Value::binary(self.encrypt_data(id, plain.as_bytes()))
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.encrypt_value(id, item))
                    .collect(),
            ),
            Value::Dictionary(dict) => Value::Dictionary(
                dict.iter()
                    .map(|(key, entry)| (key.clone(), self.encrypt_value(id, entry)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Decrypt every string in `value` in place. Strings that decrypt
    /// to a `D:` timestamp come back as dates.
    pub fn decrypt_value(&self, id: ObjectId, value: &mut Value) -> Result<()> {
        match value {
            Value::String(s) => {
                let plain = self.decrypt_data(id, s)?;
                *value = match crate::object::parse_date(&plain) {
                    Some(stamp) => Value::Date(stamp),
                    None => Value::string(plain),
                };
            }
            Value::Binary(b) => {
                let plain = self.decrypt_data(id, b)?;
                *value = match crate::object::parse_date(&plain) {
                    Some(stamp) => Value::Date(stamp),
                    None => Value::binary(plain),
                };
            }
            Value::Array(items) => {
                for item in items {
                    self.decrypt_value(id, item)?;
                }
            }
            Value::Dictionary(dict) => {
                for entry in dict.values_mut() {
                    self.decrypt_value(id, entry)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Decrypt string or stream bytes belonging to object `id`.
    pub fn decrypt_data(&self, id: ObjectId, data: &[u8]) -> Result<Vec<u8>> {
        let key = self.object_key(id);
        if self.mode.is_aes() {
            if data.len() < 16 {
                return Err(PdfError::Encryption(
                    "AES data too short to hold an IV".into(),
                ));
            }
            let key: [u8; 16] = key.try_into().expect("AES object keys are 16 bytes");
            let iv: [u8; 16] = data[..16].try_into().expect("sliced 16 bytes");
            aes128_cbc_decrypt(&key, &iv, &data[16..])
        } else {
            let mut out = data.to_vec();
            Rc4::new(&key).crypt(&mut out);
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::PasswordList;

    const FILE_ID: &[u8] = b"\x01\x23\x45\x67\x89\xab\xcd\xef\x01\x23\x45\x67\x89\xab\xcd\xef";

    fn options(mode: EncryptionMode) -> EncryptionOptions {
        EncryptionOptions::new(mode)
            .owner_password("owner")
            .user_password("user")
            .permissions(Permissions::PRINT)
    }

    #[test]
    fn pad_password_truncates_and_fills() {
        let short = pad_password(b"ab");
        assert_eq!(&short[..2], b"ab");
        assert_eq!(&short[2..], &PAD[..30]);
        let long = pad_password(&[b'x'; 40]);
        assert_eq!(long, [b'x'; 32]);
    }

    #[test]
    fn unlock_with_user_password() {
        for mode in [EncryptionMode::Rc4_128, EncryptionMode::Aes128] {
            let (written, dict) = SecurityHandler::create(&options(mode), FILE_ID).unwrap();
            let mut provider = PasswordList(vec![b"user".to_vec()]);
            let opened = SecurityHandler::unlock(&dict, FILE_ID, &mut provider).unwrap();
            assert_eq!(opened.permissions(), Permissions::PRINT);
            assert_eq!(opened.file_key, written.file_key);
        }
    }

    #[test]
    fn unlock_with_owner_password() {
        for mode in [EncryptionMode::Rc4_128, EncryptionMode::Aes128] {
            let (_, dict) = SecurityHandler::create(&options(mode), FILE_ID).unwrap();
            let mut provider = PasswordList(vec![b"owner".to_vec()]);
            let opened = SecurityHandler::unlock(&dict, FILE_ID, &mut provider).unwrap();
            assert_eq!(opened.permissions(), Permissions::PRINT);
        }
    }

    #[test]
    fn wrong_passwords_exhaust_attempts() {
        let (_, dict) = SecurityHandler::create(&options(EncryptionMode::Aes128), FILE_ID).unwrap();
        let mut provider =
            PasswordList(vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]);
        let err = SecurityHandler::unlock(&dict, FILE_ID, &mut provider).unwrap_err();
        assert!(matches!(err, PdfError::Encryption(_)));
    }

    #[test]
    fn object_data_roundtrip_rc4() {
        let (handler, _) = SecurityHandler::create(&options(EncryptionMode::Rc4_128), FILE_ID).unwrap();
        let id = ObjectId::new(7, 0);
        let plain = b"BT (secret) Tj ET".to_vec();
        let sealed = handler.encrypt_data(id, &plain);
        assert_ne!(sealed, plain);
        assert_eq!(handler.decrypt_data(id, &sealed).unwrap(), plain);
        // A different object key yields different bytes.
        assert_ne!(handler.encrypt_data(ObjectId::new(8, 0), &plain), sealed);
    }

    #[test]
    fn object_data_roundtrip_aes() {
        let (handler, _) = SecurityHandler::create(&options(EncryptionMode::Aes128), FILE_ID).unwrap();
        let id = ObjectId::new(3, 0);
        let plain = b"hello aes".to_vec();
        let sealed = handler.encrypt_data(id, &plain);
        assert_eq!(sealed.len() % 16, 0);
        assert!(sealed.len() >= 32, "IV plus at least one block");
        assert_eq!(handler.decrypt_data(id, &sealed).unwrap(), plain);
        // Fresh IV every time.
        assert_ne!(handler.encrypt_data(id, &plain), sealed);
    }

    #[test]
    fn empty_owner_password_falls_back_to_user() {
        let opts = EncryptionOptions::new(EncryptionMode::Rc4_128).user_password("user");
        let (_, dict) = SecurityHandler::create(&opts, FILE_ID).unwrap();
        // The user password then also opens the owner path.
        let mut provider = PasswordList(vec![b"user".to_vec()]);
        assert!(SecurityHandler::unlock(&dict, FILE_ID, &mut provider).is_ok());
    }
}
