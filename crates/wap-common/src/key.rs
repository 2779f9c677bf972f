//! Content-hash keys.
//!
//! A [`DeterministicKey`] is a pure function of the fields it is built
//! from: the same fields always produce the same key, on every run and on
//! every machine. Reruns stay idempotent without remembering which keys a
//! previous run handed out.

use std::fmt;

use sha2::Digest;

/// Tag written in place of a missing field.
const NULL_TAG: u8 = 0x00;
/// Tag written before a present field's length and bytes.
const VALUE_TAG: u8 = 0x01;

/// Hex-encoded key derived from the first 16 bytes of a SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeterministicKey(String);

impl DeterministicKey {
    /// Hash an ordered list of fields into a key.
    ///
    /// Each field is tagged and length-prefixed, so field order, field
    /// boundaries and `None` versus any string value all change the key
    /// whatever bytes the values contain.
    pub fn from_fields<'a, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut hasher = sha2::Sha256::new();
        for field in fields {
            match field {
                Some(value) => {
                    hasher.update([VALUE_TAG]);
                    hasher.update((value.len() as u64).to_le_bytes());
                    hasher.update(value.as_bytes());
                }
                None => hasher.update([NULL_TAG]),
            }
        }
        let digest: [u8; 32] = hasher.finalize().into();
        Self(hex::encode(&digest[..16]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DeterministicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
