//! access
//!
//! Write authorization against recipient lists.
//!
//! A user may change a path when they own at least one of the keys the
//! path is encrypted to. Key ownership lives outside the store, behind
//! [`KeyOwnership`].

use std::collections::HashMap;

use crate::store::{PassRead, StoreError};

/// Maps a user to the public key IDs they own.
pub trait KeyOwnership {
    fn public_key_ids(&self, user: &str) -> Vec<String>;
}

/// In-memory [`KeyOwnership`].
#[derive(Debug, Clone, Default)]
pub struct StaticKeyring {
    keys: HashMap<String, Vec<String>>,
}

impl StaticKeyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key_id` as owned by `user`.
    pub fn insert(&mut self, user: impl Into<String>, key_id: impl Into<String>) {
        self.keys.entry(user.into()).or_default().push(key_id.into());
    }

    pub fn with(mut self, user: impl Into<String>, key_id: impl Into<String>) -> Self {
        self.insert(user, key_id);
        self
    }
}

impl KeyOwnership for StaticKeyring {
    fn public_key_ids(&self, user: &str) -> Vec<String> {
        self.keys.get(user).cloned().unwrap_or_default()
    }
}

/// Whether a holder of `owned` keys may write `path`.
///
/// Key IDs compare case-insensitively. A path with no effective
/// recipients is writable by nobody.
pub fn can_write<R: PassRead + ?Sized>(
    tx: &R,
    path: &str,
    owned: &[String],
) -> Result<bool, StoreError> {
    let recipients = tx.recipients(path)?;
    Ok(recipients
        .as_slice()
        .iter()
        .any(|r| owned.iter().any(|k| k.eq_ignore_ascii_case(r))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Dirent, EntryKind, PassPath};

    /// Store with `.gpg-id` = `KEYA` at the root and nothing else.
    struct RootOnly;

    impl PassRead for RootOnly {
        fn entry_kind(&self, path: &str) -> Result<Option<EntryKind>, StoreError> {
            Ok(PassPath::new(path).is_root().then_some(EntryKind::Dir))
        }

        fn get(&self, path: &str) -> Result<Vec<u8>, StoreError> {
            match path {
                ".gpg-id" => Ok(b"KEYA\n".to_vec()),
                _ => Err(StoreError::NotFound {
                    path: PassPath::new(path),
                }),
            }
        }

        fn list(&self, _path: &str) -> Result<Vec<Dirent>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn keyring_lookup() {
        let ring = StaticKeyring::new().with("alice", "KEYA").with("alice", "KEYC");
        assert_eq!(ring.public_key_ids("alice"), ["KEYA", "KEYC"]);
        assert!(ring.public_key_ids("bob").is_empty());
    }

    #[test]
    fn owner_of_any_recipient_may_write() {
        let ring = StaticKeyring::new().with("alice", "keya").with("bob", "KEYB");
        assert!(can_write(&RootOnly, "x.gpg", &ring.public_key_ids("alice")).unwrap());
        assert!(!can_write(&RootOnly, "x.gpg", &ring.public_key_ids("bob")).unwrap());
        assert!(!can_write(&RootOnly, "x.gpg", &[]).unwrap());
    }
}
