//! Reference hash database: an ordered list of `(name, phash)` entries
//! persisted as pretty JSON.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::hash::Phash;

/// One pre-hashed reference card image.
///
/// Names are free-form and not required to be unique; multiple printings of
/// the same card may share one. Ties are broken by hash distance at
/// recognition time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceCard {
    pub name: String,
    pub phash: Phash,
}

impl ReferenceCard {
    pub fn new(name: impl Into<String>, phash: Phash) -> Self {
        Self {
            name: name.into(),
            phash,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DbError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("mixed hash widths in database: entry {index} has {got} bits, expected {expected}")]
    MixedHashWidth {
        index: usize,
        expected: usize,
        got: usize,
    },
}

/// Ordered reference database. Loaded once at startup, immutable afterwards;
/// shared by reference across scan workers.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HashDb {
    pub entries: Vec<ReferenceCard>,
}

impl HashDb {
    pub fn new(entries: Vec<ReferenceCard>) -> Self {
        Self { entries }
    }

    /// Load from JSON, rejecting databases that mix hash widths.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let raw = fs::read_to_string(path)?;
        let db: HashDb = serde_json::from_str(&raw)?;
        db.check_uniform_width()?;
        Ok(db)
    }

    /// Write as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), DbError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Hash width in bits, `None` when the database is empty.
    pub fn hash_bits(&self) -> Option<usize> {
        self.entries.first().map(|e| e.phash.bit_len())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn check_uniform_width(&self) -> Result<(), DbError> {
        let Some(expected) = self.hash_bits() else {
            return Ok(());
        };
        for (index, e) in self.entries.iter().enumerate() {
            let got = e.phash.bit_len();
            if got != expected {
                return Err(DbError::MixedHashWidth {
                    index,
                    expected,
                    got,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardscan_core::GrayImageView;

    fn hash_of_byte(fill: u8) -> Phash {
        let data = vec![fill; 64 * 64];
        Phash::of_gray(
            &GrayImageView {
                width: 64,
                height: 64,
                data: &data,
            },
            16,
        )
    }

    #[test]
    fn json_round_trip_preserves_entries() {
        let db = HashDb::new(vec![
            ReferenceCard::new("dragon_whelp", hash_of_byte(10)),
            ReferenceCard::new("dragon_whelp", hash_of_byte(200)),
            ReferenceCard::new("counterspell", hash_of_byte(90)),
        ]);

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("refs.json");
        db.write_json(&path).expect("write");

        let loaded = HashDb::load_json(&path).expect("load");
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.entries, db.entries);
        assert_eq!(loaded.hash_bits(), Some(256));
    }

    #[test]
    fn empty_database_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("empty.json");
        HashDb::default().write_json(&path).expect("write");
        let loaded = HashDb::load_json(&path).expect("load");
        assert!(loaded.is_empty());
        assert_eq!(loaded.hash_bits(), None);
    }

    #[test]
    fn mixed_widths_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mixed.json");

        // Hand-write a file with a 256-bit and a 16-bit hash.
        let json = format!(
            r#"{{"entries":[{{"name":"a","phash":"{}"}},{{"name":"b","phash":"beef"}}]}}"#,
            hash_of_byte(1).to_hex()
        );
        std::fs::write(&path, json).expect("write");

        let err = HashDb::load_json(&path).expect_err("mixed widths");
        assert!(matches!(
            err,
            DbError::MixedHashWidth {
                index: 1,
                expected: 256,
                got: 16
            }
        ));
    }
}
