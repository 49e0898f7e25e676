//! Deduplicating identifier tables
//!
//! An [`Identifier`] maps value rows to unique integer ids. Rows already present are
//! never stored twice and ids are never reused, so a table can be grown from many
//! independent sources while keeping a stable value to id mapping.
//!
//! ```rust
//! use ocgis_core::identifier::Identifier;
//!
//! let mut oid = Identifier::new([50i64, 55]).unwrap();
//! oid.add([55i64]).unwrap();
//! assert_eq!(oid.len(), 2);
//! oid.add([55i64, 56]).unwrap();
//! assert_eq!(oid.len(), 3);
//! assert_eq!(oid.get(55i64).unwrap(), 2);
//! ```

use crate::errors::{OcgError, OcgResult};
use crate::key::IdKey;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// Fails with [`OcgError::DuplicateKey`] if any id appears twice.
pub(crate) fn ensure_unique_ids(uids: impl IntoIterator<Item = i64>) -> OcgResult<()> {
    let mut seen = BTreeSet::new();
    for uid in uids {
        if !seen.insert(uid) {
            return Err(OcgError::DuplicateKey(format!("uid {} is not unique", uid)));
        }
    }
    Ok(())
}

/// Ordered table of `(uid, row)` pairs
///
/// Rows are unique [`IdKey`]s and ids are unique and kept in ascending order. The table
/// only grows: rows are never removed and ids are never reassigned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Identifier {
    uid: Vec<i64>,
    rows: Vec<IdKey>,
    index: BTreeMap<IdKey, i64>,
    used: BTreeSet<i64>,
}

impl Identifier {
    /// Create a table from initial rows, assigning ids 1, 2, ...
    pub fn new<K: Into<IdKey>>(values: impl IntoIterator<Item = K>) -> OcgResult<Self> {
        let mut ret = Self::default();
        ret.add(values)?;
        Ok(ret)
    }

    /// Create a table from initial rows with one explicit, unique id per row
    pub fn with_uids<K: Into<IdKey>>(
        values: impl IntoIterator<Item = K>,
        init_uids: &[i64],
    ) -> OcgResult<Self> {
        let mut ret = Self::default();
        ret.add_with_uids(values, init_uids)?;
        Ok(ret)
    }

    /// A table without rows
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of stored rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Ids in ascending order
    pub fn uid(&self) -> &[i64] {
        &self.uid
    }

    /// Stored `(uid, row)` pairs in ascending id order
    pub fn storage(&self) -> impl Iterator<Item = (i64, &IdKey)> + '_ {
        self.uid.iter().copied().zip(self.rows.iter())
    }

    /// True if `value` is a stored row
    pub fn contains(&self, value: impl Into<IdKey>) -> bool {
        self.index.contains_key(&value.into())
    }

    fn next_uid(&self) -> i64 {
        self.used.iter().next_back().map_or(1, |max| max + 1)
    }

    fn insert(&mut self, value: IdKey, uid: i64) {
        self.index.insert(value.clone(), uid);
        self.used.insert(uid);
        let pos = self.uid.partition_point(|existing| *existing < uid);
        self.rows.insert(pos, value);
        self.uid.insert(pos, uid);
    }

    /// Add rows that are not yet present and return the id of every input row
    ///
    /// New rows receive the next unused ids in row order.
    pub fn add<K: Into<IdKey>>(
        &mut self,
        values: impl IntoIterator<Item = K>,
    ) -> OcgResult<Vec<i64>> {
        let before = self.len();
        let mut next = self.next_uid();
        let mut ret = Vec::new();
        for value in values.into_iter().map(Into::into) {
            let uid = match self.index.get(&value) {
                Some(uid) => *uid,
                None => {
                    let uid = next;
                    next += 1;
                    self.insert(value, uid);
                    uid
                }
            };
            ret.push(uid);
        }
        self.log_growth(before);
        Ok(ret)
    }

    /// Add rows under explicit ids
    ///
    /// The ids must be unique among themselves and, for rows that are new, unused by
    /// the table. Re-adding a stored `(value, uid)` pair is a no-op, while re-adding a
    /// stored value under a different id is an error. Nothing is added if validation
    /// fails.
    pub fn add_with_uids<K: Into<IdKey>>(
        &mut self,
        values: impl IntoIterator<Item = K>,
        uids: &[i64],
    ) -> OcgResult<Vec<i64>> {
        let values: Vec<IdKey> = values.into_iter().map(Into::into).collect();
        if uids.len() != values.len() {
            return Err(OcgError::ShapeMismatch(format!(
                "{} uids supplied for {} values",
                uids.len(),
                values.len()
            )));
        }
        ensure_unique_ids(uids.iter().copied())?;

        let mut pending: BTreeMap<IdKey, i64> = BTreeMap::new();
        for (value, uid) in values.iter().zip(uids.iter().copied()) {
            match self.index.get(value) {
                Some(existing) if *existing == uid => continue,
                Some(existing) => {
                    return Err(OcgError::DuplicateKey(format!(
                        "value {} is stored with uid {}, not {}",
                        value, existing, uid
                    )))
                }
                None => {
                    if self.used.contains(&uid) {
                        return Err(OcgError::DuplicateKey(format!(
                            "uid {} is already assigned to another value",
                            uid
                        )));
                    }
                    if pending.insert(value.clone(), uid).is_some() {
                        return Err(OcgError::DuplicateKey(format!(
                            "value {} supplied with more than one uid",
                            value
                        )));
                    }
                }
            }
        }

        let before = self.len();
        for (value, uid) in values.into_iter().zip(uids.iter().copied()) {
            if pending.contains_key(&value) && !self.index.contains_key(&value) {
                self.insert(value, uid);
            }
        }
        self.log_growth(before);
        Ok(uids.to_vec())
    }

    fn log_growth(&self, before: usize) {
        if self.len() > before {
            debug!("identifier table grew from {} to {} rows", before, self.len());
        }
    }

    /// Id of a stored row
    pub fn get(&self, value: impl Into<IdKey>) -> OcgResult<i64> {
        let value = value.into();
        self.index
            .get(&value)
            .copied()
            .ok_or_else(|| OcgError::Lookup(format!("value {} is not in the table", value)))
    }

    /// Ids of several stored rows, in input order
    pub fn get_many<K: Into<IdKey>>(
        &self,
        values: impl IntoIterator<Item = K>,
    ) -> OcgResult<Vec<i64>> {
        values.into_iter().map(|v| self.get(v)).collect()
    }
}
