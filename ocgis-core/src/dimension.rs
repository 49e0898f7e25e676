//! Dimensions of gridded variables
//!
//! A [`Dimension`] holds parallel arrays of unique ids and values, plus optional
//! lower/upper bounds for each value. The value type decides the default output names
//! through [`DimensionValue`], so a temporal dimension writes `tid`/`time` and a level
//! dimension writes `lid`/`level`.
//!
//! ```rust
//! use ndarray::array;
//! use ocgis_core::dimension::{Dimension, LevelDimension};
//!
//! let dim = LevelDimension::new(array![1, 2], array![50.0, 150.0], None).unwrap();
//! assert_eq!(dim.shape(), (2,));
//! assert_eq!(dim.names().value(), "level");
//!
//! let generic = Dimension::new(array![1, 2], array![50i64, 150], None).unwrap();
//! assert_eq!(generic.iter().count(), 2);
//! ```

use crate::errors::{OcgError, OcgResult};
use crate::field::Field;
use crate::identifier::ensure_unique_ids;
use crate::key::Scalar;
use chrono::NaiveDateTime;
use ndarray::{Array1, Array2};
use std::fmt::Debug;

/// Value types a [`Dimension`] can hold
pub trait DimensionValue: Clone + PartialOrd + Debug {
    /// Default output name of the id column
    const UID_NAME: &'static str;
    /// Default output name of the value column
    const VALUE_NAME: &'static str;

    fn to_field(&self) -> Field;

    fn to_scalar(&self) -> Scalar;
}

impl DimensionValue for i64 {
    const UID_NAME: &'static str = "uid";
    const VALUE_NAME: &'static str = "value";

    fn to_field(&self) -> Field {
        Field::Int(*self)
    }

    fn to_scalar(&self) -> Scalar {
        Scalar::Int(*self)
    }
}

impl DimensionValue for f64 {
    const UID_NAME: &'static str = "lid";
    const VALUE_NAME: &'static str = "level";

    fn to_field(&self) -> Field {
        Field::Float(*self)
    }

    fn to_scalar(&self) -> Scalar {
        Scalar::Float(*self)
    }
}

impl DimensionValue for NaiveDateTime {
    const UID_NAME: &'static str = "tid";
    const VALUE_NAME: &'static str = "time";

    fn to_field(&self) -> Field {
        Field::DateTime(*self)
    }

    fn to_scalar(&self) -> Scalar {
        Scalar::DateTime(*self)
    }
}

/// Output names of a dimension's id and value columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionNames {
    uid: String,
    value: String,
}

impl DimensionNames {
    pub fn new(uid: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            value: value.into(),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Switch to new names, returning a token that restores the current ones
    pub fn rename(&mut self, uid: impl Into<String>, value: impl Into<String>) -> RenameToken {
        let previous = std::mem::replace(self, Self::new(uid, value));
        RenameToken { previous }
    }

    pub fn restore(&mut self, token: RenameToken) {
        *self = token.previous;
    }
}

/// Previous names of a renamed dimension
#[must_use = "a rename token must be handed back to `restore`"]
#[derive(Debug)]
pub struct RenameToken {
    previous: DimensionNames,
}

/// A single element of a dimension
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionRow<T> {
    pub uid: i64,
    pub value: T,
    pub bounds: Option<(T, T)>,
}

/// One-dimensional coordinate with a unique id per element
///
/// `uid` and `value` have the same length, and `bounds`, when present, has one
/// `[lower, upper]` row per element.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension<T> {
    uid: Array1<i64>,
    value: Array1<T>,
    bounds: Option<Array2<T>>,
    names: DimensionNames,
}

/// Vertical levels
pub type LevelDimension = Dimension<f64>;

impl<T: DimensionValue> Dimension<T> {
    /// Create a dimension from parallel id and value arrays
    ///
    /// `bounds`, when given, must have one `[lower, upper]` row per value.
    pub fn new(uid: Array1<i64>, value: Array1<T>, bounds: Option<Array2<T>>) -> OcgResult<Self> {
        if uid.len() != value.len() {
            return Err(OcgError::ShapeMismatch(format!(
                "{} uids for {} values",
                uid.len(),
                value.len()
            )));
        }
        if let Some(bounds) = &bounds {
            if bounds.dim() != (value.len(), 2) {
                return Err(OcgError::ShapeMismatch(format!(
                    "bounds shape {:?} does not match {} values",
                    bounds.shape(),
                    value.len()
                )));
            }
        }
        ensure_unique_ids(uid.iter().copied())?;

        Ok(Self {
            uid,
            value,
            bounds,
            names: DimensionNames::new(T::UID_NAME, T::VALUE_NAME),
        })
    }

    /// A dimension with no elements
    pub fn empty() -> Self {
        Self {
            uid: Array1::zeros(0),
            value: Array1::from(Vec::new()),
            bounds: None,
            names: DimensionNames::new(T::UID_NAME, T::VALUE_NAME),
        }
    }

    pub fn with_names(mut self, uid: impl Into<String>, value: impl Into<String>) -> Self {
        self.names = DimensionNames::new(uid, value);
        self
    }

    pub fn shape(&self) -> (usize,) {
        (self.value.len(),)
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn uid(&self) -> &Array1<i64> {
        &self.uid
    }

    pub fn value(&self) -> &Array1<T> {
        &self.value
    }

    pub fn bounds(&self) -> Option<&Array2<T>> {
        self.bounds.as_ref()
    }

    /// Lower and upper bound of element `index`
    pub fn bounds_at(&self, index: usize) -> Option<(T, T)> {
        let bounds = self.bounds.as_ref()?;
        Some((
            bounds.get((index, 0))?.clone(),
            bounds.get((index, 1))?.clone(),
        ))
    }

    pub fn names(&self) -> &DimensionNames {
        &self.names
    }

    /// Temporarily rename the output columns. Hand the token back to [`Self::restore`].
    pub fn rename(&mut self, uid: impl Into<String>, value: impl Into<String>) -> RenameToken {
        self.names.rename(uid, value)
    }

    pub fn restore(&mut self, token: RenameToken) {
        self.names.restore(token)
    }

    pub fn iter(&self) -> impl Iterator<Item = DimensionRow<T>> + '_ {
        (0..self.len()).map(move |idx| DimensionRow {
            uid: self.uid[idx],
            value: self.value[idx].clone(),
            bounds: self.bounds_at(idx),
        })
    }
}

/// Record-oriented view of a dimension with named fields
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredStorage<T> {
    field_names: [String; 2],
    records: Vec<(i64, T)>,
}

impl<T> StructuredStorage<T> {
    pub fn field_names(&self) -> [&str; 2] {
        [&self.field_names[0], &self.field_names[1]]
    }

    pub fn records(&self) -> &[(i64, T)] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl LevelDimension {
    /// `(uid, value)` records named after the current output names
    pub fn storage(&self) -> StructuredStorage<f64> {
        StructuredStorage {
            field_names: [self.names.uid.clone(), self.names.value.clone()],
            records: self
                .uid
                .iter()
                .copied()
                .zip(self.value.iter().copied())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn generic_dimension() {
        let bounds_options = [None, Some(array![[0i64, 100], [100, 200]])];
        for bounds in bounds_options {
            let has_bounds = bounds.is_some();
            let dim = Dimension::new(array![1, 2], array![50i64, 150], bounds).unwrap();
            assert_eq!(dim.shape(), (2,));

            let rows: Vec<_> = dim.iter().collect();
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[1].uid, 2);
            assert_eq!(rows[1].value, 150);
            if has_bounds {
                assert_eq!(rows[1].bounds, Some((100, 200)));
            } else {
                assert_eq!(rows[1].bounds, None);
            }
        }
    }

    #[test]
    fn length_mismatch() {
        let result = Dimension::new(array![1, 2, 3], array![50i64, 150], None);
        assert!(matches!(result, Err(OcgError::ShapeMismatch(_))));

        let result = Dimension::new(array![1, 2], array![50i64, 150], Some(array![[0i64, 100]]));
        assert!(matches!(result, Err(OcgError::ShapeMismatch(_))));
    }

    #[test]
    fn duplicate_uids() {
        let result = Dimension::new(array![1, 1], array![50i64, 150], None);
        assert!(matches!(result, Err(OcgError::DuplicateKey(_))));
    }

    #[test]
    fn level_storage() {
        for bounds in [None, Some(array![[0.0, 100.0], [100.0, 200.0]])] {
            let dim = LevelDimension::new(array![1, 2], array![50.0, 150.0], bounds).unwrap();
            assert_eq!(dim.shape(), (2,));
            let storage = dim.storage();
            assert_eq!(storage.field_names(), ["lid", "level"]);
            assert_eq!(storage.records(), &[(1, 50.0), (2, 150.0)]);
        }
    }

    #[test]
    fn rename_and_restore() {
        let mut dim = LevelDimension::new(array![1], array![2.0], None).unwrap();
        let token = dim.rename("level_id", "depth");
        assert_eq!(dim.storage().field_names(), ["level_id", "depth"]);
        dim.restore(token);
        assert_eq!(dim.names(), &DimensionNames::new("lid", "level"));
    }

    #[test]
    fn empty() {
        let dim = Dimension::<NaiveDateTime>::empty();
        assert_eq!(dim.shape(), (0,));
        assert!(dim.is_empty());
        assert_eq!(dim.names().uid(), "tid");
    }
}
