//! Masked arrays
//!
//! A [`MaskedArray`] pairs a dense ndarray buffer with a parallel boolean mask of the
//! same shape. A `true` mask entry marks the element as absent: it is skipped by every
//! reduction and never read back as a value.
//!
//! ```rust
//! use ndarray::array;
//! use ocgis_core::masked::MaskedArray;
//!
//! let values = MaskedArray::new(array![1.0, 2.0, 100.0], array![false, false, true]).unwrap();
//! assert_eq!(values.count(), 2);
//! assert_eq!(values.mean(), Some(1.5));
//! assert_eq!(values.get(2), None);
//! ```

use crate::errors::{OcgError, OcgResult};
use ndarray::{Array, Dimension, NdIndex, ShapeBuilder};
use num::Float;

/// An ndarray buffer with a parallel mask and an optional fill value
///
/// `data` and `mask` always share one shape. The fill value describes what masked
/// positions should be written as, it is never read back in place of data.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedArray<T, D: Dimension> {
    data: Array<T, D>,
    mask: Array<bool, D>,
    fill_value: Option<T>,
}

impl<T: Clone, D: Dimension> MaskedArray<T, D> {
    /// Pair `data` with `mask`
    ///
    /// Fails with [`OcgError::ShapeMismatch`] when the two shapes differ.
    pub fn new(data: Array<T, D>, mask: Array<bool, D>) -> OcgResult<Self> {
        if data.shape() != mask.shape() {
            return Err(OcgError::ShapeMismatch(format!(
                "data shape {:?} does not match mask shape {:?}",
                data.shape(),
                mask.shape()
            )));
        }
        Ok(Self {
            data,
            mask,
            fill_value: None,
        })
    }

    /// Wrap `data` with nothing masked
    pub fn unmasked(data: Array<T, D>) -> Self {
        let mask = Array::from_elem(data.raw_dim(), false);
        Self {
            data,
            mask,
            fill_value: None,
        }
    }

    /// An array of `shape` where every element is masked and holds `fill`
    pub fn masked_all<Sh>(shape: Sh, fill: T) -> Self
    where
        Sh: ShapeBuilder<Dim = D>,
    {
        let data = Array::from_elem(shape, fill.clone());
        let mask = Array::from_elem(data.raw_dim(), true);
        Self {
            data,
            mask,
            fill_value: Some(fill),
        }
    }

    pub fn with_fill_value(mut self, fill: T) -> Self {
        self.fill_value = Some(fill);
        self
    }

    pub fn fill_value(&self) -> Option<&T> {
        self.fill_value.as_ref()
    }

    pub fn data(&self) -> &Array<T, D> {
        &self.data
    }

    pub fn mask(&self) -> &Array<bool, D> {
        &self.mask
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn raw_dim(&self) -> D {
        self.data.raw_dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Out of bounds indices count as masked.
    pub fn is_masked<I: NdIndex<D>>(&self, index: I) -> bool {
        self.mask.get(index).copied().unwrap_or(true)
    }

    /// Element at `index`, or `None` if it is masked or out of bounds
    pub fn get<I: NdIndex<D> + Copy>(&self, index: I) -> Option<&T> {
        if self.is_masked(index) {
            None
        } else {
            self.data.get(index)
        }
    }

    /// Number of unmasked elements
    pub fn count(&self) -> usize {
        self.mask.iter().filter(|m| !**m).count()
    }

    /// Unmasked elements in logical order
    pub fn compressed(&self) -> Vec<T> {
        self.data
            .iter()
            .zip(self.mask.iter())
            .filter(|(_, m)| !**m)
            .map(|(v, _)| v.clone())
            .collect()
    }

    pub fn into_parts(self) -> (Array<T, D>, Array<bool, D>) {
        (self.data, self.mask)
    }
}

impl<T: Clone + PartialEq, D: Dimension> MaskedArray<T, D> {
    /// Whether `value` equals the fill value of this array
    pub fn is_fill(&self, value: &T) -> bool {
        self.fill_value.as_ref() == Some(value)
    }
}

impl<T: Float, D: Dimension> MaskedArray<T, D> {
    /// Mean of the unmasked elements, `None` when everything is masked
    pub fn mean(&self) -> Option<T> {
        let (sum, n) = self
            .data
            .iter()
            .zip(self.mask.iter())
            .filter(|(_, m)| !**m)
            .fold((T::zero(), 0usize), |(sum, n), (v, _)| (sum + *v, n + 1));
        if n == 0 {
            None
        } else {
            Some(sum / <T as num::NumCast>::from(n)?)
        }
    }
}
