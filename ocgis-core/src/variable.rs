//! Variables binding a 4-D value array to its dimensions
//!
//! Values are indexed `[time, level, row, col]`. A variable without a level dimension
//! still carries a level axis of length one.
//!
//! A variable moves through a small life cycle:
//!
//! * `aggregate` collapses the spatial grid into one cell holding the weighted mean.
//!   The unaggregated values are kept in `raw_value`.
//! * `group` buckets the time axis by calendar fields. Values computed per group are
//!   attached with `add_calc_value` under a calculation name.

use crate::config::DEFAULT_FILL_VALUE;
use crate::dimension::{LevelDimension, RenameToken};
use crate::errors::{OcgError, OcgResult};
use crate::masked::MaskedArray;
use crate::spatial::SpatialDimension;
use crate::temporal::{DatePart, TemporalDimension, TemporalGroupDimension};
use indexmap::IndexMap;
use log::debug;
use ndarray::{s, Array4, Ix2, Ix4};

/// Values indexed `[time, level, row, col]`
pub type VariableArray = MaskedArray<f64, Ix4>;

/// Dimensions of a variable whose output names can be changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionKind {
    Temporal,
    TemporalGroup,
    Level,
    Spatial,
}

/// A named value array bound to its temporal, level and spatial dimensions
///
/// The value shape always matches the current dimension lengths, and every calculated
/// array matches the current temporal grouping.
#[derive(Debug, Clone, PartialEq)]
pub struct OcgVariable {
    name: String,
    uri: Option<String>,
    value: VariableArray,
    temporal: TemporalDimension,
    spatial: SpatialDimension,
    level: Option<LevelDimension>,
    raw_value: Option<VariableArray>,
    temporal_group: Option<TemporalGroupDimension>,
    calc_value: IndexMap<String, VariableArray>,
}

impl OcgVariable {
    /// Bind `value` to its dimensions
    ///
    /// Fails with [`OcgError::ShapeMismatch`] unless `value` has the shape
    /// `(time, max(level, 1), rows, cols)`.
    pub fn new(
        name: impl Into<String>,
        value: VariableArray,
        temporal: TemporalDimension,
        spatial: SpatialDimension,
        level: Option<LevelDimension>,
    ) -> OcgResult<Self> {
        let ret = Self {
            name: name.into(),
            uri: None,
            value,
            temporal,
            spatial,
            level,
            raw_value: None,
            temporal_group: None,
            calc_value: IndexMap::new(),
        };
        ret.check_shape(&ret.value, ret.time_len(), "value")?;
        Ok(ret)
    }

    /// Location the variable was read from
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// A variable with no time steps, no spatial cells and no level
    pub fn get_empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: None,
            value: MaskedArray::unmasked(Array4::zeros((0, 1, 0, 0))),
            temporal: TemporalDimension::empty(),
            spatial: SpatialDimension::empty(),
            level: None,
            raw_value: None,
            temporal_group: None,
            calc_value: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// Current values, aggregated if [`Self::aggregate`] was called
    pub fn value(&self) -> &VariableArray {
        &self.value
    }

    /// Values before spatial aggregation
    pub fn raw_value(&self) -> Option<&VariableArray> {
        self.raw_value.as_ref()
    }

    pub fn temporal(&self) -> &TemporalDimension {
        &self.temporal
    }

    pub fn spatial(&self) -> &SpatialDimension {
        &self.spatial
    }

    pub fn level(&self) -> Option<&LevelDimension> {
        self.level.as_ref()
    }

    /// Grouping of the time axis, set by [`Self::group`]
    pub fn temporal_group(&self) -> Option<&TemporalGroupDimension> {
        self.temporal_group.as_ref()
    }

    /// Calculated values per temporal group, by calculation name
    pub fn calc_value(&self) -> &IndexMap<String, VariableArray> {
        &self.calc_value
    }

    /// Length of the level axis of the value array
    pub fn level_len(&self) -> usize {
        self.level.as_ref().map_or(1, |level| level.len().max(1))
    }

    pub fn time_len(&self) -> usize {
        self.temporal.len()
    }

    /// True when there is no time step or no unmasked spatial cell
    pub fn is_empty(&self) -> bool {
        self.temporal.is_empty() || self.spatial.is_empty()
    }

    fn check_shape(&self, array: &VariableArray, n_time: usize, what: &str) -> OcgResult<()> {
        let (rows, cols) = self.spatial.grid_shape();
        let expected = [n_time, self.level_len(), rows, cols];
        if array.shape() != expected {
            return Err(OcgError::ShapeMismatch(format!(
                "{} of {} has shape {:?}, expected {:?}",
                what,
                self.name,
                array.shape(),
                expected
            )));
        }
        Ok(())
    }

    /// Collapse the spatial grid into a single cell
    ///
    /// Each `(time, level)` slice becomes the weighted mean of its unmasked cells.
    /// Calculated values are aggregated the same way. Slices without any unmasked cell
    /// stay masked.
    pub fn aggregate(&mut self) -> OcgResult<()> {
        if self.spatial.is_empty() {
            return Err(OcgError::ShapeMismatch(format!(
                "{} has no unmasked spatial cells to aggregate",
                self.name
            )));
        }
        let weights = self.spatial.weights();
        let value = weighted_mean(&self.value, weights)?;
        let calc_value = self
            .calc_value
            .iter()
            .map(|(name, array)| Ok((name.clone(), weighted_mean(array, weights)?)))
            .collect::<OcgResult<IndexMap<_, _>>>()?;

        self.spatial.aggregate()?;
        let raw = std::mem::replace(&mut self.value, value);
        if self.raw_value.is_none() {
            self.raw_value = Some(raw);
        }
        self.calc_value = calc_value;

        debug!("aggregated variable {}", self.name);
        Ok(())
    }

    /// Group the time axis by calendar fields
    ///
    /// The previous grouping is replaced. Calculated values survive only when the date
    /// parts are unchanged, so calculations can be added across repeated calls.
    pub fn group(&mut self, parts: &[DatePart]) -> OcgResult<&TemporalGroupDimension> {
        let grouped = self.temporal.group(parts)?;
        let same_parts = self
            .temporal_group
            .as_ref()
            .is_some_and(|tgdim| tgdim.parts() == grouped.parts());
        if !same_parts && !self.calc_value.is_empty() {
            debug!(
                "dropping {} calculations of {} after regrouping",
                self.calc_value.len(),
                self.name
            );
            self.calc_value.clear();
        }
        Ok(&*self.temporal_group.insert(grouped))
    }

    /// Attach values computed per temporal group
    ///
    /// `value` must have the shape `(groups, levels, rows, cols)`. An existing
    /// calculation of the same name is replaced.
    pub fn add_calc_value(&mut self, name: impl Into<String>, value: VariableArray) -> OcgResult<()> {
        let name = name.into();
        let n_groups = match &self.temporal_group {
            Some(tgdim) => tgdim.len(),
            None => {
                return Err(OcgError::InvalidGroup(format!(
                    "{} must be grouped before calculation {} can be added",
                    self.name, name
                )))
            }
        };
        self.check_shape(&value, n_groups, &name)?;
        self.calc_value.insert(name, value);
        Ok(())
    }

    /// Change the output names of one dimension
    ///
    /// Returns `None` if the variable does not have that dimension.
    pub fn rename_dimension(
        &mut self,
        kind: DimensionKind,
        uid: &str,
        value: &str,
    ) -> Option<RenameToken> {
        match kind {
            DimensionKind::Temporal => Some(self.temporal.rename(uid, value)),
            DimensionKind::TemporalGroup => {
                self.temporal_group.as_mut().map(|tgdim| tgdim.rename(uid, value))
            }
            DimensionKind::Level => self.level.as_mut().map(|level| level.rename(uid, value)),
            DimensionKind::Spatial => Some(self.spatial.rename(uid, value)),
        }
    }

    /// Undo [`Self::rename_dimension`]
    pub fn restore_dimension(&mut self, kind: DimensionKind, token: RenameToken) {
        match kind {
            DimensionKind::Temporal => self.temporal.restore(token),
            DimensionKind::TemporalGroup => {
                if let Some(tgdim) = self.temporal_group.as_mut() {
                    tgdim.restore(token)
                }
            }
            DimensionKind::Level => {
                if let Some(level) = self.level.as_mut() {
                    level.restore(token)
                }
            }
            DimensionKind::Spatial => self.spatial.restore(token),
        }
    }
}

/// Weighted mean over the last two axes, skipping masked cells and NaN
fn weighted_mean(
    values: &VariableArray,
    weights: &MaskedArray<f64, Ix2>,
) -> OcgResult<VariableArray> {
    let (n_time, n_level, _, _) = values.data().dim();
    let fill = values.fill_value().copied().unwrap_or(DEFAULT_FILL_VALUE);
    let mut data = Array4::from_elem((n_time, n_level, 1, 1), fill);
    let mut mask = Array4::from_elem((n_time, n_level, 1, 1), true);

    for time in 0..n_time {
        for level in 0..n_level {
            let slice = values.data().slice(s![time, level, .., ..]);
            let slice_mask = values.mask().slice(s![time, level, .., ..]);
            let mut sum = 0.0;
            let mut total_weight = 0.0;
            for ((idx, v), masked) in slice.indexed_iter().zip(slice_mask.iter()) {
                if *masked || v.is_nan() || weights.is_masked(idx) {
                    continue;
                }
                let weight = weights.data()[idx];
                sum += v * weight;
                total_weight += weight;
            }
            if total_weight > 0.0 {
                data[[time, level, 0, 0]] = sum / total_weight;
                mask[[time, level, 0, 0]] = false;
            }
        }
    }

    Ok(MaskedArray::new(data, mask)?.with_fill_value(fill))
}
