//! Temporal dimensions and calendar grouping
//!
//! [`TemporalDimension::group`] partitions timestamps into buckets that share the same
//! calendar fields, for example every January across all years when grouping by
//! [`DatePart::Month`]. The result is a [`TemporalGroupDimension`] holding one boolean
//! membership mask per group.
//!
//! # Representative values
//!
//! Each group is represented by the temporal midpoint between its earliest and latest
//! member timestamps. When the raw dimension has bounds, the group bounds span from the
//! smallest member lower bound to the largest member upper bound.

use crate::dimension::{Dimension, DimensionNames, RenameToken};
use crate::errors::{OcgError, OcgResult};
use chrono::{Datelike, NaiveDateTime, Timelike};
use indexmap::IndexMap;
use log::debug;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamps with optional `[start, end]` bounds
pub type TemporalDimension = Dimension<NaiveDateTime>;

/// Calendar field used as part of a grouping key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePart {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Microsecond,
}

impl DatePart {
    pub const ALL: [DatePart; 7] = [
        DatePart::Year,
        DatePart::Month,
        DatePart::Day,
        DatePart::Hour,
        DatePart::Minute,
        DatePart::Second,
        DatePart::Microsecond,
    ];

    /// Output header name
    pub fn name(&self) -> &'static str {
        match self {
            DatePart::Year => "year",
            DatePart::Month => "month",
            DatePart::Day => "day",
            DatePart::Hour => "hour",
            DatePart::Minute => "minute",
            DatePart::Second => "second",
            DatePart::Microsecond => "microsecond",
        }
    }

    pub fn extract(&self, time: &NaiveDateTime) -> i64 {
        match self {
            DatePart::Year => time.year() as i64,
            DatePart::Month => time.month() as i64,
            DatePart::Day => time.day() as i64,
            DatePart::Hour => time.hour() as i64,
            DatePart::Minute => time.minute() as i64,
            DatePart::Second => time.second() as i64,
            DatePart::Microsecond => (time.nanosecond() / 1_000) as i64,
        }
    }
}

impl fmt::Display for DatePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for DatePart {
    type Err = OcgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DatePart::ALL
            .iter()
            .find(|part| part.name() == s)
            .copied()
            .ok_or_else(|| OcgError::InvalidGroup(format!("unknown date part {:?}", s)))
    }
}

impl TemporalDimension {
    /// Group timestamps sharing the same values of `parts`
    ///
    /// Groups appear in the order their first member appears. Fails with
    /// [`OcgError::InvalidGroup`] if `parts` is empty or names a field twice.
    pub fn group(&self, parts: &[DatePart]) -> OcgResult<TemporalGroupDimension> {
        if parts.is_empty() {
            return Err(OcgError::InvalidGroup(
                "at least one date part is required".to_string(),
            ));
        }
        for (idx, part) in parts.iter().enumerate() {
            if parts[..idx].contains(part) {
                return Err(OcgError::InvalidGroup(format!(
                    "date part {} requested more than once",
                    part
                )));
            }
        }

        let mut members: IndexMap<Vec<i64>, Vec<usize>> = IndexMap::new();
        for (idx, time) in self.value().iter().enumerate() {
            let key = parts.iter().map(|part| part.extract(time)).collect();
            members.entry(key).or_default().push(idx);
        }

        let n_groups = members.len();
        let mut keys = Vec::with_capacity(n_groups);
        let mut values = Vec::with_capacity(n_groups);
        let mut bounds = Vec::with_capacity(n_groups * 2);
        let mut dgroups = Vec::with_capacity(n_groups);

        for (key, indices) in members {
            let times = indices.iter().map(|idx| self.value()[*idx]);
            // Every group has at least one member
            let (Some(first), Some(last)) = (times.clone().min(), times.max()) else {
                continue;
            };
            values.push(first + (last - first) / 2);

            if let Some(raw_bounds) = self.bounds() {
                let lower = indices.iter().map(|idx| raw_bounds[[*idx, 0]]).min();
                let upper = indices.iter().map(|idx| raw_bounds[[*idx, 1]]).max();
                if let (Some(lower), Some(upper)) = (lower, upper) {
                    bounds.push(lower);
                    bounds.push(upper);
                }
            }

            let mut dgroup = Array1::from_elem(self.len(), false);
            for idx in indices {
                dgroup[idx] = true;
            }
            dgroups.push(dgroup);
            keys.push(key);
        }

        let bounds = match self.bounds() {
            Some(_) => Some(Array2::from_shape_vec((n_groups, 2), bounds).map_err(|e| {
                OcgError::ShapeMismatch(format!("could not assemble group bounds: {}", e))
            })?),
            None => None,
        };

        debug!(
            "grouped {} timestamps by {:?} into {} groups",
            self.len(),
            parts,
            n_groups
        );

        Ok(TemporalGroupDimension {
            raw: self.clone(),
            parts: parts.to_vec(),
            keys,
            uid: (1..=n_groups as i64).collect(),
            value: Array1::from(values),
            bounds,
            dgroups,
            names: DimensionNames::new("tgid", "time"),
        })
    }
}

/// A single group of a [`TemporalGroupDimension`]
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalGroupRow<'a> {
    pub uid: i64,
    pub value: NaiveDateTime,
    pub bounds: Option<(NaiveDateTime, NaiveDateTime)>,
    /// Date-part values shared by every member, in the order of the grouping parts
    pub keys: &'a [i64],
    pub dgroup: &'a Array1<bool>,
}

/// Result of grouping a [`TemporalDimension`] by calendar fields
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalGroupDimension {
    raw: TemporalDimension,
    parts: Vec<DatePart>,
    keys: Vec<Vec<i64>>,
    uid: Array1<i64>,
    value: Array1<NaiveDateTime>,
    bounds: Option<Array2<NaiveDateTime>>,
    dgroups: Vec<Array1<bool>>,
    names: DimensionNames,
}

impl TemporalGroupDimension {
    /// The ungrouped dimension
    pub fn raw(&self) -> &TemporalDimension {
        &self.raw
    }

    pub fn parts(&self) -> &[DatePart] {
        &self.parts
    }

    pub fn keys(&self) -> &[Vec<i64>] {
        &self.keys
    }

    pub fn uid(&self) -> &Array1<i64> {
        &self.uid
    }

    pub fn value(&self) -> &Array1<NaiveDateTime> {
        &self.value
    }

    pub fn bounds(&self) -> Option<&Array2<NaiveDateTime>> {
        self.bounds.as_ref()
    }

    /// Membership mask of every group over the raw dimension
    pub fn dgroups(&self) -> &[Array1<bool>] {
        &self.dgroups
    }

    pub fn names(&self) -> &DimensionNames {
        &self.names
    }

    pub fn rename(&mut self, uid: impl Into<String>, value: impl Into<String>) -> RenameToken {
        self.names.rename(uid, value)
    }

    pub fn restore(&mut self, token: RenameToken) {
        self.names.restore(token)
    }

    pub fn len(&self) -> usize {
        self.uid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uid.is_empty()
    }

    pub fn shape(&self) -> (usize,) {
        (self.len(),)
    }

    pub fn iter(&self) -> impl Iterator<Item = TemporalGroupRow<'_>> + '_ {
        (0..self.len()).map(move |idx| TemporalGroupRow {
            uid: self.uid[idx],
            value: self.value[idx],
            bounds: self
                .bounds
                .as_ref()
                .map(|bounds| (bounds[[idx, 0]], bounds[[idx, 1]])),
            keys: &self.keys[idx],
            dgroup: &self.dgroups[idx],
        })
    }
}
