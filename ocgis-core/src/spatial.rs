//! Spatial dimensions of gridded climate data
//!
//! A [`SpatialDimension`] is a 2-D grid of cell geometries with a unique id per cell.
//! Cells outside the area of interest are masked, and the mask is shared by the ids,
//! the geometries and the aggregation weights.
//!
//! Weights follow [`Weighting`]: by default each cell is weighted by its area relative
//! to the largest unmasked cell, falling back to uniform weights for point grids.
//!
//! # Examples
//!
//! ```rust
//! use geo::{Geometry, Point};
//! use ndarray::{array, Array2};
//! use ocgis_core::spatial::SpatialDimension;
//!
//! let geoms = Array2::from_shape_fn((2, 2), |(r, c)| {
//!     Geometry::Point(Point::new(c as f64, r as f64))
//! });
//! let mask = array![[false, true], [false, false]];
//! let mut sdim = SpatialDimension::new(array![[1, 2], [3, 4]], geoms, mask).unwrap();
//! assert_eq!(sdim.len(), 3);
//!
//! sdim.aggregate().unwrap();
//! assert_eq!(sdim.len(), 1);
//! assert_eq!(sdim.shape(), vec![1]);
//! ```

use crate::config::{OcgConfig, Weighting};
use crate::dimension::{DimensionNames, RenameToken};
use crate::errors::{OcgError, OcgResult};
use crate::identifier::ensure_unique_ids;
use crate::masked::MaskedArray;
use geo::{Area, BooleanOps, Geometry, GeometryCollection, MultiPoint, MultiPolygon, Point};
use log::debug;
use ndarray::{Array2, Ix2};

/// A single unmasked cell of a [`SpatialDimension`]
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialRow<'a> {
    pub row: usize,
    pub col: usize,
    pub uid: i64,
    pub geometry: &'a Geometry<f64>,
    pub weight: f64,
}

/// A masked grid of cell geometries with ids and aggregation weights
///
/// The ids, geometries and weights share one mask. Once [`Self::aggregate`]d the grid
/// holds a single cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialDimension {
    uid: MaskedArray<i64, Ix2>,
    value: MaskedArray<Geometry<f64>, Ix2>,
    weights: MaskedArray<f64, Ix2>,
    names: DimensionNames,
    aggregated: bool,
}

impl SpatialDimension {
    /// Create a spatial dimension with area weights
    pub fn new(
        uid: Array2<i64>,
        geometries: Array2<Geometry<f64>>,
        mask: Array2<bool>,
    ) -> OcgResult<Self> {
        Self::with_weighting(uid, geometries, mask, Weighting::Area)
    }

    /// Create a spatial dimension weighted as configured
    pub fn from_config(
        uid: Array2<i64>,
        geometries: Array2<Geometry<f64>>,
        mask: Array2<bool>,
        config: &OcgConfig,
    ) -> OcgResult<Self> {
        Self::with_weighting(uid, geometries, mask, config.weighting)
    }

    /// Create a spatial dimension
    ///
    /// `uid`, `geometries` and `mask` must share one shape, and the ids of unmasked
    /// cells must be unique.
    pub fn with_weighting(
        uid: Array2<i64>,
        geometries: Array2<Geometry<f64>>,
        mask: Array2<bool>,
        weighting: Weighting,
    ) -> OcgResult<Self> {
        if uid.dim() != geometries.dim() {
            return Err(OcgError::ShapeMismatch(format!(
                "uid grid {:?} does not match geometry grid {:?}",
                uid.shape(),
                geometries.shape()
            )));
        }
        let uid = MaskedArray::new(uid, mask.clone())?;
        ensure_unique_ids(uid.compressed())?;

        let weights = cell_weights(&geometries, &mask, weighting);
        let weights = MaskedArray::new(weights, mask.clone())?;
        let value = MaskedArray::new(geometries, mask)?;

        Ok(Self {
            uid,
            value,
            weights,
            names: DimensionNames::new("gid", "geom"),
            aggregated: false,
        })
    }

    /// A dimension with no cells
    pub fn empty() -> Self {
        Self {
            uid: MaskedArray::unmasked(Array2::zeros((0, 0))),
            value: MaskedArray::unmasked(Array2::from_elem(
                (0, 0),
                Geometry::Point(Point::new(0.0, 0.0)),
            )),
            weights: MaskedArray::unmasked(Array2::zeros((0, 0))),
            names: DimensionNames::new("gid", "geom"),
            aggregated: false,
        }
    }

    /// Cell ids
    pub fn uid(&self) -> &MaskedArray<i64, Ix2> {
        &self.uid
    }

    /// Cell geometries
    pub fn value(&self) -> &MaskedArray<Geometry<f64>, Ix2> {
        &self.value
    }

    /// Aggregation weights in `[0, 1]`
    pub fn weights(&self) -> &MaskedArray<f64, Ix2> {
        &self.weights
    }

    /// Mask shared by ids, geometries and weights
    pub fn mask(&self) -> &Array2<bool> {
        self.uid.mask()
    }

    /// Output names of the id and geometry columns
    pub fn names(&self) -> &DimensionNames {
        &self.names
    }

    pub fn rename(&mut self, uid: impl Into<String>, value: impl Into<String>) -> RenameToken {
        self.names.rename(uid, value)
    }

    pub fn restore(&mut self, token: RenameToken) {
        self.names.restore(token)
    }

    /// True once the grid has been collapsed into one cell
    pub fn is_aggregated(&self) -> bool {
        self.aggregated
    }

    /// Number of unmasked cells
    pub fn len(&self) -> usize {
        self.uid.count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(rows, cols)` of the underlying grid
    pub fn grid_shape(&self) -> (usize, usize) {
        self.uid.data().dim()
    }

    /// Grid shape, flattened to a single axis once aggregated or when empty
    pub fn shape(&self) -> Vec<usize> {
        let (rows, cols) = self.grid_shape();
        if self.aggregated || rows * cols == 0 {
            vec![self.len()]
        } else {
            vec![rows, cols]
        }
    }

    /// `(row, col)` of every unmasked cell in row-major order
    pub fn unmasked_cells(&self) -> Vec<(usize, usize)> {
        self.mask()
            .indexed_iter()
            .filter(|(_, masked)| !**masked)
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = SpatialRow<'_>> + '_ {
        self.unmasked_cells()
            .into_iter()
            .map(move |(row, col)| SpatialRow {
                row,
                col,
                uid: self.uid.data()[[row, col]],
                geometry: &self.value.data()[[row, col]],
                weight: self.weights.data()[[row, col]],
            })
    }

    /// Union every unmasked cell into a single cell with id 1
    ///
    /// Fails with [`OcgError::ShapeMismatch`] if there is nothing to union.
    pub fn aggregate(&mut self) -> OcgResult<()> {
        let geometries = self.value.compressed();
        if geometries.is_empty() {
            return Err(OcgError::ShapeMismatch(
                "cannot aggregate a spatial dimension without unmasked cells".to_string(),
            ));
        }
        let before = geometries.len();
        let union = union_geometries(geometries);

        self.uid = MaskedArray::unmasked(Array2::from_elem((1, 1), 1));
        self.value = MaskedArray::unmasked(Array2::from_elem((1, 1), union));
        self.weights = MaskedArray::unmasked(Array2::from_elem((1, 1), 1.0));
        self.aggregated = true;

        debug!("aggregated {} spatial cells into one", before);
        Ok(())
    }
}

fn cell_weights(
    geometries: &Array2<Geometry<f64>>,
    mask: &Array2<bool>,
    weighting: Weighting,
) -> Array2<f64> {
    let areas = geometries.map(|geom| geom.unsigned_area());
    let max_area = areas
        .iter()
        .zip(mask.iter())
        .filter(|(_, masked)| !**masked)
        .map(|(area, _)| *area)
        .fold(0.0, f64::max);

    Array2::from_shape_fn(areas.dim(), |idx| {
        if mask[idx] {
            0.0
        } else if weighting == Weighting::Area && max_area > 0.0 {
            areas[idx] / max_area
        } else {
            1.0
        }
    })
}

/// Union of `geometries`
///
/// Areal geometries are dissolved into one (multi)polygon and points are collected
/// into one (multi)point without duplicates. Anything else is carried along as is in a
/// geometry collection.
pub(crate) fn union_geometries(geometries: Vec<Geometry<f64>>) -> Geometry<f64> {
    let mut polygons: Option<MultiPolygon<f64>> = None;
    let mut points: Vec<Point<f64>> = Vec::new();
    let mut others: Vec<Geometry<f64>> = Vec::new();

    let mut dissolve = |next: MultiPolygon<f64>| {
        polygons = Some(match polygons.take() {
            Some(acc) => acc.union(&next),
            None => next,
        });
    };

    for geometry in geometries {
        match geometry {
            Geometry::Point(p) => points.push(p),
            Geometry::MultiPoint(mp) => points.extend(mp.0),
            Geometry::Polygon(p) => dissolve(MultiPolygon::new(vec![p])),
            Geometry::MultiPolygon(mp) => dissolve(mp),
            Geometry::Rect(r) => dissolve(MultiPolygon::new(vec![r.to_polygon()])),
            Geometry::Triangle(t) => dissolve(MultiPolygon::new(vec![t.to_polygon()])),
            other => others.push(other),
        }
    }

    let mut parts = Vec::new();
    if let Some(mut mp) = polygons {
        if mp.0.len() == 1 {
            parts.push(Geometry::Polygon(mp.0.remove(0)));
        } else {
            parts.push(Geometry::MultiPolygon(mp));
        }
    }
    if !points.is_empty() {
        points.sort_by(|a, b| a.x().total_cmp(&b.x()).then(a.y().total_cmp(&b.y())));
        points.dedup();
        if points.len() == 1 {
            parts.push(Geometry::Point(points[0]));
        } else {
            parts.push(Geometry::MultiPoint(MultiPoint(points)));
        }
    }
    parts.extend(others);

    if parts.len() == 1 {
        parts.remove(0)
    } else {
        Geometry::GeometryCollection(GeometryCollection(parts))
    }
}
