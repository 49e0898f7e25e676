//! Melting into id records and lookup tables
//!
//! Dimension values repeat across many records, so the keyed output writes them once:
//! each distinct time, level and cell geometry gets an id in a [`KeyedTables`] table
//! and records carry only those ids next to the value.

use super::melted::MeltedIterator;
use crate::collection::OcgCollection;
use crate::config::IterOptions;
use crate::errors::{OcgError, OcgResult};
use crate::identifier::Identifier;
use crate::dimension::DimensionValue;
use crate::key::IdKey;
use crate::variable::OcgVariable;
use geo::Geometry;
use indexmap::IndexMap;
use log::debug;
use ndarray::Array2;

/// A record whose dimension attributes are ids into [`KeyedTables`]
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedRow {
    pub ugid: i64,
    /// Id into [`KeyedTables::time`]
    pub tid: i64,
    /// Id into [`KeyedTables::level`], absent for variables without levels
    pub lid: Option<i64>,
    /// Id into [`KeyedTables::geometry`]
    pub gid: i64,
    pub vid: Option<i64>,
    pub did: Option<i64>,
    /// Calculation id, only set for grouped collections
    pub cid: Option<i64>,
    pub value: f64,
}

/// Deduplicated lookup tables shared by every record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyedTables {
    /// `(time, lower, upper)` when bounded, otherwise `time`
    pub time: Identifier,
    /// `(level, lower, upper)` when bounded, otherwise `level`
    pub level: Identifier,
    /// `(ugid, gid, footprint)`, where `footprint` counts distinct geometries seen
    /// under the same `(ugid, gid)`
    pub geometry: Identifier,
    /// Geometry of every id in `geometry`
    pub geometries: IndexMap<i64, Geometry<f64>>,
}

#[derive(Debug, Clone)]
struct VariableKeys {
    tid: Vec<i64>,
    lid: Vec<i64>,
    gid: Array2<i64>,
}

/// Iterates a collection as records of ids
///
/// The lookup tables are built once, when the iterator is created.
#[derive(Debug, Clone)]
pub struct KeyedIterator<'a> {
    melted: MeltedIterator<'a>,
    tables: KeyedTables,
    keys: IndexMap<String, VariableKeys>,
}

impl<'a> KeyedIterator<'a> {
    /// Build the lookup tables of `collection`
    ///
    /// Fails like [`MeltedIterator::with_options`].
    pub fn new(collection: &'a OcgCollection) -> OcgResult<Self> {
        Self::with_options(collection, IterOptions::default())
    }

    pub fn with_options(collection: &'a OcgCollection, options: IterOptions) -> OcgResult<Self> {
        let melted = MeltedIterator::with_options(collection, options)?;
        let mut tables = KeyedTables::default();
        let mut keys = IndexMap::new();
        for (name, variable) in collection.variables() {
            let variable_keys =
                register(&mut tables, collection.ugid(), variable, melted.is_grouped())?;
            keys.insert(name.clone(), variable_keys);
        }
        debug!(
            "built keyed tables with {} times, {} levels and {} geometries",
            tables.time.len(),
            tables.level.len(),
            tables.geometry.len()
        );
        Ok(Self {
            melted,
            tables,
            keys,
        })
    }

    /// Lookup tables referenced by the records
    pub fn tables(&self) -> &KeyedTables {
        &self.tables
    }

    /// Field names of a [`KeyedRow`], `cid` only when grouped
    pub fn get_headers(&self) -> Vec<String> {
        let mut names = vec!["ugid", "tid", "lid", "gid", "vid", "did"];
        if self.melted.is_grouped() {
            names.push("cid");
        }
        names.push("value");
        names.into_iter().map(String::from).collect()
    }

    /// Records in the same order as [`MeltedIterator::iter_rows`]
    pub fn iter_rows(&self) -> impl Iterator<Item = KeyedRow> + '_ {
        let collection = self.melted.collection();
        self.melted.cells().filter_map(move |cell| {
            let variable = cell.variable;
            let keys = self.keys.get(variable.name())?;
            Some(KeyedRow {
                ugid: collection.ugid(),
                tid: *keys.tid.get(cell.time)?,
                lid: keys.lid.get(cell.level).copied(),
                gid: *keys.gid.get((cell.row, cell.col))?,
                vid: collection.vid().get(variable.name()).ok(),
                did: variable
                    .uri()
                    .and_then(|uri| collection.did().get(uri).ok()),
                cid: cell
                    .calc_name
                    .and_then(|name| collection.cid().get(name).ok()),
                value: cell.value,
            })
        })
    }
}

fn bounded<T: DimensionValue>(value: &T, bounds: Option<(T, T)>) -> IdKey {
    match bounds {
        Some((lower, upper)) => {
            IdKey::new(vec![value.to_scalar(), lower.to_scalar(), upper.to_scalar()])
        }
        None => IdKey::new(vec![value.to_scalar()]),
    }
}

/// Add the dimensions of `variable` to the tables and return its ids
fn register(
    tables: &mut KeyedTables,
    ugid: i64,
    variable: &OcgVariable,
    grouped: bool,
) -> OcgResult<VariableKeys> {
    let time_keys: Vec<IdKey> = match (grouped, variable.temporal_group()) {
        (true, Some(tgdim)) => tgdim
            .iter()
            .map(|row| bounded(&row.value, row.bounds))
            .collect(),
        _ => variable
            .temporal()
            .iter()
            .map(|row| bounded(&row.value, row.bounds))
            .collect(),
    };
    let tid = tables.time.add(time_keys)?;

    let lid = match variable.level() {
        Some(level) => tables
            .level
            .add(level.iter().map(|row| bounded(&row.value, row.bounds)))?,
        None => Vec::new(),
    };

    let spatial = variable.spatial();
    let mut gid = Array2::zeros(spatial.grid_shape());
    for row in spatial.iter() {
        gid[[row.row, row.col]] = geometry_id(tables, ugid, row.uid, row.geometry)?;
    }

    Ok(VariableKeys { tid, lid, gid })
}

/// Id of the cell `(ugid, uid)` with `geometry`
///
/// Cells sharing `(ugid, uid)` but not the geometry, such as the single cells of
/// variables aggregated over different footprints, are told apart by the third key
/// column.
fn geometry_id(
    tables: &mut KeyedTables,
    ugid: i64,
    uid: i64,
    geometry: &Geometry<f64>,
) -> OcgResult<i64> {
    let mut footprint = 0i64;
    loop {
        let key = IdKey::from((ugid, uid, footprint));
        match tables.geometry.get(&key) {
            Ok(id) if tables.geometries.get(&id) == Some(geometry) => return Ok(id),
            Ok(_) => footprint += 1,
            Err(_) => {
                let ids = tables.geometry.add([key])?;
                let id = ids.first().copied().ok_or_else(|| {
                    OcgError::Lookup(format!("no id assigned to cell {} of {}", uid, ugid))
                })?;
                tables.geometries.insert(id, geometry.clone());
                return Ok(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::LevelDimension;
    use crate::masked::MaskedArray;
    use crate::spatial::SpatialDimension;
    use crate::temporal::{DatePart, TemporalDimension};
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use geo::Point;
    use ndarray::{array, Array1, Array4};

    fn dt(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2000, 1, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn variable(name: &str) -> OcgVariable {
        let times = Array1::from(vec![dt(1), dt(2), dt(3)]);
        let bounds = Array2::from_shape_fn((3, 2), |(t, b)| {
            times[t] + Duration::hours(if b == 0 { -12 } else { 12 })
        });
        let temporal = TemporalDimension::new(array![1, 2, 3], times, Some(bounds)).unwrap();
        let spatial = SpatialDimension::new(
            array![[1, 2], [3, 4]],
            Array2::from_shape_fn((2, 2), |(r, c)| {
                Geometry::Point(Point::new(c as f64, r as f64))
            }),
            array![[false, false], [true, false]],
        )
        .unwrap();
        let level = LevelDimension::new(array![1, 2], array![50.0, 150.0], None).unwrap();
        let value = MaskedArray::unmasked(Array4::from_elem((3, 2, 2, 2), 1.5));
        OcgVariable::new(name, value, temporal, spatial, Some(level))
            .unwrap()
            .with_uri("data.nc")
    }

    #[test]
    fn tables_are_shared() {
        let mut coll = OcgCollection::with_ugid(2);
        coll.add_variable(variable("tas")).unwrap();
        coll.add_variable(variable("tasmax")).unwrap();

        let it = KeyedIterator::new(&coll).unwrap();
        let tables = it.tables();
        assert_eq!(tables.time.len(), 3);
        assert_eq!(tables.level.len(), 2);
        assert_eq!(tables.geometry.len(), 3);
        assert_eq!(tables.geometries.len(), 3);
        assert_eq!(tables.geometry.get((2i64, 4i64, 0i64)).unwrap(), 3);
        assert_eq!(
            tables.time.get((dt(2), dt(2) - Duration::hours(12), dt(2) + Duration::hours(12))).unwrap(),
            2
        );

        let rows: Vec<_> = it.iter_rows().collect();
        assert_eq!(rows.len(), 2 * 3 * 2 * 3);
        assert!(rows.iter().all(|row| row.ugid == 2 && row.did == Some(1)));
        assert!(rows.iter().all(|row| row.cid.is_none()));
        assert_eq!(rows.last().unwrap().vid, Some(2));
        assert_eq!(rows[2].gid, 3);
        assert_eq!(rows[3].lid, Some(2));
        assert_eq!(it.get_headers().len(), 7);
    }

    #[test]
    fn aggregated_footprints_keep_their_geometry() {
        let mut coll = OcgCollection::new();
        let mut tas = variable("tas");
        tas.aggregate().unwrap();
        let mut pr = variable("pr");
        pr.aggregate().unwrap();
        let mut shifted = variable("tasmax");
        {
            // Same grid ids, cells moved up by 5
            let spatial = SpatialDimension::new(
                array![[1, 2], [3, 4]],
                Array2::from_shape_fn((2, 2), |(r, c)| {
                    Geometry::Point(Point::new(c as f64, r as f64 + 5.0))
                }),
                array![[false, false], [true, false]],
            )
            .unwrap();
            let value = shifted.value().clone();
            shifted = OcgVariable::new(
                "tasmax",
                value,
                shifted.temporal().clone(),
                spatial,
                shifted.level().cloned(),
            )
            .unwrap();
            shifted.aggregate().unwrap();
        }
        let shifted_geom = shifted.spatial().value().data()[[0, 0]].clone();
        coll.add_variable(tas).unwrap();
        coll.add_variable(pr).unwrap();
        coll.add_variable(shifted).unwrap();

        let it = KeyedIterator::new(&coll).unwrap();
        let tables = it.tables();
        assert_eq!(tables.geometry.len(), 2);
        assert_eq!(tables.geometry.get((1i64, 1i64, 1i64)).unwrap(), 2);

        let rows: Vec<_> = it.iter_rows().collect();
        let vid = coll.vid().get("tasmax").unwrap();
        let gids: Vec<i64> = rows
            .iter()
            .filter(|row| row.vid == Some(vid))
            .map(|row| row.gid)
            .collect();
        assert!(!gids.is_empty());
        assert!(gids.iter().all(|gid| tables.geometries[gid] == shifted_geom));
        assert!(rows
            .iter()
            .filter(|row| row.vid != Some(vid))
            .all(|row| row.gid == 1));
    }

    #[test]
    fn grouped_tables() {
        let mut coll = OcgCollection::new();
        let mut var = variable("tas");
        var.group(&[DatePart::Month]).unwrap();
        var.add_calc_value("mean", MaskedArray::unmasked(Array4::zeros((1, 2, 2, 2))))
            .unwrap();
        coll.add_variable(var).unwrap();
        coll.add_calculation("tas").unwrap();

        let it = KeyedIterator::new(&coll).unwrap();
        assert_eq!(it.tables().time.len(), 1);
        let rows: Vec<_> = it.iter_rows().collect();
        assert_eq!(rows.len(), 2 * 3);
        assert!(rows.iter().all(|row| row.cid == Some(1) && row.tid == 1));
        assert_eq!(it.get_headers().last().unwrap(), "value");
        assert!(it.get_headers().contains(&"cid".to_string()));
    }
}
