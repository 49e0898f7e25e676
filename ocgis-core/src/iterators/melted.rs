use crate::collection::OcgCollection;
use crate::config::IterOptions;
use crate::dimension::{DimensionNames, DimensionValue, LevelDimension};
use crate::errors::{OcgError, OcgResult};
use crate::field::Field;
use crate::spatial::SpatialDimension;
use crate::temporal::{DatePart, TemporalDimension};
use crate::variable::{OcgVariable, VariableArray};
use geo::Geometry;
use indexmap::IndexMap;
use std::rc::Rc;

/// One unmasked value and its position in the collection
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cell<'a> {
    pub variable: &'a OcgVariable,
    pub calc_name: Option<&'a str>,
    /// Time step, or temporal group when grouped
    pub time: usize,
    pub level: usize,
    pub row: usize,
    pub col: usize,
    pub value: f64,
}

impl<'a> Cell<'a> {
    pub fn geometry(&self) -> &'a Geometry<f64> {
        &self.variable.spatial().value().data()[[self.row, self.col]]
    }
}

#[derive(Debug, Clone)]
struct Headers {
    names: Vec<String>,
    /// Position of the spatial id column; the geometry follows it in row mappings
    gid_index: usize,
    geom: String,
}

/// Iterates a collection as flat records
///
/// Ungrouped collections produce one record per `(variable, time, level, cell)`.
/// Once every variable is grouped in time, records come from the calculated values
/// instead: one per `(variable, calculation, group, level, cell)`. Every variable must
/// then be grouped by the same date parts, which become header columns. Masked values
/// are never written.
#[derive(Debug, Clone, Copy)]
pub struct MeltedIterator<'a> {
    collection: &'a OcgCollection,
    options: IterOptions,
    grouped: bool,
}

impl<'a> MeltedIterator<'a> {
    pub fn new(collection: &'a OcgCollection) -> OcgResult<Self> {
        Self::with_options(collection, IterOptions::default())
    }

    /// Fails with [`OcgError::InvalidGroup`] if the records of `collection` cannot
    /// share one header: grouped variables use different date parts, or some
    /// variables carry calculations while others are not grouped.
    pub fn with_options(collection: &'a OcgCollection, options: IterOptions) -> OcgResult<Self> {
        Ok(Self {
            collection,
            options,
            grouped: grouped_mode(collection)?,
        })
    }

    pub fn collection(&self) -> &'a OcgCollection {
        self.collection
    }

    /// True when records come from calculated values
    pub fn is_grouped(&self) -> bool {
        self.grouped
    }

    /// Column names of [`Self::iter_list`]
    ///
    /// Dimension columns take the output names of the first variable.
    pub fn get_headers(&self) -> Vec<String> {
        self.headers().names
    }

    fn headers(&self) -> Headers {
        let first = self.collection.variables().values().next();
        let temporal = first.map_or_else(
            || TemporalDimension::empty().names().clone(),
            |variable| variable.temporal().names().clone(),
        );
        let level = first.and_then(|variable| variable.level()).map_or_else(
            || LevelDimension::empty().names().clone(),
            |level| level.names().clone(),
        );
        let spatial = first.map_or_else(
            || SpatialDimension::empty().names().clone(),
            |variable| variable.spatial().names().clone(),
        );

        let mut names = vec!["ugid".to_string()];
        if self.grouped {
            let group = first.and_then(|variable| variable.temporal_group());
            let group_names = group.map_or_else(
                || DimensionNames::new("tgid", "time"),
                |tgdim| tgdim.names().clone(),
            );
            names.push(group_names.uid().to_string());
            if let Some(tgdim) = group {
                names.extend(tgdim.parts().iter().map(|part| part.name().to_string()));
            }
        } else {
            names.push(temporal.uid().to_string());
            names.push(temporal.value().to_string());
        }
        names.push(level.uid().to_string());
        names.push(level.value().to_string());
        let gid_index = names.len();
        names.push(spatial.uid().to_string());
        names.extend(["vid", "var_name", "did", "uri"].map(String::from));
        if self.grouped {
            names.extend(["cid", "calc_name"].map(String::from));
        }
        names.push("value".to_string());

        Headers {
            names,
            gid_index,
            geom: spatial.value().to_string(),
        }
    }

    /// Every value to be written, in output order
    pub(crate) fn cells(&self) -> impl Iterator<Item = Cell<'a>> + 'a {
        let collection = self.collection;
        let options = self.options;
        let grouped = self.grouped;

        collection.variables().values().flat_map(move |variable| {
            let arrays: Vec<(Option<&'a str>, &'a VariableArray)> = if grouped {
                variable
                    .calc_value()
                    .iter()
                    .map(|(name, array)| (Some(name.as_str()), array))
                    .collect()
            } else {
                vec![(None, variable.value())]
            };
            let cells = Rc::new(variable.spatial().unmasked_cells());
            let n_level = variable.level_len();

            arrays.into_iter().flat_map(move |(calc_name, array)| {
                let n_time = array.shape()[0];
                let cells = Rc::clone(&cells);
                (0..n_time).flat_map(move |time| {
                    let cells = Rc::clone(&cells);
                    (0..n_level).flat_map(move |level| {
                        let cells = Rc::clone(&cells);
                        (0..cells.len()).filter_map(move |idx| {
                            let (row, col) = cells[idx];
                            let value = *array.get((time, level, row, col))?;
                            if options.skip_fill_value && value == options.fill_value {
                                return None;
                            }
                            Some(Cell {
                                variable,
                                calc_name,
                                time,
                                level,
                                row,
                                col,
                                value,
                            })
                        })
                    })
                })
            })
        })
    }

    fn fields(&self, cell: &Cell<'a>) -> Vec<Field> {
        let variable = cell.variable;
        let collection = self.collection;
        let mut fields = vec![Field::Int(collection.ugid())];

        if self.grouped {
            match variable.temporal_group() {
                Some(tgdim) => {
                    fields.push(Field::Int(tgdim.uid()[cell.time]));
                    fields.extend(tgdim.keys()[cell.time].iter().map(|key| Field::Int(*key)));
                }
                None => fields.push(Field::Null),
            }
        } else {
            let temporal = variable.temporal();
            fields.push(Field::Int(temporal.uid()[cell.time]));
            fields.push(temporal.value()[cell.time].to_field());
        }

        match variable.level().filter(|level| !level.is_empty()) {
            Some(level) => {
                fields.push(Field::Int(level.uid()[cell.level]));
                fields.push(level.value()[cell.level].to_field());
            }
            None => fields.extend([Field::Null, Field::Null]),
        }

        fields.push(Field::Int(
            variable.spatial().uid().data()[[cell.row, cell.col]],
        ));
        fields.push(collection.vid().get(variable.name()).ok().into());
        fields.push(variable.name().into());
        fields.push(
            variable
                .uri()
                .and_then(|uri| collection.did().get(uri).ok())
                .into(),
        );
        fields.push(variable.uri().into());
        if self.grouped {
            fields.push(
                cell.calc_name
                    .and_then(|name| collection.cid().get(name).ok())
                    .into(),
            );
            fields.push(cell.calc_name.into());
        }
        fields.push(Field::Float(cell.value));
        fields
    }

    /// Records as field lists ordered like [`Self::get_headers`], each paired with
    /// the geometry of its cell
    pub fn iter_list(&self) -> impl Iterator<Item = (Vec<Field>, Geometry<f64>)> + 'a {
        let this = *self;
        self.cells()
            .map(move |cell| (this.fields(&cell), cell.geometry().clone()))
    }

    /// Records as column name to field mappings
    ///
    /// The geometry is included under the spatial value name, right after the spatial
    /// id.
    pub fn iter_rows(&self) -> impl Iterator<Item = IndexMap<String, Field>> + 'a {
        let this = *self;
        let headers = self.headers();
        self.cells().map(move |cell| {
            let fields = this.fields(&cell);
            let mut row = IndexMap::with_capacity(fields.len() + 1);
            for (idx, (name, field)) in headers.names.iter().zip(fields).enumerate() {
                row.insert(name.clone(), field);
                if idx == headers.gid_index {
                    row.insert(
                        headers.geom.clone(),
                        Field::Geometry(cell.geometry().clone()),
                    );
                }
            }
            row
        })
    }
}

/// Whether `collection` melts from calculated values
fn grouped_mode(collection: &OcgCollection) -> OcgResult<bool> {
    if collection.is_grouped() {
        let mut groups = collection
            .variables()
            .values()
            .filter_map(|variable| Some((variable.name(), variable.temporal_group()?.parts())));
        if let Some((first_name, first_parts)) = groups.next() {
            if let Some((name, parts)) = groups.find(|(_, parts)| parts != &first_parts) {
                return Err(OcgError::InvalidGroup(format!(
                    "{} is grouped by {}, but {} is grouped by {}",
                    first_name,
                    join_parts(first_parts),
                    name,
                    join_parts(parts)
                )));
            }
        }
        return Ok(true);
    }

    match collection
        .variables()
        .values()
        .find(|variable| !variable.calc_value().is_empty())
    {
        Some(variable) => Err(OcgError::InvalidGroup(format!(
            "{} has calculations, but not every variable of the collection is grouped",
            variable.name()
        ))),
        None => Ok(false),
    }
}

fn join_parts(parts: &[DatePart]) -> String {
    parts
        .iter()
        .map(|part| part.name())
        .collect::<Vec<_>>()
        .join(", ")
}
