//! Collection core for climate-data subsetting.
//!
//! Raw coordinate and value arrays enter through the dimension constructors,
//! are bound together by [`variable::OcgVariable`], gathered in a
//! [`collection::OcgCollection`] and finally melted into flat records by the
//! iterators in [`iterators`].

pub mod collection;
pub mod config;
pub mod dimension;
pub mod errors;
pub mod field;
pub mod identifier;
pub mod iterators;
pub mod key;
pub mod masked;
pub mod spatial;
pub mod temporal;
pub mod variable;

pub use collection::OcgCollection;
pub use config::{IterOptions, OcgConfig, Weighting};
pub use dimension::{Dimension, LevelDimension};
pub use errors::{OcgError, OcgResult};
pub use field::Field;
pub use identifier::Identifier;
pub use iterators::{KeyedIterator, KeyedRow, KeyedTables, MeltedIterator};
pub use key::{IdKey, Scalar};
pub use masked::MaskedArray;
pub use spatial::SpatialDimension;
pub use temporal::{DatePart, TemporalDimension, TemporalGroupDimension};
pub use variable::{DimensionKind, OcgVariable, VariableArray};
