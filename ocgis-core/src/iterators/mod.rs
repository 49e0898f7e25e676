//! Flattening a collection into records
//!
//! [`MeltedIterator`] writes one record per value with every dimension attribute
//! spelled out, ready for tabular output. [`KeyedIterator`] writes the same records
//! with dimension attributes replaced by ids into deduplicated lookup tables.
//!
//! Both iterators borrow the collection and are lazy: each call to `iter_rows` starts a
//! fresh pass.

mod keyed;
mod melted;

pub use keyed::{KeyedIterator, KeyedRow, KeyedTables};
pub use melted::MeltedIterator;
