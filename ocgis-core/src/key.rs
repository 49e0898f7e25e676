//! Comparable keys for identifier tables
//!
//! An [`IdKey`] is a fixed-arity row of [`Scalar`] columns. Rows compare column by
//! column, so a pair of datetime bounds only matches another pair when both ends agree.

use chrono::NaiveDateTime;
use std::cmp::Ordering;
use std::fmt;

/// A single column of an identifier row
#[derive(Debug, Clone)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    DateTime(NaiveDateTime),
    Text(String),
}

impl Scalar {
    fn rank(&self) -> u8 {
        match self {
            Scalar::Int(_) => 0,
            Scalar::Float(_) => 1,
            Scalar::DateTime(_) => 2,
            Scalar::Text(_) => 3,
        }
    }
}

impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Scalar::Int(a), Scalar::Int(b)) => a.cmp(b),
            (Scalar::Float(a), Scalar::Float(b)) => a.total_cmp(b),
            (Scalar::DateTime(a), Scalar::DateTime(b)) => a.cmp(b),
            (Scalar::Text(a), Scalar::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scalar {}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::DateTime(v) => write!(f, "{}", v),
            Scalar::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(value as i64)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<NaiveDateTime> for Scalar {
    fn from(value: NaiveDateTime) -> Self {
        Scalar::DateTime(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

/// A row of scalar columns used as a deduplication key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IdKey(Vec<Scalar>);

impl IdKey {
    pub fn new(columns: Vec<Scalar>) -> Self {
        Self(columns)
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }

    pub fn columns(&self) -> &[Scalar] {
        &self.0
    }
}

impl fmt::Display for IdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [single] => write!(f, "{}", single),
            columns => {
                write!(f, "(")?;
                for (idx, column) in columns.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", column)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<Vec<Scalar>> for IdKey {
    fn from(columns: Vec<Scalar>) -> Self {
        Self(columns)
    }
}

impl From<&IdKey> for IdKey {
    fn from(key: &IdKey) -> Self {
        key.clone()
    }
}

macro_rules! impl_single_column_key {
    ($($t:ty),*) => {
        $(
            impl From<$t> for IdKey {
                fn from(value: $t) -> Self {
                    Self(vec![Scalar::from(value)])
                }
            }
        )*
    };
}

impl_single_column_key!(Scalar, i64, i32, f64, NaiveDateTime, &str, String);

impl<A: Into<Scalar>, B: Into<Scalar>> From<(A, B)> for IdKey {
    fn from((a, b): (A, B)) -> Self {
        Self(vec![a.into(), b.into()])
    }
}

impl<A: Into<Scalar>, B: Into<Scalar>, C: Into<Scalar>> From<(A, B, C)> for IdKey {
    fn from((a, b, c): (A, B, C)) -> Self {
        Self(vec![a.into(), b.into(), c.into()])
    }
}
