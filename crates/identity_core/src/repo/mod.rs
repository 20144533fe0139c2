//! Record mapping contract and generic repository.
//!
//! # Responsibility
//! - Define the [`Record`] contract every storage record type implements.
//! - Provide one generic [`Repository`] reused for every record type.
//! - Model single and composite keys as ordered value lists ([`Key`]).
//!
//! # Invariants
//! - `Record::values()` is aligned with `Record::COLUMNS`.
//! - Key components are matched positionally against `Record::KEY_COLUMNS`;
//!   arity is checked, order is the caller's contract.
//! - Column names never come from callers unchecked; [`Fields`] entries are
//!   validated against `Record::COLUMNS` before SQL is built.

mod repository;
pub mod user_repo;

pub use repository::Repository;

use crate::error::StorageResult;
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use std::fmt::{Display, Formatter};

/// Bidirectional mapping between a domain value and its stored row.
///
/// Implementations stay free of SQL beyond row decoding; the repository
/// builds every statement from the declared table and column names.
pub trait Record: Sized {
    /// Domain type this record persists.
    type Domain;
    /// Data stored on the record but not carried by the domain value
    /// (for example a credential hash). `()` when unused.
    type Material: Default;

    const TABLE: &'static str;
    /// Every persisted column, in `values()` order. Includes key columns.
    const COLUMNS: &'static [&'static str];
    /// Identity columns in declared key order.
    const KEY_COLUMNS: &'static [&'static str];

    fn from_domain(domain: &Self::Domain, material: Self::Material) -> Self;

    fn to_domain(&self) -> Self::Domain;

    /// Applies a newer domain value. Key fields must be left untouched.
    fn update(&mut self, domain: &Self::Domain);

    fn primary_key(&self) -> Key;

    /// Decodes a row selected with `COLUMNS`.
    fn from_row(row: &Row<'_>) -> StorageResult<Self>;

    /// Column values aligned with `COLUMNS`. `NULL` values are left to
    /// storage defaults on insert.
    fn values(&self) -> Vec<Value>;

    /// Resolves related rows for freshly loaded records, inside the same
    /// transaction that loaded them.
    fn load_relations(_conn: &Connection, _records: &mut [Self]) -> StorageResult<()> {
        Ok(())
    }
}

/// Conversion into a SQLite value for keys and field criteria.
pub trait IntoValue {
    fn into_value(self) -> Value;
}

macro_rules! into_value_via_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::from(self)
                }
            }
        )*
    };
}

into_value_via_from!(i64, i32, u32, bool, f64, String, Vec<u8>);

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl IntoValue for &String {
    fn into_value(self) -> Value {
        Value::Text(self.clone())
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        self.map_or(Value::Null, IntoValue::into_value)
    }
}

/// Ordered identity of one record.
///
/// A single-column key holds one component; a composite key holds one
/// component per key column, in declared order. A `NULL` component (an
/// autoincrement key not assigned yet) never matches a stored row.
#[derive(Debug, Clone, PartialEq)]
pub struct Key(Vec<Value>);

impl Key {
    pub fn new(parts: Vec<Value>) -> Self {
        Self(parts)
    }

    pub fn single(value: impl IntoValue) -> Self {
        Self(vec![value.into_value()])
    }

    pub fn parts(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `false` while any component is still `NULL`.
    pub fn is_assigned(&self) -> bool {
        !self.0.iter().any(|part| *part == Value::Null)
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(render_value).collect();
        match rendered.as_slice() {
            [single] => f.write_str(single),
            parts => write!(f, "({})", parts.join(", ")),
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(number) => number.to_string(),
        Value::Real(number) => number.to_string(),
        Value::Text(text) => format!("'{text}'"),
        Value::Blob(bytes) => format!("<{} bytes>", bytes.len()),
    }
}

macro_rules! key_from_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Key {
                fn from(value: $ty) -> Self {
                    Self::single(value)
                }
            }
        )*
    };
}

key_from_scalar!(
    i64,
    i32,
    u32,
    String,
    &str,
    &String,
    Value,
    Option<i64>,
    Option<i32>,
    Option<String>,
);

impl<A: IntoValue, B: IntoValue> From<(A, B)> for Key {
    fn from((first, second): (A, B)) -> Self {
        Self(vec![first.into_value(), second.into_value()])
    }
}

impl<A: IntoValue, B: IntoValue, C: IntoValue> From<(A, B, C)> for Key {
    fn from((first, second, third): (A, B, C)) -> Self {
        Self(vec![
            first.into_value(),
            second.into_value(),
            third.into_value(),
        ])
    }
}

impl<T: IntoValue, const N: usize> From<[T; N]> for Key {
    fn from(parts: [T; N]) -> Self {
        Self(parts.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: IntoValue> From<Vec<T>> for Key {
    fn from(parts: Vec<T>) -> Self {
        Self(parts.into_iter().map(IntoValue::into_value).collect())
    }
}

/// Ordered `column = value` pairs.
///
/// Used as equality criteria by `find_by` and as assignments by
/// `update_fields`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, Value)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one pair; a repeated column keeps both entries.
    pub fn with(mut self, column: impl Into<String>, value: impl IntoValue) -> Self {
        self.entries.push((column.into(), value.into_value()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(column, value)| (column.as_str(), value))
    }
}
