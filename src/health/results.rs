use std::fmt;
use std::io::{self, Write};

use crate::health::types::{Field, Status};

/// A single result value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Float(f64),
    Int(i64),
    Null,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Float(value) => write!(f, "{value:.5}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Null => Ok(()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Ordered result fields of one check. `Status` always comes first and only
/// ever moves from `CRITICAL` to `OK`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    status: Status,
    entries: Vec<(String, Value)>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_healthy(&self) -> bool {
        self.status == Status::Ok
    }

    pub(crate) fn mark_healthy(&mut self) {
        self.status = Status::Ok;
    }

    /// Sets `key`, keeping its original position when already present.
    /// `Status` is not settable this way.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        if key == Field::Status.as_str() {
            tracing::warn!("ignoring attempt to overwrite Status");
            return;
        }
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        if key == Field::Status.as_str() {
            return Some(Value::from(self.status.as_str()));
        }
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        key == Field::Status.as_str() || self.entries.iter().any(|(existing, _)| existing == key)
    }

    /// All entries in insertion order, `Status` first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Value)> + '_ {
        std::iter::once((Field::Status.as_str(), Value::from(self.status.as_str()))).chain(
            self.entries
                .iter()
                .map(|(key, value)| (key.as_str(), value.clone())),
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }

    /// Writes one `key: value` line per entry and returns the exit code a
    /// monitoring agent expects.
    pub fn render<W: Write>(&self, out: &mut W) -> io::Result<i32> {
        for (key, value) in self.iter() {
            writeln!(out, "{key}: {value}")?;
        }
        Ok(self.exit_code())
    }
}

impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in self.iter() {
            writeln!(f, "{key}: {value}")?;
        }
        Ok(())
    }
}

#[cfg(feature = "with-serde")]
impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(text) => serializer.serialize_str(text),
            Self::Float(value) => serializer.serialize_f64(*value),
            Self::Int(value) => serializer.serialize_i64(*value),
            Self::Null => serializer.serialize_none(),
        }
    }
}

#[cfg(feature = "with-serde")]
impl serde::Serialize for ResultSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, &value)?;
        }
        map.end()
    }
}
