//! # Student Rows
//!
//! A `Record` is the loosely-typed view of one student: an ordered mapping
//! from column name to whatever value the source produced. A `StudentRow` is
//! the strictly-typed view the estimator works on, holding exactly the eight
//! predictors as `f64`.
//!
//! Conversion is the only place input can fail. A field is either absent
//! (`RowError::MissingField`) or present with a value that is not a number
//! (`RowError::TypeCoercion`). Indicator columns are not range checked: a
//! `female` of 2 converts just as readily as a 0 or 1.

use std::fmt;
use thiserror::Error;

/// The eight predictor columns, in canonical order. Names are case-sensitive.
pub const REQUIRED_FIELDS: [&str; 8] = [
    "female",
    "tenth_math_final",
    "tenth_sci_final",
    "pcm",
    "general",
    "obc",
    "sc",
    "st",
];

/// Failure to turn a `Record` into a `StudentRow`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("The required field '{0}' is missing. Please check spelling and case.")]
    MissingField(&'static str),
    #[error("The field '{field}' has value '{value}', which cannot be converted to a number.")]
    TypeCoercion { field: &'static str, value: String },
}

/// A single cell value as delivered by the input source.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Numeric reading of the value. Text is trimmed and parsed; anything else is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// An ordered name → value mapping for one student. Column order is kept as inserted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`, replacing an existing entry in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Removes a field, returning its value if it was present.
    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        let idx = self.fields.iter().position(|(k, _)| k == name)?;
        Some(self.fields.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn number(&self, field: &'static str) -> Result<f64, RowError> {
        let value = self.get(field).ok_or(RowError::MissingField(field))?;
        value.as_f64().ok_or_else(|| RowError::TypeCoercion {
            field,
            value: value.to_string(),
        })
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

/// The eight predictors of one student, already numeric.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StudentRow {
    /// Gender indicator as coded in the source data.
    pub female: f64,
    /// Class 10 CBSE mathematics mark, out of 100.
    pub tenth_math_final: f64,
    /// Class 10 CBSE science mark, out of 100.
    pub tenth_sci_final: f64,
    /// 1 for the PCM stream, 0 for PCMB.
    pub pcm: f64,
    pub general: f64,
    pub obc: f64,
    pub sc: f64,
    pub st: f64,
}

impl StudentRow {
    /// Reads the eight required fields out of a record, checking them in canonical order.
    pub fn from_record(record: &Record) -> Result<Self, RowError> {
        Ok(Self {
            female: record.number("female")?,
            tenth_math_final: record.number("tenth_math_final")?,
            tenth_sci_final: record.number("tenth_sci_final")?,
            pcm: record.number("pcm")?,
            general: record.number("general")?,
            obc: record.number("obc")?,
            sc: record.number("sc")?,
            st: record.number("st")?,
        })
    }

    /// Builds a row from values in `REQUIRED_FIELDS` order.
    pub fn from_values(values: [f64; 8]) -> Self {
        let [female, tenth_math_final, tenth_sci_final, pcm, general, obc, sc, st] = values;
        Self {
            female,
            tenth_math_final,
            tenth_sci_final,
            pcm,
            general,
            obc,
            sc,
            st,
        }
    }

    /// The values in `REQUIRED_FIELDS` order.
    pub fn values(&self) -> [f64; 8] {
        [
            self.female,
            self.tenth_math_final,
            self.tenth_sci_final,
            self.pcm,
            self.general,
            self.obc,
            self.sc,
            self.st,
        ]
    }

    pub fn to_record(&self) -> Record {
        REQUIRED_FIELDS
            .iter()
            .copied()
            .zip(self.values())
            .collect()
    }
}
