//! Parsed PDS3 labels and typed value access.
//!
//! A [`Label`] is the flattened result of one parsing pass: keys nested in
//! `GROUP`/`OBJECT` blocks are stored under `/`-joined paths such as
//! `IMAGE/LINES`. Values are kept as the raw label text and converted on
//! access through [`FromLabelValue`].

use crate::parser::Diagnostic;
use crate::time::{self, SolTime, TimeError};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or querying a label.
#[derive(Error, Debug)]
pub enum LabelError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Label file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Label header rejected: {}", .found.as_deref().unwrap_or("<no statement>"))]
    HeaderRejected { found: Option<String> },

    #[error("Malformed value for {key}: {value:?} ({reason})")]
    MalformedValue {
        key: String,
        value: String,
        reason: String,
    },
}

impl LabelError {
    fn malformed(key: &str, value: &str, reason: impl fmt::Display) -> Self {
        Self::MalformedValue {
            key: key.to_owned(),
            value: value.to_owned(),
            reason: reason.to_string(),
        }
    }
}

/// Conversion from the raw text of a label value.
pub trait FromLabelValue: Sized {
    /// Text targets get one layer of element quotes removed in
    /// [`Label::get_array`].
    const TEXT: bool = false;

    type Err: fmt::Display;

    fn from_label_value(value: &str) -> Result<Self, Self::Err>;
}

impl FromLabelValue for String {
    const TEXT: bool = true;
    type Err = Infallible;

    fn from_label_value(value: &str) -> Result<Self, Self::Err> {
        Ok(value.to_owned())
    }
}

macro_rules! impl_from_label_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromLabelValue for $ty {
                type Err = <$ty as std::str::FromStr>::Err;

                #[inline]
                fn from_label_value(value: &str) -> Result<Self, Self::Err> {
                    value.parse()
                }
            }
        )*
    };
}

impl_from_label_value!(i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64);

impl FromLabelValue for NaiveDateTime {
    type Err = TimeError;

    fn from_label_value(value: &str) -> Result<Self, Self::Err> {
        time::parse_calendar(value)
    }
}

impl FromLabelValue for SolTime {
    type Err = TimeError;

    fn from_label_value(value: &str) -> Result<Self, Self::Err> {
        time::parse_sol(value)
    }
}

/// Removes one layer of matching single or double quotes.
fn unquote(element: &str) -> &str {
    for quote in ['"', '\''] {
        if element.len() >= 2 && element.starts_with(quote) && element.ends_with(quote) {
            return &element[1..element.len() - 1];
        }
    }
    element
}

/// A parsed label: flattened key paths mapped to raw string values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Label {
    entries: BTreeMap<String, String>,
    diagnostics: Vec<Diagnostic>,
    partial: bool,
}

impl Label {
    pub(crate) fn from_parts(
        entries: BTreeMap<String, String>,
        diagnostics: Vec<Diagnostic>,
        partial: bool,
    ) -> Self {
        Self {
            entries,
            diagnostics,
            partial,
        }
    }

    /// Returns the raw value stored at `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Returns the value at `key` converted to `T`.
    ///
    /// An absent key is `Ok(None)`; a value that fails conversion is a
    /// [`LabelError::MalformedValue`].
    pub fn get<T: FromLabelValue>(&self, key: &str) -> Result<Option<T>, LabelError> {
        self.get_str(key)
            .map(|value| {
                T::from_label_value(value).map_err(|err| LabelError::malformed(key, value, err))
            })
            .transpose()
    }

    /// Returns the elements of a parenthesized sequence value.
    ///
    /// Absent keys and values that are not `(...)` yield `Ok(None)`. When `T`
    /// is text, one layer of quotes is removed from each element. A single
    /// element failing conversion fails the whole call.
    pub fn get_array<T: FromLabelValue>(&self, key: &str) -> Result<Option<Vec<T>>, LabelError> {
        let Some(inner) = self
            .get_str(key)
            .and_then(|value| value.strip_prefix('('))
            .and_then(|value| value.strip_suffix(')'))
        else {
            return Ok(None);
        };
        if inner.trim().is_empty() {
            return Ok(Some(Vec::new()));
        }

        inner
            .split(',')
            .map(|element| {
                let element = element.trim();
                let element = if T::TEXT { unquote(element) } else { element };
                T::from_label_value(element).map_err(|err| LabelError::malformed(key, element, err))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Returns true if a value is stored at `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(key path, raw value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Anomalies recorded while parsing.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// True when a read fault ended the pass before the label was complete.
    pub fn is_partial(&self) -> bool {
        self.partial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn label(pairs: &[(&str, &str)]) -> Label {
        let entries = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Label::from_parts(entries, Vec::new(), false)
    }

    #[test]
    fn test_get_scalar() {
        let label = label(&[("RECORD_BYTES", "2304"), ("MSL:ACTIVE_FLIGHT_STRING_ID", "\"B\"")]);
        assert_eq!(label.get::<u32>("RECORD_BYTES").unwrap(), Some(2304));
        assert_eq!(label.get_str("RECORD_BYTES"), Some("2304"));
        assert_eq!(
            label.get::<String>("MSL:ACTIVE_FLIGHT_STRING_ID").unwrap().as_deref(),
            Some("\"B\"")
        );
    }

    #[test]
    fn test_absent_key_is_not_an_error() {
        let label = label(&[("A", "1")]);
        assert_eq!(label.get::<i64>("NON_EXISTENT_KEY").unwrap(), None);
        assert_eq!(label.get_array::<i64>("NON_EXISTENT_KEY").unwrap(), None);
        assert_eq!(label.get_str("NON_EXISTENT_KEY"), None);
    }

    #[test]
    fn test_cast_failure_is_malformed_value() {
        let label = label(&[("PDS_VERSION_ID", "PDS3"), ("EXPOSURE_DURATION", "5.6 <ms>")]);
        let err = label.get::<i32>("PDS_VERSION_ID").unwrap_err();
        match err {
            LabelError::MalformedValue { key, value, .. } => {
                assert_eq!(key, "PDS_VERSION_ID");
                assert_eq!(value, "PDS3");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(label.get::<f64>("EXPOSURE_DURATION").is_err());
    }

    #[test]
    fn test_get_array_integers() {
        let label = label(&[("ROVER_MOTION_COUNTER", "(96, 0, 0, 0, 0, 0, 74, 32, 0, 0)")]);
        assert_eq!(
            label.get_array::<i64>("ROVER_MOTION_COUNTER").unwrap(),
            Some(vec![96, 0, 0, 0, 0, 0, 74, 32, 0, 0])
        );
    }

    #[test]
    fn test_get_array_floats() {
        let label = label(&[(
            "GEOMETRIC_CAMERA_MODEL_PARMS/MODEL_COMPONENT_1",
            "( 8.792020e-01, 4.466344e-01, -1.962631e+00 )",
        )]);
        let values = label
            .get_array::<f64>("GEOMETRIC_CAMERA_MODEL_PARMS/MODEL_COMPONENT_1")
            .unwrap()
            .unwrap();
        let expected = [8.792020e-01, 4.466344e-01, -1.962631e+00];
        assert_eq!(values.len(), expected.len());
        for (value, expected) in values.iter().zip(expected) {
            assert!((value - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_get_array_text_strips_one_quote_layer() {
        let label = label(&[("NAMES", "(\"SITE\", 'DRIVE', POSE, \"\"ARM\"\")")]);
        assert_eq!(
            label.get_array::<String>("NAMES").unwrap(),
            Some(vec![
                "SITE".to_owned(),
                "DRIVE".to_owned(),
                "POSE".to_owned(),
                "\"ARM\"".to_owned()
            ])
        );
    }

    #[test]
    fn test_get_array_empty_and_non_sequence() {
        let label = label(&[("EMPTY", "()"), ("SCALAR", "PDS3"), ("OPEN", "(1, 2")]);
        assert_eq!(label.get_array::<i32>("EMPTY").unwrap(), Some(Vec::new()));
        assert_eq!(label.get_array::<i32>("SCALAR").unwrap(), None);
        assert_eq!(label.get_array::<i32>("OPEN").unwrap(), None);
    }

    #[test]
    fn test_get_array_fails_on_any_bad_element() {
        let label = label(&[("MIXED", "(1, two, 3)")]);
        let err = label.get_array::<i32>("MIXED").unwrap_err();
        assert!(matches!(err, LabelError::MalformedValue { ref value, .. } if value == "two"));
    }

    #[test]
    fn test_time_accessors() {
        let label = label(&[
            ("PRODUCT_CREATION_TIME", "2022-10-08T07:25:34.055"),
            ("MSL:LOCAL_MEAN_SOLAR_TIME", "\"Sol-03531M11:20:54.594\""),
        ]);
        let created: NaiveDateTime = label.get("PRODUCT_CREATION_TIME").unwrap().unwrap();
        assert_eq!(
            created,
            NaiveDate::from_ymd_opt(2022, 10, 8)
                .unwrap()
                .and_hms_micro_opt(7, 25, 34, 55_000)
                .unwrap()
        );
        let lmst: SolTime = label.get("MSL:LOCAL_MEAN_SOLAR_TIME").unwrap().unwrap();
        assert_eq!(lmst.sol, 3531);
        assert_eq!(lmst.time, NaiveTime::from_hms_milli_opt(11, 20, 54, 594).unwrap());
    }

    #[test]
    fn test_iteration_is_ordered() {
        let label = label(&[("B", "2"), ("A", "1"), ("IMAGE/LINES", "432")]);
        let keys: Vec<_> = label.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["A", "B", "IMAGE/LINES"]);
        assert_eq!(label.len(), 3);
        assert!(label.contains_key("IMAGE/LINES"));
        assert!(!label.is_partial());
    }
}
