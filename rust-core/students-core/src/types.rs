//! # Path Parameters
//!
//! Values captured from the request path. A segment declared `{name:int}`
//! becomes an integer when it parses as one and stays text otherwise, so
//! the store decides what to do with `/students/abc`.

use crate::database::DbValue;
use std::borrow::Cow;

/// A captured path segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Segment parsed as an integer
    Int(i64),
    /// Segment kept as text
    Text(String),
}

impl ParamValue {
    /// Percent-decode `raw`, then try an integer when `as_int` is set
    ///
    /// A segment whose escapes do not decode to UTF-8 is kept verbatim.
    #[must_use]
    pub fn capture(raw: &str, as_int: bool) -> Self {
        let text = urlencoding::decode(raw).map_or_else(|_| raw.to_string(), Cow::into_owned);
        match text.parse::<i64>() {
            Ok(i) if as_int => Self::Int(i),
            _ => Self::Text(text),
        }
    }

    /// Bind value for a SQL statement
    #[must_use]
    pub fn to_db_value(&self) -> DbValue {
        match self {
            Self::Int(i) => DbValue::Int(*i),
            Self::Text(s) => DbValue::String(s.clone()),
        }
    }
}
