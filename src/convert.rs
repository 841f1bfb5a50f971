//! Coerces raw filter values into the native value of a target column type.
//!
//! Converters are looked up by [`SqlType`] in registration order and the
//! first type the column [`is_a`](SqlType::is_a) wins. Column types without a
//! converter get the raw scalar passed through unchanged.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_query::Value;
use thiserror::Error;

use crate::schema::SqlType;

/// A raw scalar as handed over by the parameter parser.
pub type ParamValue = serde_json::Value;

/// Turns a raw scalar into a native value, or explains why it can't.
pub type Converter = Arc<dyn Fn(&ParamValue) -> Result<Value, String> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("unparseable value {value} for type {target}: {reason}")]
pub struct ConversionError {
    pub value: String,
    pub target: SqlType,
    pub reason: String,
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%d.%m.%Y %H:%M:%S%.f",
    "%d.%m.%Y %H:%M",
    "%H:%M:%S%.f %Y-%m-%d",
    "%H:%M %Y-%m-%d",
    "%B %d, %Y %H:%M:%S%.f",
    "%B %d, %Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M", "%I:%M:%S %p", "%I:%M %p"];

/// Ordered mapping from column type to converter.
///
/// `Converters::default()` is the built-in table; `Converters::new()` starts
/// empty.
#[derive(Clone)]
pub struct Converters {
    entries: Vec<(SqlType, Converter)>,
}

impl Converters {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn register<F>(mut self, sql_type: SqlType, converter: F) -> Self
    where
        F: Fn(&ParamValue) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.insert(sql_type, converter);
        self
    }

    /// Appends a converter. Earlier registrations take precedence on overlap.
    pub fn insert<F>(&mut self, sql_type: SqlType, converter: F)
    where
        F: Fn(&ParamValue) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.entries.push((sql_type, Arc::new(converter)));
    }

    pub fn find(&self, column_type: &SqlType) -> Option<&Converter> {
        self.entries
            .iter()
            .find(|(registered, _)| column_type.is_a(registered))
            .map(|(_, converter)| converter)
    }

    pub fn types(&self) -> impl Iterator<Item = &SqlType> {
        self.entries.iter().map(|(ty, _)| ty)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Converters {
    fn default() -> Self {
        default_converters().clone()
    }
}

impl fmt::Debug for Converters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.types()).finish()
    }
}

/// Process-wide built-in converters. Float is listed before Numeric since
/// it is a Numeric specialisation that should stay floating point.
pub fn default_converters() -> &'static Converters {
    static DEFAULTS: OnceLock<Converters> = OnceLock::new();
    DEFAULTS.get_or_init(|| {
        Converters::new()
            .register(SqlType::Integer, |raw| parse_integer(raw).map(Value::from))
            .register(SqlType::Float, |raw| parse_float(raw).map(Value::from))
            .register(SqlType::Numeric, |raw| parse_decimal(raw).map(Value::from))
            .register(SqlType::Date, |raw| {
                parse_date(text(raw)?).map(Value::from)
            })
            .register(SqlType::DateTime, |raw| {
                parse_datetime(text(raw)?).map(Value::from)
            })
            .register(SqlType::Time, |raw| {
                parse_time(text(raw)?).map(Value::from)
            })
            .register(SqlType::Boolean, |raw| parse_bool(raw).map(Value::from))
    })
}

/// Converts `value` for a column of `column_type`.
///
/// Falls back to the built-in table when `converters` is absent or empty.
pub fn convert(
    value: &ParamValue,
    column_type: &SqlType,
    converters: Option<&Converters>,
) -> Result<Value, ConversionError> {
    let converters = match converters {
        Some(converters) if !converters.is_empty() => converters,
        _ => default_converters(),
    };

    let result = match converters.find(column_type) {
        Some(converter) => converter(value),
        None => passthrough(value),
    };

    result.map_err(|reason| ConversionError {
        value: value.to_string(),
        target: column_type.clone(),
        reason,
    })
}

/// Maps a raw scalar onto the equivalent native value without coercion.
pub fn passthrough(value: &ParamValue) -> Result<Value, String> {
    match value {
        ParamValue::Null => Ok(Value::String(None)),
        ParamValue::Bool(b) => Ok(Value::from(*b)),
        ParamValue::String(s) => Ok(Value::from(s.clone())),
        ParamValue::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::from(i)),
            None => n
                .as_f64()
                .map(Value::from)
                .ok_or_else(|| format!("number {} is out of range", n)),
        },
        ParamValue::Array(_) | ParamValue::Object(_) => {
            Err("only scalar values can be compared".to_string())
        }
    }
}

fn text(value: &ParamValue) -> Result<&str, String> {
    match value {
        ParamValue::String(s) => Ok(s.trim()),
        other => Err(format!("expected a string, got {}", other)),
    }
}

pub fn parse_integer(value: &ParamValue) -> Result<i64, String> {
    match value {
        ParamValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| fits_i64(*f)).map(|f| f as i64))
            .ok_or_else(|| format!("{} is not an integer in range", n)),
        other => {
            let s = text(other)?;
            s.parse::<i64>().map_err(|e| e.to_string())
        }
    }
}

/// Whole and within `i64` bounds. `i64::MAX as f64` rounds up to 2^63, so the
/// upper bound is exclusive.
fn fits_i64(f: f64) -> bool {
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

/// Only finite values; `inf` and `NaN` have no SQL literal.
pub fn parse_float(value: &ParamValue) -> Result<f64, String> {
    let parsed = match value {
        ParamValue::Number(n) => n.as_f64().ok_or_else(|| format!("{} is not a float", n))?,
        other => {
            let s = text(other)?;
            s.parse::<f64>().map_err(|e| e.to_string())?
        }
    };
    Some(parsed)
        .filter(|f| f.is_finite())
        .ok_or_else(|| format!("{} is not a finite number", parsed))
}

pub fn parse_decimal(value: &ParamValue) -> Result<Decimal, String> {
    let s = match value {
        ParamValue::Number(n) => n.to_string(),
        other => text(other)?.to_string(),
    };
    Decimal::from_str(&s)
        .or_else(|_| Decimal::from_scientific(&s))
        .map_err(|e| e.to_string())
}

pub fn parse_bool(value: &ParamValue) -> Result<bool, String> {
    match value {
        ParamValue::Bool(b) => Ok(*b),
        ParamValue::Number(n) if n.as_i64() == Some(0) => Ok(false),
        ParamValue::Number(n) if n.as_i64() == Some(1) => Ok(true),
        other => match text(other)?.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            s => Err(format!("'{}' is not a boolean", s)),
        },
    }
}

/// Parses a date and/or time. Date-only input resolves to midnight.
pub fn parse_datetime(s: &str) -> Result<NaiveDateTime, String> {
    let s = s.trim();
    if let Some(relative) = relative_datetime(s) {
        return relative;
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_utc());
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Ok(date.and_time(NaiveTime::MIN));
        }
    }
    Err(format!("'{}' is not a recognised date or time", s))
}

pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    parse_datetime(s).map(|dt| dt.date())
}

pub fn parse_time(s: &str) -> Result<NaiveTime, String> {
    let trimmed = s.trim();
    for format in TIME_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(trimmed, format) {
            return Ok(time);
        }
    }
    parse_datetime(trimmed).map(|dt| dt.time())
}

fn relative_datetime(s: &str) -> Option<Result<NaiveDateTime, String>> {
    let now = Utc::now().naive_utc();
    let midnight = now.date().and_time(NaiveTime::MIN);
    let resolved = match s.to_ascii_lowercase().as_str() {
        "now" => Some(now),
        "today" => Some(midnight),
        "yesterday" => midnight.checked_sub_days(Days::new(1)),
        "tomorrow" => midnight.checked_add_days(Days::new(1)),
        _ => return None,
    };
    Some(resolved.ok_or_else(|| format!("'{}' is out of range", s)))
}
