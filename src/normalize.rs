use crate::error::{EtlError, Result};
use crate::types::{NormalizedRecord, RawRecord};
use serde_json::Value;

/// Coerces a raw document into the fixed six-field schema.
///
/// `id` is mandatory; a missing or non-integer-convertible `id` makes the
/// record invalid. Every other field falls back to its stated default when
/// absent, with numeric coercion applied here rather than deferred to a
/// store.
pub fn to_normalized(raw: &RawRecord) -> Result<NormalizedRecord> {
    let id = match raw.get("id") {
        Some(value) => coerce_int(value)
            .ok_or_else(|| EtlError::InvalidRecord(format!("id not integer-convertible: {value}")))?,
        None => return Err(EtlError::InvalidRecord("id field missing".into())),
    };

    let name = raw
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mass = match raw.get("mass") {
        Some(value) => coerce_float(value)
            .ok_or_else(|| EtlError::InvalidRecord(format!("mass not float-convertible: {value}")))?,
        None => 0.0,
    };

    let date_str = raw.get("year").and_then(Value::as_str).unwrap_or("");
    let (year, _month) = split_date(date_str)?;

    let reclat = match raw.get("reclat") {
        Some(value) => coerce_float(value).ok_or_else(|| {
            EtlError::InvalidRecord(format!("reclat not float-convertible: {value}"))
        })?,
        None => 0.0,
    };

    let reclong = match raw.get("reclong") {
        Some(value) => coerce_float(value).ok_or_else(|| {
            EtlError::InvalidRecord(format!("reclong not float-convertible: {value}"))
        })?,
        None => 0.0,
    };

    Ok(NormalizedRecord {
        id,
        name,
        mass,
        year,
        reclat,
        reclong,
    })
}

/// Checks that a raw document carries an integer-convertible `id`, the
/// invariant enforced before anything is handed to a store.
pub fn validate_id(raw: &RawRecord) -> Result<i64> {
    match raw.get("id") {
        Some(value) => coerce_int(value)
            .ok_or_else(|| EtlError::InvalidRecord(format!("id not integer-convertible: {value}"))),
        None => Err(EtlError::InvalidRecord("id field missing".into())),
    }
}

/// Splits a composite `YYYY-MM-...` date string into `(year, month)`.
///
/// An empty string is the documented "no date" case and yields `(0, 0)`.
/// Fewer than two `-`-separated components, or components that do not
/// parse as integers, are malformed.
pub fn split_date(date_str: &str) -> Result<(i64, i64)> {
    if date_str.is_empty() {
        return Ok((0, 0));
    }

    let mut parts = date_str.split('-');
    let year_part = parts.next().unwrap_or_default();
    let month_part = parts
        .next()
        .ok_or_else(|| EtlError::MalformedDate(date_str.to_string()))?;

    let year = year_part
        .parse::<i64>()
        .map_err(|_| EtlError::MalformedDate(date_str.to_string()))?;
    let month = month_part
        .parse::<i64>()
        .map_err(|_| EtlError::MalformedDate(date_str.to_string()))?;

    Ok((year, month))
}

// The source serves numbers as JSON strings as often as JSON numbers.
fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn coerce_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("test records must be objects"),
        }
    }

    #[test]
    fn split_date_empty_is_no_date() {
        assert_eq!(split_date("").unwrap(), (0, 0));
    }

    #[test]
    fn split_date_parses_composite_timestamp() {
        assert_eq!(split_date("2001-03-15T00:00:00").unwrap(), (2001, 3));
    }

    #[test]
    fn split_date_rejects_single_component() {
        assert!(matches!(
            split_date("bad"),
            Err(EtlError::MalformedDate(_))
        ));
    }

    #[test]
    fn split_date_rejects_non_numeric_components() {
        assert!(matches!(
            split_date("abcd-ef"),
            Err(EtlError::MalformedDate(_))
        ));
    }

    #[test]
    fn normalizes_complete_record_with_string_numbers() {
        let record = raw(json!({
            "id": "42",
            "name": "Aachen",
            "mass": "21.5",
            "year": "1880-01-01T00:00:00.000",
            "reclat": "50.775000",
            "reclong": "6.083330"
        }));
        let normalized = to_normalized(&record).unwrap();
        assert_eq!(
            normalized,
            NormalizedRecord {
                id: 42,
                name: "Aachen".to_string(),
                mass: 21.5,
                year: 1880,
                reclat: 50.775,
                reclong: 6.08333,
            }
        );
    }

    #[test]
    fn absent_fields_take_defaults() {
        let record = raw(json!({"id": 7}));
        let normalized = to_normalized(&record).unwrap();
        assert_eq!(normalized.name, "");
        assert_eq!(normalized.mass, 0.0);
        assert_eq!(normalized.year, 0);
        assert_eq!(normalized.reclat, 0.0);
        assert_eq!(normalized.reclong, 0.0);
    }

    #[test]
    fn missing_id_is_invalid() {
        let record = raw(json!({"name": "nameless"}));
        assert!(matches!(
            to_normalized(&record),
            Err(EtlError::InvalidRecord(_))
        ));
    }

    #[test]
    fn non_integer_id_is_invalid() {
        let record = raw(json!({"id": "4.5"}));
        assert!(matches!(validate_id(&record), Err(EtlError::InvalidRecord(_))));
    }

    #[test]
    fn validate_id_accepts_numeric_and_string_ids() {
        assert_eq!(validate_id(&raw(json!({"id": 9}))).unwrap(), 9);
        assert_eq!(validate_id(&raw(json!({"id": "9"}))).unwrap(), 9);
    }
}
