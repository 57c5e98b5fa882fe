//! Cell value coercion.
//!
//! Turns a raw cell string into the [`FieldValue`] the target field expects.
//! Coercion never fails: bad input falls back to a default and leaves a line
//! for the import log.

use chrono::NaiveDate;

use crate::schema::FieldType;
use crate::store::FieldValue;

/// Cell contents read as boolean `true`. Everything else is `false`.
pub const BOOLEAN_TRUE: [&str; 8] = ["1", "Y", "Yes", "yes", "True", "true", "T", "t"];

/// Largest value reported in the overflow warning.
pub const MAX_INTEGER: i64 = i64::MAX;

/// Only accepted date layout.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// 2^63, the first float above the i64 range.
const INTEGER_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// A coerced value and the diagnostics produced on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Coerced {
    pub value: FieldValue,
    pub log: Vec<String>,
}

impl Coerced {
    fn clean(value: FieldValue) -> Self {
        Self {
            value,
            log: Vec::new(),
        }
    }
}

/// Coerce `raw` for field `field` of type `field_type`.
pub fn coerce(raw: &str, field: &str, field_type: FieldType) -> Coerced {
    let raw = raw.trim();
    match field_type {
        FieldType::Boolean => Coerced::clean(FieldValue::Bool(to_boolean(raw))),
        FieldType::Integer | FieldType::PositiveInteger | FieldType::Float => {
            to_number(raw, field, field_type)
        }
        FieldType::Date | FieldType::DateTime => Coerced::clean(to_datetime(raw)),
        FieldType::ForeignKey | FieldType::Text => Coerced::clean(FieldValue::Text(raw.to_string())),
    }
}

pub fn to_boolean(raw: &str) -> bool {
    BOOLEAN_TRUE.contains(&raw)
}

/// `YYYY-MM-DD` at midnight, or `Null` for anything else.
pub fn to_datetime(raw: &str) -> FieldValue {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(FieldValue::DateTime)
        .unwrap_or(FieldValue::Null)
}

fn to_number(raw: &str, field: &str, field_type: FieldType) -> Coerced {
    let mut log = Vec::new();

    let number = if raw.is_empty() {
        0.0
    } else {
        raw.parse::<f64>().unwrap_or_else(|_| {
            log.push(format!("Column {} = {} is not a number so is set to 0", field, raw));
            0.0
        })
    };

    if !field_type.is_integer() {
        let number = if number.is_finite() {
            number
        } else {
            log.push(format!("Column {} = {} is not a number so is set to 0", field, raw));
            0.0
        };
        return Coerced {
            value: FieldValue::Float(number),
            log,
        };
    }

    if number >= INTEGER_LIMIT {
        log.push(format!(
            "Column {} = {} more than the max integer {}",
            field, raw, MAX_INTEGER
        ));
    }

    let number = if number.is_nan() || number.is_infinite() {
        log.push(format!("Column {} = {} is not an integer so is set to 0", field, raw));
        0.0
    } else {
        number
    };

    // Truncates toward zero, saturating at the i64 bounds.
    let mut integer = number as i64;
    if integer < 0 && field_type == FieldType::PositiveInteger {
        log.push(format!("Column {} = {}, less than zero so set to 0", field, integer));
        integer = 0;
    }

    Coerced {
        value: FieldValue::Int(integer),
        log,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn int(raw: &str) -> Coerced {
        coerce(raw, "stock", FieldType::Integer)
    }

    #[test]
    fn test_boolean_truthy_tokens() {
        for token in BOOLEAN_TRUE {
            assert_eq!(
                coerce(token, "active", FieldType::Boolean).value,
                FieldValue::Bool(true),
                "token {:?}",
                token
            );
        }
    }

    #[test]
    fn test_boolean_everything_else_false() {
        for token in ["", "0", "no", "N", "TRUE", "YES", "oui", "x", "y"] {
            let result = coerce(token, "active", FieldType::Boolean);
            assert_eq!(result.value, FieldValue::Bool(false), "token {:?}", token);
            assert!(result.log.is_empty());
        }
    }

    #[test]
    fn test_boolean_cell_is_trimmed() {
        assert_eq!(coerce(" yes ", "active", FieldType::Boolean).value, FieldValue::Bool(true));
    }

    #[test]
    fn test_integer_empty_is_zero() {
        let result = int("");
        assert_eq!(result.value, FieldValue::Int(0));
        assert!(result.log.is_empty());
    }

    #[test]
    fn test_integer_not_a_number() {
        let result = int("abc");
        assert_eq!(result.value, FieldValue::Int(0));
        assert_eq!(result.log, vec!["Column stock = abc is not a number so is set to 0"]);
    }

    #[test]
    fn test_integer_truncates() {
        assert_eq!(int("3.9").value, FieldValue::Int(3));
        assert_eq!(int("-3.9").value, FieldValue::Int(-3));
        assert_eq!(int("42").value, FieldValue::Int(42));
        assert_eq!(int("1e3").value, FieldValue::Int(1000));
    }

    #[test]
    fn test_integer_overflow_warns_and_saturates() {
        let result = int("1e20");
        assert_eq!(result.value, FieldValue::Int(i64::MAX));
        assert_eq!(result.log.len(), 1);
        assert!(result.log[0].contains("more than the max integer 9223372036854775807"));
    }

    #[test]
    fn test_integer_nan_and_infinity() {
        let nan = int("nan");
        assert_eq!(nan.value, FieldValue::Int(0));
        assert_eq!(nan.log, vec!["Column stock = nan is not an integer so is set to 0"]);

        // Infinity is above the limit too, so both lines are logged.
        let inf = int("inf");
        assert_eq!(inf.value, FieldValue::Int(0));
        assert_eq!(inf.log.len(), 2);

        let neg = int("-inf");
        assert_eq!(neg.value, FieldValue::Int(0));
        assert_eq!(neg.log.len(), 1);
    }

    #[test]
    fn test_positive_integer_negative_reset() {
        let result = coerce("-5", "stock", FieldType::PositiveInteger);
        assert_eq!(result.value, FieldValue::Int(0));
        assert_eq!(result.log, vec!["Column stock = -5, less than zero so set to 0"]);

        // Plain integers keep their sign.
        assert_eq!(int("-5").value, FieldValue::Int(-5));
        assert!(int("-5").log.is_empty());
    }

    #[test]
    fn test_float_keeps_fraction() {
        assert_eq!(coerce("2.5", "price", FieldType::Float).value, FieldValue::Float(2.5));
        assert_eq!(coerce("", "price", FieldType::Float).value, FieldValue::Float(0.0));

        let bad = coerce("n/a", "price", FieldType::Float);
        assert_eq!(bad.value, FieldValue::Float(0.0));
        assert_eq!(bad.log.len(), 1);
    }

    #[test]
    fn test_float_nan_and_infinity_are_zero() {
        for raw in ["nan", "NaN", "inf", "-inf", "infinity"] {
            let coerced = coerce(raw, "price", FieldType::Float);
            assert_eq!(coerced.value, FieldValue::Float(0.0), "raw {:?}", raw);
            assert_eq!(
                coerced.log,
                vec![format!("Column price = {} is not a number so is set to 0", raw)]
            );
        }
    }

    #[test]
    fn test_date_parses_to_midnight() {
        let expected =
            NaiveDateTime::parse_from_str("2020-01-15 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();

        for field_type in [FieldType::Date, FieldType::DateTime] {
            let result = coerce("2020-01-15", "released", field_type);
            assert_eq!(result.value, FieldValue::DateTime(expected));
            assert!(result.log.is_empty());
        }
    }

    #[test]
    fn test_bad_dates_are_silently_null() {
        for raw in ["15/01/2020", "", "garbage", "2020-13-01"] {
            let result = coerce(raw, "released", FieldType::Date);
            assert_eq!(result.value, FieldValue::Null, "raw {:?}", raw);
            assert!(result.log.is_empty());
        }
    }

    #[test]
    fn test_text_is_trimmed() {
        assert_eq!(
            coerce("  Widget \t", "title", FieldType::Text).value,
            FieldValue::from("Widget")
        );
        assert_eq!(coerce("   ", "title", FieldType::Text).value, FieldValue::from(""));
        assert_eq!(
            coerce(" Tools ", "category", FieldType::ForeignKey).value,
            FieldValue::from("Tools")
        );
    }
}
