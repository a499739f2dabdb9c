use crate::{
    error::{Error, INCOMPATIBLE_TYPES},
    tree::Operator,
    value::Concrete,
};

use serde_json::Value;

/// Return true if the given [`Value`] is truthy.
///
/// Empty text, empty sequences, zero and null are falsy, everything
/// else is truthy.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(boolean) => *boolean,
        Value::Number(number) => number.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(text) => !text.is_empty(),
        Value::Array(array) => !array.is_empty(),
        Value::Object(object) => !object.is_empty(),
        Value::Null => false,
    }
}

/// Return true if the given [`Concrete`] is truthy.
pub(crate) fn is_truthy_concrete(value: &Concrete) -> bool {
    match value {
        Concrete::Value(value) => is_truthy(value),
        Concrete::Safe(text) => !text.is_empty(),
        Concrete::DateTime(_) => true,
    }
}

fn error_compare(left: &Concrete, right: &Concrete) -> Error {
    Error::build(INCOMPATIBLE_TYPES).with_help(format!(
        "types `{}` and `{}` cannot be ordered",
        left.express(),
        right.express()
    ))
}

fn order<T: PartialOrd>(left: T, operator: Operator, right: T) -> bool {
    match operator {
        Operator::Equal => left == right,
        Operator::NotEqual => left != right,
        Operator::Greater => left > right,
        Operator::Lesser => left < right,
        Operator::GreaterOrEqual => left >= right,
        Operator::LesserOrEqual => left <= right,
    }
}

/// Compare the two [`Concrete`] instances with the given [`Operator`].
///
/// Equality works across any pair of types, differing types are simply
/// unequal. Ordering requires two numbers, two strings, two booleans or
/// two datetimes.
///
/// # Errors
///
/// Returns an [`Error`] if the `Operator` orders values that have no
/// ordering between them.
pub(crate) fn compare_concrete(
    left: &Concrete,
    operator: Operator,
    right: &Concrete,
) -> Result<bool, Error> {
    let result = match (left, right) {
        (Concrete::Value(Value::Number(left)), Concrete::Value(Value::Number(right))) => {
            let left = left.as_f64().unwrap_or(0.0);
            let right = right.as_f64().unwrap_or(0.0);
            order(left, operator, right)
        }
        (Concrete::Value(Value::String(left)), Concrete::Value(Value::String(right))) => {
            order(left, operator, right)
        }
        (Concrete::Safe(left), Concrete::Safe(right)) => order(left, operator, right),
        (Concrete::Value(Value::Bool(left)), Concrete::Value(Value::Bool(right))) => {
            order(left, operator, right)
        }
        (Concrete::DateTime(left), Concrete::DateTime(right)) => order(left, operator, right),
        (Concrete::Value(left), Concrete::Value(right)) => match operator {
            Operator::Equal => left == right,
            Operator::NotEqual => left != right,
            _ => return Err(error_compare(&Concrete::Value(left.clone()), &Concrete::Value(right.clone()))),
        },
        (left, right) => match operator {
            Operator::Equal => false,
            Operator::NotEqual => true,
            _ => return Err(error_compare(left, right)),
        },
    };

    Ok(result)
}

/// Test whether `member` is contained in `sequence`.
///
/// Strings test for a substring, arrays for an equal item, objects for
/// a key.
///
/// # Errors
///
/// Returns an [`Error`] if the sequence type has no membership test, or
/// the member type does not fit the sequence.
pub(crate) fn contains(member: &Concrete, sequence: &Concrete) -> Result<bool, Error> {
    let result = match sequence {
        Concrete::Value(Value::String(text)) | Concrete::Safe(text) => match member {
            Concrete::Value(Value::String(needle)) => text.contains(needle.as_str()),
            Concrete::Safe(needle) => text.contains(needle.as_str()),
            _ => {
                return Err(Error::build(INCOMPATIBLE_TYPES)
                    .with_help("only text can be searched for in text"))
            }
        },
        Concrete::Value(Value::Array(array)) => match member {
            Concrete::Value(needle) => array.contains(needle),
            _ => false,
        },
        Concrete::Value(Value::Object(object)) => match member {
            Concrete::Value(Value::String(key)) => object.contains_key(key),
            _ => false,
        },
        _ => {
            return Err(Error::build(INCOMPATIBLE_TYPES).with_help(format!(
                "type `{}` has no membership test",
                sequence.express()
            )))
        }
    };

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn concrete(value: Value) -> Concrete {
        Concrete::Value(value)
    }

    #[test]
    fn test_truthy() {
        for value in [
            json!("lorem"),
            json!(12),
            json!(-12),
            json!(114.4),
            json!(true),
            json!(["lorem", "ipsum"]),
            json!({"lorem": "ipsum"}),
        ] {
            assert!(is_truthy(&value), "{value} should be truthy");
        }
        for value in [
            json!(""),
            json!(0),
            json!(0.0),
            json!(false),
            json!([]),
            json!({}),
            json!(null),
        ] {
            assert!(!is_truthy(&value), "{value} should be falsy");
        }
    }

    #[test]
    fn test_compare_numbers() {
        let left = concrete(json!(3));
        let right = concrete(json!(3.0));
        assert!(compare_concrete(&left, Operator::Equal, &right).unwrap());
        assert!(compare_concrete(&left, Operator::GreaterOrEqual, &right).unwrap());
        assert!(!compare_concrete(&left, Operator::Greater, &right).unwrap());
    }

    #[test]
    fn test_compare_mixed_types() {
        let left = concrete(json!(1));
        let right = concrete(json!("1"));
        assert!(!compare_concrete(&left, Operator::Equal, &right).unwrap());
        assert!(compare_concrete(&left, Operator::NotEqual, &right).unwrap());
        assert!(compare_concrete(&left, Operator::Lesser, &right).is_err());
    }

    #[test]
    fn test_compare_datetimes() {
        let earlier = chrono::NaiveDate::from_ymd_opt(2016, 7, 8)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let later = chrono::NaiveDate::from_ymd_opt(2016, 7, 9)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(compare_concrete(
            &Concrete::DateTime(earlier),
            Operator::Lesser,
            &Concrete::DateTime(later)
        )
        .unwrap());
    }

    #[test]
    fn test_contains() {
        assert!(contains(&concrete(json!("am")), &concrete(json!("spam"))).unwrap());
        assert!(contains(&concrete(json!(2)), &concrete(json!([1, 2]))).unwrap());
        assert!(!contains(&concrete(json!(3)), &concrete(json!([1, 2]))).unwrap());
        assert!(contains(&concrete(json!("a")), &concrete(json!({"a": 1}))).unwrap());
        assert!(contains(&concrete(json!("a")), &concrete(json!(12))).is_err());
    }
}
