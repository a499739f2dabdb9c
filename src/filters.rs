//! Built-in filters with their Javascript translations.
//!
//! Every filter here has both halves: the direct implementation runs when
//! the input and arguments are concrete, the translation runs when any of
//! them is deferred. The two halves are written to agree, so a template
//! produces the same text whichever path it takes.

use crate::{
    dateformat,
    engine::Engine,
    error::{Error, ErrorKind, INCOMPATIBLE_TYPES, INVALID_FILTER, NOT_SUPPORTED},
    filter::FilterOutput,
    render::compare::is_truthy_concrete,
    value::{Concrete, Js},
};

use serde_json::Value;

/// Register the built-in filters and their translations on the engine.
pub(crate) fn install(engine: &mut Engine) {
    engine.add_filter_must("default", default);
    engine.add_filter_must("default_if_none", default_if_none);
    engine.add_filter_must("length", length);
    engine.add_filter_must("add", add);
    engine.add_filter_must("date", date);
    engine.add_filter_must("time", time);
    engine.add_filter_must("floatformat", floatformat);

    engine.add_filter_translator_must("default", translate_default);
    engine.add_filter_translator_must("default_if_none", translate_default_if_none);
    engine.add_filter_translator_must("length", translate_length);
    engine.add_filter_translator_must("add", translate_add);
    engine.add_filter_translator_must("date", translate_date);
    engine.add_filter_translator_must("time", translate_time);
    engine.add_filter_translator_must("floatformat", translate_floatformat);
}

fn error_argument_count(name: &str) -> Error {
    Error::build(INVALID_FILTER).with_help(format!("filter `{name}` expects an argument"))
}

fn require_argument<'a>(name: &str, arguments: &'a [Concrete]) -> Result<&'a Concrete, Error> {
    arguments.first().ok_or_else(|| error_argument_count(name))
}

fn require_argument_js<'a>(name: &str, arguments: &'a [Js]) -> Result<&'a Js, Error> {
    arguments.first().ok_or_else(|| error_argument_count(name))
}

/// Coerce a concrete value to an integer the way loosely typed template
/// data expects, accepting numbers and numeric strings.
fn coerce_int(value: &Concrete) -> Option<i64> {
    match value {
        Concrete::Value(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|f| f as i64)),
        Concrete::Value(Value::String(text)) => text.trim().parse::<i64>().ok(),
        Concrete::Safe(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn coerce_float(value: &Concrete) -> Option<f64> {
    match value {
        Concrete::Value(Value::Number(number)) => number.as_f64(),
        Concrete::Value(Value::String(text)) => text.trim().parse::<f64>().ok(),
        Concrete::Safe(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// `default` returns the argument when the value is falsy.
fn default(value: &Concrete, arguments: &[Concrete], _: &Engine) -> Result<Concrete, Error> {
    let fallback = require_argument("default", arguments)?;
    if is_truthy_concrete(value) {
        Ok(value.clone())
    } else {
        Ok(fallback.clone())
    }
}

fn translate_default(_: &Engine, value: &Js, arguments: &[Js]) -> Result<FilterOutput, Error> {
    let fallback = require_argument_js("default", arguments)?;
    let output = match value {
        // Parenthesized so the expression survives composition with
        // further filters.
        Js::Fragment { .. } => Js::fragment(format!(
            "({v}?{v}:{d})",
            v = value.express(),
            d = fallback.express()
        )),
        Js::Concrete(concrete) => {
            if is_truthy_concrete(concrete) {
                value.clone()
            } else {
                fallback.clone()
            }
        }
    };
    Ok(FilterOutput::One(output))
}

/// `default_if_none` returns the argument only when the value is null.
fn default_if_none(
    value: &Concrete,
    arguments: &[Concrete],
    _: &Engine,
) -> Result<Concrete, Error> {
    let fallback = require_argument("default_if_none", arguments)?;
    if matches!(value, Concrete::Value(Value::Null)) {
        Ok(fallback.clone())
    } else {
        Ok(value.clone())
    }
}

fn translate_default_if_none(
    _: &Engine,
    value: &Js,
    arguments: &[Js],
) -> Result<FilterOutput, Error> {
    let fallback = require_argument_js("default_if_none", arguments)?;
    let output = match value {
        Js::Fragment { .. } => Js::fragment(format!(
            "({v}===null?{d}:{v})",
            v = value.express(),
            d = fallback.express()
        )),
        Js::Concrete(Concrete::Value(Value::Null)) => fallback.clone(),
        _ => value.clone(),
    };
    Ok(FilterOutput::One(output))
}

/// `length` counts characters of text or items of a sequence.
fn length(value: &Concrete, _: &[Concrete], _: &Engine) -> Result<Concrete, Error> {
    let count = match value {
        Concrete::Value(Value::String(text)) => text.chars().count(),
        Concrete::Safe(text) => text.chars().count(),
        Concrete::Value(Value::Array(array)) => array.len(),
        Concrete::Value(Value::Object(object)) => object.len(),
        _ => 0,
    };
    Ok(Concrete::Value(Value::from(count)))
}

fn translate_length(_: &Engine, value: &Js, _: &[Js]) -> Result<FilterOutput, Error> {
    Ok(FilterOutput::One(Js::safe_fragment(format!(
        "{}.length",
        value.express()
    ))))
}

/// `add` sums numbers, or concatenates text and sequences when the
/// operands do not coerce to integers.
fn add(value: &Concrete, arguments: &[Concrete], _: &Engine) -> Result<Concrete, Error> {
    let argument = require_argument("add", arguments)?;
    if let (Some(left), Some(right)) = (coerce_int(value), coerce_int(argument)) {
        return Ok(Concrete::Value(Value::from(left + right)));
    }
    let joined = match (value, argument) {
        (Concrete::Value(Value::String(left)), Concrete::Value(Value::String(right))) => {
            Value::String(format!("{left}{right}"))
        }
        (Concrete::Value(Value::Array(left)), Concrete::Value(Value::Array(right))) => {
            let mut items = left.clone();
            items.extend(right.iter().cloned());
            Value::Array(items)
        }
        _ => Value::String(String::new()),
    };
    Ok(Concrete::Value(joined))
}

fn translate_add(_: &Engine, value: &Js, arguments: &[Js]) -> Result<FilterOutput, Error> {
    let argument = require_argument_js("add", arguments)?;
    let right = match argument {
        Js::Fragment { .. } => argument.express(),
        Js::Concrete(concrete) => match coerce_int(concrete) {
            Some(int) => int.to_string(),
            None => argument.express(),
        },
    };
    Ok(FilterOutput::One(Js::fragment(format!(
        "{}+{right}",
        value.express()
    ))))
}

/// Pick the format string for `date` or `time`, falling back to the
/// engine configuration.
fn concrete_format(
    name: &str,
    arguments: &[Concrete],
    fallback: &str,
    engine: &Engine,
) -> Result<String, Error> {
    match arguments.first() {
        None => Ok(fallback.to_string()),
        Some(Concrete::Value(Value::String(text))) | Some(Concrete::Safe(text)) => {
            if text.is_empty() {
                Ok(fallback.to_string())
            } else {
                engine.resolve_format(text)
            }
        }
        Some(_) => Err(Error::build(INCOMPATIBLE_TYPES)
            .with_help(format!("filter `{name}` expects a text format argument"))),
    }
}

/// `date` formats a datetime with the given format characters.
/// Anything other than a datetime folds to empty text.
fn date(value: &Concrete, arguments: &[Concrete], engine: &Engine) -> Result<Concrete, Error> {
    let datetime = match value {
        Concrete::DateTime(datetime) => datetime,
        _ => return Ok(Concrete::Value(Value::String(String::new()))),
    };
    let format = concrete_format("date", arguments, engine.date_format(), engine)?;
    Ok(Concrete::Value(Value::String(dateformat::format_datetime(
        datetime, &format,
    )?)))
}

/// `time` formats the time of day of a datetime.
/// Anything other than a datetime folds to empty text.
fn time(value: &Concrete, arguments: &[Concrete], engine: &Engine) -> Result<Concrete, Error> {
    let datetime = match value {
        Concrete::DateTime(datetime) => datetime,
        _ => return Ok(Concrete::Value(Value::String(String::new()))),
    };
    let format = concrete_format("time", arguments, engine.time_format(), engine)?;
    Ok(Concrete::Value(Value::String(dateformat::format_datetime(
        datetime, &format,
    )?)))
}

/// Shared translation of `date` and `time`, differing only in the
/// fallback format.
fn translate_date_or_time(
    name: &str,
    engine: &Engine,
    value: &Js,
    arguments: &[Js],
    fallback: &str,
) -> Result<FilterOutput, Error> {
    let format = match arguments.first() {
        None => fallback.to_string(),
        Some(Js::Fragment { .. }) => {
            return Err(Error::build(NOT_SUPPORTED)
                .with_kind(ErrorKind::NotSupported)
                .with_help(format!(
                    "filter `{name}` cannot be translated with a variable format string"
                )))
        }
        Some(Js::Concrete(concrete)) => {
            concrete_format(name, std::slice::from_ref(concrete), fallback, engine)?
        }
    };

    let target = value.express();
    let mut parts = Vec::new();
    let mut characters = format.chars();
    while let Some(character) = characters.next() {
        if character == '\\' {
            if let Some(escaped) = characters.next() {
                parts.push(Js::text(escaped.to_string()));
            }
            continue;
        }
        match dateformat::javascript_expression(character)? {
            Some(template) => {
                parts.push(Js::safe_fragment(format!(
                    "({})",
                    template.replace("{x}", &target)
                )));
            }
            None => parts.push(Js::text(character.to_string())),
        }
    }
    Ok(FilterOutput::Parts(parts))
}

fn translate_date(engine: &Engine, value: &Js, arguments: &[Js]) -> Result<FilterOutput, Error> {
    translate_date_or_time("date", engine, value, arguments, engine.date_format())
}

fn translate_time(engine: &Engine, value: &Js, arguments: &[Js]) -> Result<FilterOutput, Error> {
    translate_date_or_time("time", engine, value, arguments, engine.time_format())
}

/// Number of decimal places requested from `floatformat`. Negative means
/// at most that many places.
fn floatformat_places(name: &str, argument: Option<&Concrete>) -> Result<i64, Error> {
    match argument {
        None => Ok(-1),
        Some(concrete) => coerce_int(concrete).ok_or_else(|| {
            Error::build(INCOMPATIBLE_TYPES)
                .with_help(format!("filter `{name}` expects an integer argument"))
        }),
    }
}

/// `floatformat` rounds a number to a fixed or maximum number of places.
fn floatformat(value: &Concrete, arguments: &[Concrete], _: &Engine) -> Result<Concrete, Error> {
    let number = match coerce_float(value) {
        Some(number) => number,
        None => return Ok(Concrete::Value(Value::String(String::new()))),
    };
    let places = floatformat_places("floatformat", arguments.first())?;
    let text = if places == 0 {
        format!("{}", number.round() as i64)
    } else if places > 0 {
        format!("{:.*}", places as usize, number)
    } else {
        let factor = 10f64.powi(-places as i32);
        let rounded = (number * factor).round() / factor;
        format!("{rounded}")
    };
    Ok(Concrete::Value(Value::String(text)))
}

fn translate_floatformat(_: &Engine, value: &Js, arguments: &[Js]) -> Result<FilterOutput, Error> {
    let places = match arguments.first() {
        None => -1,
        Some(Js::Fragment { .. }) => {
            return Err(Error::build(NOT_SUPPORTED)
                .with_kind(ErrorKind::NotSupported)
                .with_help(
                    "filter `floatformat` cannot be translated with a variable argument",
                ))
        }
        Some(Js::Concrete(concrete)) => floatformat_places("floatformat", Some(concrete))?,
    };
    let target = value.express();
    let output = if places == 0 {
        Js::safe_fragment(format!("Math.round({target})"))
    } else if places > 0 {
        Js::safe_fragment(format!("parseFloat({target}).toFixed({places})"))
    } else {
        let factor = format!("1{}", "0".repeat(-places as usize));
        Js::safe_fragment(format!("Math.round({target}*{factor})/{factor}"))
    };
    Ok(FilterOutput::One(output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> Engine {
        Engine::default()
    }

    fn concrete(value: serde_json::Value) -> Concrete {
        Concrete::Value(value)
    }

    fn one(output: FilterOutput) -> Js {
        match output {
            FilterOutput::One(js) => js,
            FilterOutput::Parts(_) => panic!("expected a single value"),
        }
    }

    #[test]
    fn test_default() {
        let engine = engine();
        assert_eq!(
            default(&concrete(json!("")), &[concrete(json!("x"))], &engine).unwrap(),
            concrete(json!("x"))
        );
        assert_eq!(
            default(&concrete(json!("y")), &[concrete(json!("x"))], &engine).unwrap(),
            concrete(json!("y"))
        );
        assert!(default(&concrete(json!("y")), &[], &engine).is_err());
    }

    #[test]
    fn test_translate_default() {
        let engine = engine();
        let output = translate_default(&engine, &Js::fragment("b"), &[Js::text("x")]).unwrap();
        assert_eq!(one(output), Js::fragment("(b?b:\"x\")"));

        let output =
            translate_default(&engine, &Js::value(json!(0)), &[Js::fragment("b")]).unwrap();
        assert_eq!(one(output), Js::fragment("b"));
    }

    #[test]
    fn test_translate_default_composes() {
        // A later filter must apply to the whole fallback expression, not
        // bind into its last operand.
        let engine = engine();
        let defaulted =
            one(translate_default(&engine, &Js::fragment("b"), &[Js::text("y")]).unwrap());
        let output = translate_add(&engine, &defaulted, &[Js::value(json!(2))]).unwrap();
        assert_eq!(one(output), Js::fragment("(b?b:\"y\")+2"));
    }

    #[test]
    fn test_default_if_none() {
        let engine = engine();
        assert_eq!(
            default_if_none(&concrete(json!(null)), &[concrete(json!("x"))], &engine).unwrap(),
            concrete(json!("x"))
        );
        assert_eq!(
            default_if_none(&concrete(json!("")), &[concrete(json!("x"))], &engine).unwrap(),
            concrete(json!(""))
        );
    }

    #[test]
    fn test_translate_default_if_none() {
        let engine = engine();
        let output =
            translate_default_if_none(&engine, &Js::fragment("b"), &[Js::text("x")]).unwrap();
        assert_eq!(one(output), Js::fragment("(b===null?\"x\":b)"));
    }

    #[test]
    fn test_length() {
        let engine = engine();
        assert_eq!(
            length(&concrete(json!("abcd")), &[], &engine).unwrap(),
            concrete(json!(4))
        );
        assert_eq!(
            length(&concrete(json!([1, 2, 3])), &[], &engine).unwrap(),
            concrete(json!(3))
        );
        assert_eq!(
            length(&concrete(json!(12)), &[], &engine).unwrap(),
            concrete(json!(0))
        );
    }

    #[test]
    fn test_translate_length() {
        let engine = engine();
        let output = translate_length(&engine, &Js::fragment("b"), &[]).unwrap();
        assert_eq!(one(output), Js::safe_fragment("b.length"));
    }

    #[test]
    fn test_add() {
        let engine = engine();
        assert_eq!(
            add(&concrete(json!(3)), &[concrete(json!("2"))], &engine).unwrap(),
            concrete(json!(5))
        );
        assert_eq!(
            add(&concrete(json!("ab")), &[concrete(json!("cd"))], &engine).unwrap(),
            concrete(json!("abcd"))
        );
        assert_eq!(
            add(&concrete(json!([1])), &[concrete(json!([2]))], &engine).unwrap(),
            concrete(json!([1, 2]))
        );
        assert_eq!(
            add(&concrete(json!("ab")), &[concrete(json!([2]))], &engine).unwrap(),
            concrete(json!(""))
        );
    }

    #[test]
    fn test_translate_add() {
        let engine = engine();
        let output = translate_add(&engine, &Js::fragment("b"), &[Js::text("2")]).unwrap();
        assert_eq!(one(output), Js::fragment("b+2"));

        let output = translate_add(&engine, &Js::fragment("b"), &[Js::fragment("c")]).unwrap();
        assert_eq!(one(output), Js::fragment("b+c"));

        let output =
            translate_add(&engine, &Js::value(json!(3)), &[Js::fragment("b")]).unwrap();
        assert_eq!(one(output), Js::fragment("3+b"));
    }

    #[test]
    fn test_date_direct() {
        let engine = engine();
        let datetime = chrono::NaiveDate::from_ymd_opt(2016, 7, 8)
            .unwrap()
            .and_hms_opt(9, 5, 0)
            .unwrap();
        assert_eq!(
            date(
                &Concrete::DateTime(datetime),
                &[concrete(json!("Y-m-d"))],
                &engine
            )
            .unwrap(),
            concrete(json!("2016-07-08"))
        );
        // No argument falls back to the engine's date format.
        assert_eq!(
            date(&Concrete::DateTime(datetime), &[], &engine).unwrap(),
            concrete(json!("July 8, 2016"))
        );
        // Non-datetime input folds away silently.
        assert_eq!(
            date(&concrete(json!("text")), &[], &engine).unwrap(),
            concrete(json!(""))
        );
        assert_eq!(
            time(&concrete(json!(12)), &[], &engine).unwrap(),
            concrete(json!(""))
        );
    }

    #[test]
    fn test_translate_date_single_expression() {
        let engine = engine();
        let output = translate_date(&engine, &Js::fragment("b"), &[Js::text("Y")]).unwrap();
        let parts = match output {
            FilterOutput::Parts(parts) => parts,
            FilterOutput::One(_) => panic!("expected parts"),
        };
        assert_eq!(parts, vec![Js::safe_fragment("(b.getFullYear())")]);
    }

    #[test]
    fn test_translate_date_passthrough_and_escape() {
        let engine = engine();
        let output = translate_date(&engine, &Js::fragment("b"), &[Js::text("\\Y;")]).unwrap();
        let parts = match output {
            FilterOutput::Parts(parts) => parts,
            FilterOutput::One(_) => panic!("expected parts"),
        };
        assert_eq!(parts, vec![Js::text("Y"), Js::text(";")]);
    }

    #[test]
    fn test_translate_date_variable_format() {
        let engine = engine();
        assert!(translate_date(&engine, &Js::fragment("b"), &[Js::fragment("c")]).is_err());
    }

    #[test]
    fn test_floatformat() {
        let engine = engine();
        assert_eq!(
            floatformat(&concrete(json!(34.23234)), &[], &engine).unwrap(),
            concrete(json!("34.2"))
        );
        assert_eq!(
            floatformat(&concrete(json!(34.0)), &[], &engine).unwrap(),
            concrete(json!("34"))
        );
        assert_eq!(
            floatformat(&concrete(json!(34.26)), &[concrete(json!(1))], &engine).unwrap(),
            concrete(json!("34.3"))
        );
        assert_eq!(
            floatformat(&concrete(json!(34.26)), &[concrete(json!(0))], &engine).unwrap(),
            concrete(json!("34"))
        );
    }

    #[test]
    fn test_translate_floatformat() {
        let engine = engine();
        assert_eq!(
            one(translate_floatformat(&engine, &Js::fragment("b"), &[]).unwrap()),
            Js::safe_fragment("Math.round(b*10)/10")
        );
        assert_eq!(
            one(translate_floatformat(&engine, &Js::fragment("b"), &[Js::value(json!(0))]).unwrap()),
            Js::safe_fragment("Math.round(b)")
        );
        assert_eq!(
            one(translate_floatformat(&engine, &Js::fragment("b"), &[Js::value(json!(2))]).unwrap()),
            Js::safe_fragment("parseFloat(b).toFixed(2)")
        );
        assert!(translate_floatformat(&engine, &Js::fragment("b"), &[Js::fragment("c")]).is_err());
    }
}
