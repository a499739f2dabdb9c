//! Compiles datetime format characters into Javascript expressions, and
//! formats concrete datetimes with the same semantics.
//!
//! The format characters follow the PHP-style table used by web template
//! engines. Each implemented character maps to a Javascript expression
//! template with an `{x}` placeholder for the `Date` value. The direct
//! formatter mirrors the emitted expressions exactly, so folding a known
//! datetime and deferring one produce identical text.

use crate::error::{Error, ErrorKind};

use chrono::{Datelike, NaiveDateTime, Timelike};

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const MONTHS_3: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const MONTHS_3_TITLE: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

// Associated Press style month names.
const MONTHS_AP: [&str; 12] = [
    "Jan.", "Feb.", "March", "April", "May", "June", "July", "Aug.", "Sept.", "Oct.", "Nov.",
    "Dec.",
];

// Stored Sunday first to match Javascript `getDay()`.
const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

const WEEKDAYS_ABBR: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Build the expression `value<10?"0"+(value):(value)`.
fn zero_padded_two_digit(value: &str) -> String {
    format!("{value}<10?\"0\"+({value}):({value})")
}

/// Build the expression left-padding the value with zeros to the given
/// number of digits.
fn zero_padded(value: &str, digits: usize) -> String {
    format!(
        "\"{}\".substr(({value}).toString().length)+{value}",
        "0".repeat(digits)
    )
}

/// Build the expression indexing an array literal of names.
fn array_index(names: &[&str], index: &str) -> String {
    let items = names
        .iter()
        .map(|name| format!("\"{name}\""))
        .collect::<Vec<_>>()
        .join(",");
    format!("[{items}][{index}]")
}

fn twelve_hour_time() -> String {
    // Hours then ":MM" only when minutes are not zero.
    "({x}.getHours()%12)\
     +({x}.getMinutes()==0?\"\":({x}.getMinutes()<10\
     ?\":0\"+{x}.getMinutes():\":\"+{x}.getMinutes()))"
        .to_string()
}

fn meridiem() -> String {
    "{x}.getHours()<12?\"a.m.\":\"p.m.\"".to_string()
}

/// Return the Javascript expression template for the format character.
///
/// `Ok(None)` means the character has no meaning and passes through as
/// literal text.
///
/// # Errors
///
/// Returns an [`Error`] for format characters that are recognized but have
/// no Javascript translation.
pub fn javascript_expression(character: char) -> Result<Option<String>, Error> {
    let expression = match character {
        'a' => meridiem(),
        'A' => "{x}.getHours()<12?\"AM\":\"PM\"".to_string(),
        'b' => array_index(&MONTHS_3, "{x}.getMonth()"),
        'd' => zero_padded_two_digit("{x}.getDate()"),
        'D' => array_index(&WEEKDAYS_ABBR, "{x}.getDay()"),
        'E' => array_index(&MONTHS, "{x}.getMonth()"),
        'f' => twelve_hour_time(),
        'F' => array_index(&MONTHS, "{x}.getMonth()"),
        'g' => "{x}.getHours()%12".to_string(),
        'G' => "{x}.getHours()".to_string(),
        'h' => zero_padded_two_digit("{x}.getHours()%12"),
        'H' => zero_padded_two_digit("{x}.getHours()"),
        'i' => zero_padded_two_digit("{x}.getMinutes()"),
        'j' => "{x}.getDate()".to_string(),
        'l' => array_index(&WEEKDAYS, "{x}.getDay()"),
        'm' => zero_padded_two_digit("{x}.getMonth()+1"),
        'M' => array_index(&MONTHS_3_TITLE, "{x}.getMonth()"),
        'n' => "{x}.getMonth()+1".to_string(),
        'N' => array_index(&MONTHS_AP, "{x}.getMonth()"),
        'P' => format!(
            "(({{x}}.getMinutes()==0&&{{x}}.getHours()==0)?\"midnight\"\
             :(({{x}}.getMinutes()==0&&{{x}}.getHours()==12)?\"noon\"\
             :({})+\" \"+({})))",
            twelve_hour_time(),
            meridiem(),
        ),
        's' => zero_padded_two_digit("{x}.getSeconds()"),
        'S' => "(11<={x}.getDate()&&{x}.getDate()<=13?\"th\"\
                :{x}.getDate()%10==1?\"st\"\
                :({x}.getDate()%10==2?\"nd\"\
                :({x}.getDate()%10==3?\"rd\":\"th\")))"
            .to_string(),
        'u' => zero_padded("{x}.getMilliseconds()*1000", 6),
        'U' => "Math.floor({x}.getTime()/1000)".to_string(),
        'w' => "{x}.getDay()".to_string(),
        'y' => zero_padded_two_digit("{x}.getFullYear()%100"),
        'Y' => "{x}.getFullYear()".to_string(),
        'c' | 'e' | 'I' | 'L' | 'o' | 'O' | 'r' | 't' | 'T' | 'W' | 'z' | 'Z' => {
            return Err(Error::build("unimplemented format character")
                .with_kind(ErrorKind::UnimplementedFormatChar)
                .with_help(format!(
                    "datetime format character `{character}` has no Javascript translation yet"
                )))
        }
        _ => return Ok(None),
    };
    Ok(Some(expression))
}

/// Two-digit zero padding matching the emitted Javascript.
fn pad_two(value: u32) -> String {
    if value < 10 {
        format!("0{value}")
    } else {
        value.to_string()
    }
}

/// Format one character against a concrete datetime.
///
/// The output matches the emitted Javascript expression for the same
/// character. `Ok(None)` means the character passes through as literal
/// text.
fn format_character(datetime: &NaiveDateTime, character: char) -> Result<Option<String>, Error> {
    let hour = datetime.hour();
    let minute = datetime.minute();
    let day = datetime.day();
    let month0 = datetime.month0() as usize;
    // Javascript getDay() counts from Sunday.
    let weekday = datetime.weekday().num_days_from_sunday() as usize;
    let milliseconds = datetime.nanosecond() / 1_000_000;

    let twelve_hour = || {
        let mut text = (hour % 12).to_string();
        if minute != 0 {
            text.push(':');
            text.push_str(&pad_two(minute));
        }
        text
    };
    let am_pm = || if hour < 12 { "a.m." } else { "p.m." };

    let text = match character {
        'a' => am_pm().to_string(),
        'A' => if hour < 12 { "AM" } else { "PM" }.to_string(),
        'b' => MONTHS_3[month0].to_string(),
        'd' => pad_two(day),
        'D' => WEEKDAYS_ABBR[weekday].to_string(),
        'E' | 'F' => MONTHS[month0].to_string(),
        'f' => twelve_hour(),
        'g' => (hour % 12).to_string(),
        'G' => hour.to_string(),
        'h' => pad_two(hour % 12),
        'H' => pad_two(hour),
        'i' => pad_two(minute),
        'j' => day.to_string(),
        'l' => WEEKDAYS[weekday].to_string(),
        'm' => pad_two(datetime.month()),
        'M' => MONTHS_3_TITLE[month0].to_string(),
        'n' => datetime.month().to_string(),
        'N' => MONTHS_AP[month0].to_string(),
        'P' => {
            if minute == 0 && hour == 0 {
                "midnight".to_string()
            } else if minute == 0 && hour == 12 {
                "noon".to_string()
            } else {
                format!("{} {}", twelve_hour(), am_pm())
            }
        }
        's' => pad_two(datetime.second()),
        'S' => {
            let suffix = if (11..=13).contains(&day) {
                "th"
            } else {
                match day % 10 {
                    1 => "st",
                    2 => "nd",
                    3 => "rd",
                    _ => "th",
                }
            };
            suffix.to_string()
        }
        'u' => format!("{:06}", milliseconds * 1000),
        'U' => datetime.and_utc().timestamp().to_string(),
        'w' => weekday.to_string(),
        'y' => pad_two(datetime.year() as u32 % 100),
        'Y' => datetime.year().to_string(),
        'c' | 'e' | 'I' | 'L' | 'o' | 'O' | 'r' | 't' | 'T' | 'W' | 'z' | 'Z' => {
            return Err(Error::build("unimplemented format character")
                .with_kind(ErrorKind::UnimplementedFormatChar)
                .with_help(format!(
                    "datetime format character `{character}` has no Javascript translation yet"
                )))
        }
        _ => return Ok(None),
    };
    Ok(Some(text))
}

/// Format a concrete datetime with the given format string.
///
/// A backslash escapes the next character. Characters without a table
/// entry pass through as literal text.
///
/// # Errors
///
/// Returns an [`Error`] when the format contains a recognized but
/// untranslatable character.
pub fn format_datetime(datetime: &NaiveDateTime, format: &str) -> Result<String, Error> {
    let mut output = String::new();
    let mut characters = format.chars();
    while let Some(character) = characters.next() {
        if character == '\\' {
            if let Some(escaped) = characters.next() {
                output.push(escaped);
            }
            continue;
        }
        match format_character(datetime, character)? {
            Some(text) => output.push_str(&text),
            None => output.push(character),
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::{format_datetime, javascript_expression};
    use chrono::{NaiveDate, NaiveDateTime};

    fn sample() -> NaiveDateTime {
        // A Friday.
        NaiveDate::from_ymd_opt(2016, 7, 8)
            .unwrap()
            .and_hms_milli_opt(9, 5, 11, 123)
            .unwrap()
    }

    #[test]
    fn test_expression_templates() {
        assert_eq!(
            javascript_expression('Y').unwrap().unwrap(),
            "{x}.getFullYear()"
        );
        assert_eq!(
            javascript_expression('g').unwrap().unwrap(),
            "{x}.getHours()%12"
        );
        assert_eq!(
            javascript_expression('d').unwrap().unwrap(),
            "{x}.getDate()<10?\"0\"+({x}.getDate()):({x}.getDate())"
        );
        assert_eq!(
            javascript_expression('D').unwrap().unwrap(),
            "[\"Sun\",\"Mon\",\"Tue\",\"Wed\",\"Thu\",\"Fri\",\"Sat\"][{x}.getDay()]"
        );
    }

    #[test]
    fn test_expression_passthrough() {
        assert!(javascript_expression('x').unwrap().is_none());
        assert!(javascript_expression(';').unwrap().is_none());
    }

    #[test]
    fn test_expression_unimplemented() {
        for character in ['c', 'e', 'I', 'L', 'o', 'O', 'r', 't', 'T', 'W', 'z', 'Z'] {
            assert!(javascript_expression(character).is_err());
        }
    }

    #[test]
    fn test_format_concrete() {
        let datetime = sample();
        assert_eq!(format_datetime(&datetime, "Y-m-d").unwrap(), "2016-07-08");
        assert_eq!(format_datetime(&datetime, "N j, Y").unwrap(), "July 8, 2016");
        assert_eq!(format_datetime(&datetime, "D l").unwrap(), "Fri Friday");
        assert_eq!(format_datetime(&datetime, "H:i:s").unwrap(), "09:05:11");
        assert_eq!(format_datetime(&datetime, "g A").unwrap(), "9 AM");
        assert_eq!(format_datetime(&datetime, "P").unwrap(), "9:05 a.m.");
        assert_eq!(format_datetime(&datetime, "jS").unwrap(), "8th");
        assert_eq!(format_datetime(&datetime, "u").unwrap(), "123000");
    }

    #[test]
    fn test_format_escapes() {
        let datetime = sample();
        assert_eq!(format_datetime(&datetime, "\\Y").unwrap(), "Y");
        assert_eq!(format_datetime(&datetime, "x;").unwrap(), "x;");
    }

    #[test]
    fn test_format_midnight_and_noon() {
        let midnight = NaiveDate::from_ymd_opt(2016, 7, 8)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let noon = NaiveDate::from_ymd_opt(2016, 7, 8)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(format_datetime(&midnight, "P").unwrap(), "midnight");
        assert_eq!(format_datetime(&noon, "P").unwrap(), "noon");
    }

    #[test]
    fn test_format_unimplemented() {
        assert!(format_datetime(&sample(), "c").is_err());
    }
}
