use chrono::{Datelike, NaiveDateTime, Timelike};
use serde_json::Value;

/// A value known at translation time.
#[derive(Debug, Clone, PartialEq)]
pub enum Concrete {
    /// Plain data, escaped on output when it is a string.
    Value(Value),
    /// Text that is already escaped and must not be escaped again.
    Safe(String),
    /// A calendar value, expressed in Javascript as a `Date` constructor.
    DateTime(NaiveDateTime),
}

/// The result of evaluating a template expression.
///
/// A `Concrete` value is fully known while the Javascript function is being
/// built, so it can be folded into literal output. A `Fragment` depends on
/// one of the function arguments and stays a Javascript expression that is
/// evaluated when the generated function runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Js {
    Concrete(Concrete),
    Fragment {
        /// Javascript source of the expression. Never empty.
        text: String,
        /// True when the expression produces already-escaped output.
        safe: bool,
    },
}

impl Js {
    /// Create a new unescaped `Fragment`.
    ///
    /// # Panics
    ///
    /// Panics when the expression text is empty.
    pub fn fragment<T>(text: T) -> Self
    where
        T: Into<String>,
    {
        let text = text.into();
        assert!(!text.is_empty(), "fragment expression must not be empty");
        Js::Fragment { text, safe: false }
    }

    /// Create a new `Fragment` that does not need escaping.
    ///
    /// # Panics
    ///
    /// Panics when the expression text is empty.
    pub fn safe_fragment<T>(text: T) -> Self
    where
        T: Into<String>,
    {
        let text = text.into();
        assert!(!text.is_empty(), "fragment expression must not be empty");
        Js::Fragment { text, safe: true }
    }

    /// Create a new `Concrete` text value.
    pub fn text<T>(text: T) -> Self
    where
        T: Into<String>,
    {
        Js::Concrete(Concrete::Value(Value::String(text.into())))
    }

    /// Create a new `Concrete` value from plain data.
    pub fn value(value: Value) -> Self {
        Js::Concrete(Concrete::Value(value))
    }

    /// Return true if the value is deferred to function run time.
    pub fn is_fragment(&self) -> bool {
        matches!(self, Js::Fragment { .. })
    }

    /// Return true if the value does not need escaping.
    pub fn is_safe(&self) -> bool {
        match self {
            Js::Fragment { safe, .. } => *safe,
            Js::Concrete(concrete) => matches!(concrete, Concrete::Safe(_)),
        }
    }

    /// Express the value as Javascript source.
    ///
    /// Concrete data becomes a literal, datetimes become a `Date`
    /// constructor with a zero-based month and microseconds truncated
    /// to milliseconds, and fragments are returned as they are.
    pub fn express(&self) -> String {
        match self {
            Js::Fragment { text, .. } => text.clone(),
            Js::Concrete(concrete) => concrete.express(),
        }
    }

    /// Flag the value as already escaped.
    ///
    /// Concrete values other than text carry no markup and are returned
    /// unchanged.
    pub fn mark_safe(self) -> Self {
        match self {
            Js::Fragment { text, .. } => Js::Fragment { text, safe: true },
            Js::Concrete(Concrete::Value(Value::String(text))) => {
                Js::Concrete(Concrete::Safe(text))
            }
            other => other,
        }
    }

    /// Escape the value if it needs it.
    ///
    /// Concrete text is escaped in place. An unescaped fragment is wrapped
    /// in a call to the named runtime escape function. Safe values and
    /// concrete values without markup come back unchanged.
    pub fn escape(self, escaper: &str) -> Self {
        if self.is_safe() {
            return self;
        }
        match self {
            Js::Fragment { text, .. } => Js::Fragment {
                text: format!("{escaper}({text})"),
                safe: true,
            },
            Js::Concrete(Concrete::Value(Value::String(text))) => {
                Js::Concrete(Concrete::Safe(html_escape(&text)))
            }
            other => other,
        }
    }
}

impl Concrete {
    /// Express the value as Javascript source.
    pub fn express(&self) -> String {
        match self {
            Concrete::Value(value) => value.to_string(),
            Concrete::Safe(text) => Value::String(text.clone()).to_string(),
            Concrete::DateTime(datetime) => format!(
                "new Date({},{},{},{},{},{},{})",
                datetime.year(),
                datetime.month0(),
                datetime.day(),
                datetime.hour(),
                datetime.minute(),
                datetime.second(),
                datetime.nanosecond() / 1_000_000,
            ),
        }
    }
}

/// Replace markup characters in the text with HTML entities.
pub fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for character in text.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Return true if the text is a valid Javascript variable name.
pub fn is_js_identifier(text: &str) -> bool {
    let mut characters = text.chars();
    match characters.next() {
        Some(first) if unicode_ident::is_xid_start(first) || first == '_' => {}
        _ => return false,
    }
    characters.all(|c| unicode_ident::is_xid_continue(c))
}

/// Return true if `base.key` is valid Javascript, false when `base["key"]`
/// must be used instead.
fn is_attributable(key: &str) -> bool {
    !key.chars()
        .any(|c| matches!(c, ' ' | '\'' | '"' | '[' | ']' | '.'))
}

/// Build the Javascript expression accessing a property of the base
/// expression, choosing between dot and bracket syntax.
pub(crate) fn index_fragment(base: &str, key: &str) -> String {
    let grouped = if is_js_identifier(base) {
        base.to_string()
    } else {
        format!("({base})")
    };
    if is_attributable(key) {
        format!("{grouped}.{key}")
    } else {
        format!("{grouped}[{}]", Value::String(key.to_string()))
    }
}

// Normalized shape used while folding concatenation parts.
enum Piece {
    Text(String),
    SafeText(String),
    Expr { text: String, safe: bool },
}

impl Piece {
    fn from_js(value: Js) -> Self {
        match value {
            Js::Concrete(Concrete::Value(Value::String(text))) => Piece::Text(text),
            Js::Concrete(Concrete::Safe(text)) => Piece::SafeText(text),
            Js::Concrete(Concrete::Value(other)) => Piece::Text(other.to_string()),
            Js::Concrete(datetime) => Piece::Expr {
                text: datetime.express(),
                safe: false,
            },
            Js::Fragment { text, safe } => Piece::Expr { text, safe },
        }
    }

    fn into_js(self) -> Js {
        match self {
            Piece::Text(text) => Js::Concrete(Concrete::Value(Value::String(text))),
            Piece::SafeText(text) => Js::Concrete(Concrete::Safe(text)),
            Piece::Expr { text, safe } => Js::Fragment { text, safe },
        }
    }

    fn express(&self) -> String {
        match self {
            Piece::Text(text) => Value::String(text.clone()).to_string(),
            Piece::SafeText(text) => Value::String(text.clone()).to_string(),
            Piece::Expr { text, .. } => text.clone(),
        }
    }
}

/// Build a new value by concatenating the given parts.
///
/// Adjacent literal text is merged at translation time, so a run of known
/// parts collapses into a single string. A single remaining part is returned
/// unchanged. When any part is safe, every part is escaped and the result
/// is safe, otherwise escaping is left to whoever outputs the result.
pub fn concatenate(escaper: &str, parts: Vec<Js>) -> Js {
    if parts.is_empty() {
        return Js::text("");
    }
    if parts.len() == 1 {
        return parts.into_iter().next().unwrap();
    }

    let mut merged: Vec<Piece> = vec![Piece::Text(String::new())];
    let mut contains_safe = false;
    for part in parts {
        match Piece::from_js(part) {
            Piece::Text(text) => {
                if text.is_empty() {
                    continue;
                }
                match merged.last_mut().unwrap() {
                    Piece::Text(last) => last.push_str(&text),
                    Piece::SafeText(last) => last.push_str(&html_escape(&text)),
                    Piece::Expr { .. } => merged.push(Piece::Text(text)),
                }
            }
            Piece::SafeText(text) => {
                if text.is_empty() {
                    continue;
                }
                contains_safe = true;
                match merged.last_mut().unwrap() {
                    Piece::SafeText(last) => last.push_str(&text),
                    Piece::Text(last) => {
                        let mut escaped = html_escape(last);
                        escaped.push_str(&text);
                        *merged.last_mut().unwrap() = Piece::SafeText(escaped);
                    }
                    Piece::Expr { .. } => merged.push(Piece::SafeText(text)),
                }
            }
            expr @ Piece::Expr { .. } => {
                if let Piece::Expr { safe: true, .. } = expr {
                    contains_safe = true;
                }
                merged.push(expr);
            }
        }
    }

    if merged.len() == 1 {
        return merged.pop().unwrap().into_js();
    }
    if matches!(merged.first(), Some(Piece::Text(text)) if text.is_empty()) {
        merged.remove(0);
    }
    if merged.len() == 1 {
        return merged.pop().unwrap().into_js();
    }

    if contains_safe {
        merged = merged
            .into_iter()
            .map(|piece| match piece {
                Piece::Text(text) => Piece::SafeText(html_escape(&text)),
                Piece::Expr { text, safe: false } => Piece::Expr {
                    text: format!("{escaper}({text})"),
                    safe: true,
                },
                safe => safe,
            })
            .collect();
    }

    let joined = merged
        .iter()
        .map(Piece::express)
        .collect::<Vec<_>>()
        .join("+");
    Js::Fragment {
        text: joined,
        safe: contains_safe,
    }
}

#[cfg(test)]
mod tests {
    use super::{concatenate, html_escape, index_fragment, is_js_identifier, Concrete, Js};
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_express_literal() {
        assert_eq!(Js::text("bla").express(), "\"bla\"");
        assert_eq!(Js::value(json!(12)).express(), "12");
        assert_eq!(Js::value(json!([1, 2])).express(), "[1,2]");
        assert_eq!(Js::fragment("spam.ham").express(), "spam.ham");
    }

    #[test]
    fn test_express_datetime() {
        let datetime = NaiveDate::from_ymd_opt(2016, 7, 8)
            .unwrap()
            .and_hms_micro_opt(9, 10, 11, 123456)
            .unwrap();
        assert_eq!(
            Js::Concrete(Concrete::DateTime(datetime)).express(),
            "new Date(2016,6,8,9,10,11,123)"
        );
    }

    #[test]
    fn test_mark_safe() {
        assert_eq!(
            Js::text("a&b").mark_safe(),
            Js::Concrete(Concrete::Safe("a&b".into()))
        );
        assert_eq!(Js::fragment("b").mark_safe(), Js::safe_fragment("b"));
    }

    #[test]
    fn test_escape_text() {
        let escaped = Js::text("a<br/>c").escape("escape");
        assert_eq!(escaped, Js::Concrete(Concrete::Safe("a&lt;br/&gt;c".into())));
    }

    #[test]
    fn test_escape_fragment() {
        let escaped = Js::fragment("b").escape("escape");
        assert_eq!(escaped, Js::safe_fragment("escape(b)"));
    }

    #[test]
    fn test_escape_idempotent() {
        let once = Js::text("x&y").escape("escape");
        let twice = once.clone().escape("escape");
        assert_eq!(once, twice);

        let once = Js::fragment("b").escape("escape");
        let twice = once.clone().escape("escape");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_escape_non_string_noop() {
        assert_eq!(Js::value(json!(42)).escape("escape"), Js::value(json!(42)));
        assert_eq!(
            Js::value(json!(true)).escape("escape"),
            Js::value(json!(true))
        );
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape("<a href=\"x\">&'</a>"),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#x27;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_identifier() {
        assert!(is_js_identifier("spam"));
        assert!(is_js_identifier("_private2"));
        assert!(!is_js_identifier("2spam"));
        assert!(!is_js_identifier("spam.ham"));
        assert!(!is_js_identifier(""));
    }

    #[test]
    fn test_index_fragment() {
        assert_eq!(index_fragment("b", "ham"), "b.ham");
        assert_eq!(index_fragment("b[0]", "ham"), "(b[0]).ham");
        assert_eq!(index_fragment("b", "strange key"), "b[\"strange key\"]");
    }

    #[test]
    fn test_concatenate_singleton_identity() {
        let fragment = Js::fragment("b");
        assert_eq!(concatenate("escape", vec![fragment.clone()]), fragment);
    }

    #[test]
    fn test_concatenate_collapses_text() {
        let result = concatenate(
            "escape",
            vec![Js::text("a"), Js::text("b"), Js::fragment("c")],
        );
        assert_eq!(result, Js::fragment("\"ab\"+c"));
    }

    #[test]
    fn test_concatenate_safety_contagion() {
        let result = concatenate(
            "escape",
            vec![
                Js::text("<b>"),
                Js::safe_fragment("c.length"),
                Js::fragment("d"),
            ],
        );
        assert_eq!(
            result,
            Js::safe_fragment("\"&lt;b&gt;\"+c.length+escape(d)")
        );
    }

    #[test]
    fn test_concatenate_all_text() {
        let result = concatenate("escape", vec![Js::text("a"), Js::text("b")]);
        assert_eq!(result, Js::text("ab"));
    }
}
