use std::fmt::{Debug, Display, Formatter, Result};

pub(crate) const UNRESOLVED_VARIABLE: &str = "unresolved variable";
pub(crate) const NOT_SUPPORTED: &str = "not supported";
pub(crate) const UNSUPPORTED_CONSTRUCT: &str = "unsupported construct";
pub(crate) const INCOMPATIBLE_TYPES: &str = "incompatible types";
pub(crate) const INVALID_FILTER: &str = "invalid filter";

/// Classifies an [`Error`] raised during translation.
///
/// Every kind aborts the entire translation; no partial output is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A template variable is absent from both the deferred arguments
    /// and the concrete scope.
    UnresolvedVariable,
    /// The construct depends on a deferred argument in a position that
    /// must be known at translation time, such as a variable format
    /// string or a variable include target.
    NotSupported,
    /// A directive or filter has no translation and no compatible
    /// extension hook.
    UnsupportedConstruct,
    /// A recognized datetime format character has no Javascript
    /// translation yet.
    UnimplementedFormatChar,
    /// The fresh name generator ran out of identifiers.
    NameSpaceExhausted,
    /// A directive translator returned with the indentation counter
    /// unbalanced.
    IndentationInvariantViolation,
}

/// Describes a failed translation.
///
/// # Examples
///
/// Creating an [`Error`] with a typed kind and help text:
///
/// ```
/// use molt::{Error, ErrorKind};
///
/// let error = Error::build("unresolved variable")
///     .with_kind(ErrorKind::UnresolvedVariable)
///     .with_help("variable `spam` is not in the store or the argument list");
///
/// assert_eq!(error.kind(), Some(ErrorKind::UnresolvedVariable));
/// ```
pub struct Error {
    /// Describes the cause of the [`Error`].
    reason: String,
    /// The class of failure, when one of the typed kinds applies.
    kind: Option<ErrorKind>,
    /// Additional information to display with the [`Error`].
    help: Option<String>,
    /// The name of the template that the [`Error`] comes from.
    name: Option<String>,
}

impl Error {
    /// Create a new [`Error`] with the given reason text.
    ///
    /// The additional fields may be populated using the various methods
    /// defined on `Error`.
    pub fn build<T>(reason: T) -> Self
    where
        T: Into<String>,
    {
        Error {
            reason: reason.into(),
            kind: None,
            help: None,
            name: None,
        }
    }

    /// Set the [`ErrorKind`].
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = Some(kind);

        self
    }

    /// Set the help text, which is contextual information to accompany the
    /// reason text.
    pub fn with_help<T>(mut self, text: T) -> Self
    where
        T: Into<String>,
    {
        self.help = Some(text.into());

        self
    }

    /// Set the name text, which is the name of the template that the
    /// [`Error`] is related to.
    pub fn with_name<T>(mut self, text: T) -> Self
    where
        T: Into<String>,
    {
        self.name = Some(text.into());

        self
    }

    /// Return the [`ErrorKind`], if one was assigned.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.kind
    }

    /// Return the reason text.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Return the help text, if any.
    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    /// Return the name of the template that the error is related to.
    pub fn get_name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Return an [`Error`] describing a missing template.
pub(crate) fn error_missing_template(name: &str) -> Error {
    Error::build("missing template")
        .with_kind(ErrorKind::UnresolvedVariable)
        .with_help(format!(
            "template `{}` not found in engine, add it with `.add_template`",
            name
        ))
}

/// Return an [`Error`] describing a filter that is not registered.
pub(crate) fn error_missing_filter(name: &str) -> Error {
    Error::build(INVALID_FILTER).with_help(format!(
        "template wants to use the `{name}` filter, but a filter with that name \
        was not found in this engine, did you add the filter to the engine with \
        `.add_filter` or `.add_filter_must`?"
    ))
}

/// Return an [`Error`] explaining that a write operation failed.
pub(crate) fn error_write() -> Error {
    Error::build("write failure").with_help("failed to write render output, are you low on memory?")
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        if !f.alternate() {
            writeln!(f, "{self:#}")?;
        }
        f.debug_struct("Error")
            .field("reason", &self.reason)
            .field("kind", &self.kind)
            .field("help", &self.help)
            .field("name", &self.name)
            .finish()?;

        Ok(())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "error: {}", self.reason)?;

        if f.alternate() {
            if let Some(name) = &self.name {
                write!(f, "\n  --> {name}")?;
            }
            if let Some(help) = &self.help {
                write!(f, "\n  = help: {help}")?;
            }
        }

        Ok(())
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let text = match self {
            ErrorKind::UnresolvedVariable => UNRESOLVED_VARIABLE,
            ErrorKind::NotSupported => NOT_SUPPORTED,
            ErrorKind::UnsupportedConstruct => UNSUPPORTED_CONSTRUCT,
            ErrorKind::UnimplementedFormatChar => "unimplemented format character",
            ErrorKind::NameSpaceExhausted => "name space exhausted",
            ErrorKind::IndentationInvariantViolation => "indentation invariant violation",
        };
        write!(f, "{text}")
    }
}

impl std::error::Error for Error {}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.reason == other.reason
            && self.kind == other.kind
            && self.help == other.help
            && self.name == other.name
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};

    #[test]
    fn test_build() {
        let error = Error::build("unsupported construct")
            .with_kind(ErrorKind::UnsupportedConstruct)
            .with_help("directive `spam` has no translation")
            .with_name("index.html");

        assert_eq!(error.kind(), Some(ErrorKind::UnsupportedConstruct));
        assert_eq!(error.reason(), "unsupported construct");
        assert_eq!(error.get_name(), Some("index.html"));
        assert_eq!(format!("{error}"), "error: unsupported construct");
    }

    #[test]
    fn test_display_alternate() {
        let error = Error::build("not supported").with_help("use a literal format string");

        assert_eq!(
            format!("{error:#}"),
            "error: not supported\n  = help: use a literal format string"
        );
    }
}
