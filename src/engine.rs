use crate::{
    error::{Error, ErrorKind, INVALID_FILTER, UNSUPPORTED_CONSTRUCT},
    filter::{Filter, FilterTranslator},
    filters,
    tree::Node,
};

use std::collections::HashMap;

// Formats used when a `*_FORMAT` name has no configurable field.
const SHORT_DATE_FORMAT: &str = "m/d/Y";
const SHORT_DATETIME_FORMAT: &str = "m/d/Y P";

// Javascript body of the runtime escape function, appended to the
// configured function name. Replaces the same characters as
// `value::html_escape` so folded and deferred output match.
const ESCAPE_FUNCTION_BODY: &str = r#"(string){
    if (typeof string !== 'string') {
        if (string == null) {
            return '';
        } else {
            string = string.toString();
        }
    }

    var escape_chars = /[&<>"']/g;
    var escape_replacements = {
        '&': '&amp;',
        '<': '&lt;',
        '>': '&gt;',
        '"': '&quot;',
        "'": '&#x27;'
    };
    function escape_single_char(chr) {
        return escape_replacements[chr];
    }
    return string.replace(escape_chars, escape_single_char);
}"#;

/// Stores filters, filter translations, named templates, and the host
/// configuration that translation runs against.
pub struct Engine {
    /// Direct filter implementations, executed on concrete values.
    filters: HashMap<String, Box<dyn Filter>>,
    /// Filter translations, executed when a value is deferred.
    translators: HashMap<String, Box<dyn FilterTranslator>>,
    /// Templates this engine is aware of, available to `include`.
    templates: HashMap<String, Vec<Node>>,
    /// Name of the runtime escape function the emitted code calls.
    escape_function: String,
    date_format: String,
    time_format: String,
    datetime_format: String,
}

impl Engine {
    /// Create a new [`Engine`] without any registered filters.
    pub fn new() -> Self {
        Self {
            filters: HashMap::new(),
            translators: HashMap::new(),
            templates: HashMap::new(),
            escape_function: "html_escape".to_string(),
            date_format: "N j, Y".to_string(),
            time_format: "P".to_string(),
            datetime_format: "N j, Y, P".to_string(),
        }
    }

    /// Add a [`Filter`].
    ///
    /// # Errors
    ///
    /// If a `Filter` with the given name already exists in the engine, an
    /// [`Error`] is returned.
    pub fn add_filter<T>(&mut self, name: &str, filter: T) -> Result<(), Error>
    where
        T: Filter + 'static,
    {
        if self.filters.contains_key(name) {
            return Err(Error::build(INVALID_FILTER).with_help(format!(
                "filter with name `{name}` already exists in engine, \
                overwrite it with `.add_filter_must`"
            )));
        }
        self.filters.insert(name.to_string(), Box::new(filter));
        Ok(())
    }

    /// Add a [`Filter`].
    ///
    /// If a `Filter` with the given name already exists in the [`Engine`],
    /// it is overwritten.
    #[inline]
    pub fn add_filter_must<T>(&mut self, name: &str, filter: T)
    where
        T: Filter + 'static,
    {
        self.filters.insert(name.to_string(), Box::new(filter));
    }

    /// Add a [`Filter`].
    ///
    /// Returns the [`Engine`], so additional methods may be chained.
    ///
    /// # Errors
    ///
    /// If a `Filter` with the given name already exists in the engine, an
    /// [`Error`] is returned.
    #[inline]
    pub fn with_filter<T>(mut self, name: &str, filter: T) -> Result<Self, Error>
    where
        T: Filter + 'static,
    {
        self.add_filter(name, filter)?;
        Ok(self)
    }

    /// Add a [`Filter`].
    ///
    /// Returns the [`Engine`], so additional methods may be chained.
    ///
    /// If a `Filter` with the given name already exists in the engine, it
    /// is overwritten.
    #[inline]
    pub fn with_filter_must<T>(mut self, name: &str, filter: T) -> Self
    where
        T: Filter + 'static,
    {
        self.add_filter_must(name, filter);
        self
    }

    /// Return the filter with the given name, if it exists in the engine.
    #[inline]
    pub fn get_filter(&self, name: &str) -> Option<&dyn Filter> {
        self.filters.get(name).map(|f| f.as_ref())
    }

    /// Add a [`FilterTranslator`].
    ///
    /// # Errors
    ///
    /// If a `FilterTranslator` with the given name already exists in the
    /// engine, an [`Error`] is returned.
    pub fn add_filter_translator<T>(&mut self, name: &str, translator: T) -> Result<(), Error>
    where
        T: FilterTranslator + 'static,
    {
        if self.translators.contains_key(name) {
            return Err(Error::build(INVALID_FILTER).with_help(format!(
                "filter translation for `{name}` already exists in engine, \
                overwrite it with `.add_filter_translator_must`"
            )));
        }
        self.translators
            .insert(name.to_string(), Box::new(translator));
        Ok(())
    }

    /// Add a [`FilterTranslator`].
    ///
    /// If a `FilterTranslator` with the given name already exists in the
    /// [`Engine`], it is overwritten.
    #[inline]
    pub fn add_filter_translator_must<T>(&mut self, name: &str, translator: T)
    where
        T: FilterTranslator + 'static,
    {
        self.translators
            .insert(name.to_string(), Box::new(translator));
    }

    /// Add a [`FilterTranslator`].
    ///
    /// Returns the [`Engine`], so additional methods may be chained.
    ///
    /// If a `FilterTranslator` with the given name already exists in the
    /// engine, it is overwritten.
    #[inline]
    pub fn with_filter_translator_must<T>(mut self, name: &str, translator: T) -> Self
    where
        T: FilterTranslator + 'static,
    {
        self.add_filter_translator_must(name, translator);
        self
    }

    /// Return the filter translation with the given name, if it exists in
    /// the engine.
    #[inline]
    pub fn get_filter_translator(&self, name: &str) -> Option<&dyn FilterTranslator> {
        self.translators.get(name).map(|t| t.as_ref())
    }

    /// Store a template with the given name, making it available to
    /// `include` directives.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a template with the given name already
    /// exists.
    pub fn add_template(&mut self, name: &str, nodes: Vec<Node>) -> Result<(), Error> {
        if self.templates.contains_key(name) {
            return Err(Error::build(format!(
                "template with name `{name}` already exists in engine, \
                overwrite it with `.add_template_must`"
            )));
        }
        self.templates.insert(name.to_string(), nodes);
        Ok(())
    }

    /// Store a template with the given name.
    ///
    /// If a template with the given name already exists in the [`Engine`],
    /// it is overwritten.
    #[inline]
    pub fn add_template_must(&mut self, name: &str, nodes: Vec<Node>) {
        self.templates.insert(name.to_string(), nodes);
    }

    /// Store a template with the given name.
    ///
    /// Returns the [`Engine`], so additional methods may be chained.
    ///
    /// If a template with the given name already exists in the engine, it
    /// is overwritten.
    #[inline]
    pub fn with_template_must(mut self, name: &str, nodes: Vec<Node>) -> Self {
        self.add_template_must(name, nodes);
        self
    }

    /// Return the named template.
    #[inline]
    pub fn get_template(&self, name: &str) -> Option<&Vec<Node>> {
        self.templates.get(name)
    }

    /// Set the name of the runtime escape function.
    ///
    /// Returns the [`Engine`], so additional methods may be chained.
    pub fn with_escape_function<S>(mut self, name: S) -> Self
    where
        S: Into<String>,
    {
        self.escape_function = name.into();
        self
    }

    /// Return the name of the runtime escape function.
    #[inline]
    pub fn escape_function(&self) -> &str {
        &self.escape_function
    }

    /// Set the format used by `date` when no argument is given, and by the
    /// `DATE_FORMAT` name.
    pub fn with_date_format<S>(mut self, format: S) -> Self
    where
        S: Into<String>,
    {
        self.date_format = format.into();
        self
    }

    /// Set the format used by `time` when no argument is given, and by the
    /// `TIME_FORMAT` name.
    pub fn with_time_format<S>(mut self, format: S) -> Self
    where
        S: Into<String>,
    {
        self.time_format = format.into();
        self
    }

    /// Set the format used by the `DATETIME_FORMAT` name.
    pub fn with_datetime_format<S>(mut self, format: S) -> Self
    where
        S: Into<String>,
    {
        self.datetime_format = format.into();
        self
    }

    /// Return the format used by `date` when no argument is given.
    #[inline]
    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    /// Return the format used by `time` when no argument is given.
    #[inline]
    pub fn time_format(&self) -> &str {
        &self.time_format
    }

    /// Resolve a format string that may be a named configuration entry.
    ///
    /// Format strings ending in `_FORMAT` refer to the engine
    /// configuration instead of being read as format characters.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] for an unrecognized `*_FORMAT` name.
    pub(crate) fn resolve_format(&self, format: &str) -> Result<String, Error> {
        if !format.ends_with("_FORMAT") {
            return Ok(format.to_string());
        }
        let resolved = match format {
            "DATE_FORMAT" => &self.date_format,
            "TIME_FORMAT" => &self.time_format,
            "DATETIME_FORMAT" => &self.datetime_format,
            "SHORT_DATE_FORMAT" => SHORT_DATE_FORMAT,
            "SHORT_DATETIME_FORMAT" => SHORT_DATETIME_FORMAT,
            other => {
                return Err(Error::build(UNSUPPORTED_CONSTRUCT)
                    .with_kind(ErrorKind::UnsupportedConstruct)
                    .with_help(format!("`{other}` is not a known format name")))
            }
        };
        Ok(resolved.to_string())
    }

    /// Return the Javascript source of the runtime escape function, under
    /// the configured name.
    ///
    /// The generated function bodies call this function, so it must be
    /// present wherever they run.
    pub fn escape_function_source(&self) -> String {
        format!("function {}{}", self.escape_function, ESCAPE_FUNCTION_BODY)
    }
}

impl Default for Engine {
    /// Create a new [`Engine`] equipped with the built-in filters and
    /// their translations.
    fn default() -> Self {
        let mut engine = Engine::new();
        filters::install(&mut engine);
        engine
    }
}
