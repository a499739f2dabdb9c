use crate::{
    error::{Error, ErrorKind, UNRESOLVED_VARIABLE, UNSUPPORTED_CONSTRUCT},
    value::{index_fragment, Concrete, Js},
};

use std::{collections::HashMap, fmt::Display};

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{to_value, Value};

/// Provides storage for the data a template is translated against.
///
/// Everything in the `Store` is known while the Javascript function is
/// being built, so template constructs that only touch stored values are
/// folded into literal output.
#[derive(Debug)]
pub struct Store {
    data: HashMap<String, Concrete>,
}

impl Store {
    /// Create a new [`Store`].
    ///
    /// # Examples
    ///
    /// ```
    /// use molt::Store;
    ///
    /// let store = Store::new();
    /// ```
    #[inline]
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    /// Inserts a key-value pair into the [`Store`].
    ///
    /// # Errors
    ///
    /// Returns an error if the serialization fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use molt::Store;
    ///
    /// let mut store = Store::new();
    /// let result = store.insert("name", "taylor");
    ///
    /// assert!(result.is_ok());
    /// ```
    pub fn insert<S, T>(&mut self, key: S, value: T) -> Result<(), Error>
    where
        S: Into<String>,
        T: Serialize + Display,
    {
        let serialized = to_value(&value)
            .map_err(|_| Error::build(format!("value {} is unserializable", value)))?;

        self.data.insert(key.into(), Concrete::Value(serialized));
        Ok(())
    }

    /// Inserts a key-value pair into the [`Store`].
    ///
    /// # Panics
    ///
    /// Panics if the serialization fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use molt::Store;
    ///
    /// let mut store = Store::new();
    /// store.insert_must("name", "taylor");
    /// ```
    #[inline]
    pub fn insert_must<S, T>(&mut self, key: S, value: T)
    where
        S: Into<String>,
        T: Serialize + Display,
    {
        self.data
            .insert(key.into(), Concrete::Value(to_value(value).unwrap()));
    }

    /// Inserts a key-value pair into the [`Store`].
    ///
    /// Returns the `Store`, so additional methods may be chained.
    ///
    /// # Errors
    ///
    /// Returns an error if the serialization fails.
    #[inline]
    pub fn with<S, T>(mut self, key: S, value: T) -> Result<Self, Error>
    where
        S: Into<String>,
        T: Serialize + Display,
    {
        self.insert(key, value)?;

        Ok(self)
    }

    /// Inserts a key-value pair into the [`Store`].
    ///
    /// Returns the `Store`, so additional methods may be chained.
    ///
    /// # Panics
    ///
    /// Panics if the serialization fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use molt::Store;
    ///
    /// let store = Store::new().with_must("name", "taylor");
    /// ```
    #[inline]
    pub fn with_must<S, T>(mut self, key: S, value: T) -> Self
    where
        S: Into<String>,
        T: Serialize + Display,
    {
        self.insert_must(key, value);

        self
    }

    /// Inserts a datetime into the [`Store`] as a first-class calendar value.
    #[inline]
    pub fn insert_datetime<S>(&mut self, key: S, value: NaiveDateTime)
    where
        S: Into<String>,
    {
        self.data.insert(key.into(), Concrete::DateTime(value));
    }

    /// Inserts a datetime into the [`Store`].
    ///
    /// Returns the `Store`, so additional methods may be chained.
    #[inline]
    pub fn with_datetime<S>(mut self, key: S, value: NaiveDateTime) -> Self
    where
        S: Into<String>,
    {
        self.insert_datetime(key, value);

        self
    }

    /// Returns a reference to the value corresponding to the key.
    #[inline]
    pub fn get(&self, index: &str) -> Option<&Concrete> {
        self.data.get(index)
    }
}

impl Default for Store {
    fn default() -> Self {
        Store::new()
    }
}

/// The loop context introduced by a counted `for` statement.
///
/// Attributes compile to expressions over the loop counter and the
/// sequence, so they stay valid however many times the loop runs.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopFrame {
    /// Name of the generated loop counter variable.
    counter: String,
    /// Javascript expression for the sequence being iterated.
    sequence: String,
    /// The enclosing loop, if this loop is nested.
    parent: Option<Box<LoopFrame>>,
}

impl LoopFrame {
    /// Create a new [`LoopFrame`] over the given counter and sequence.
    pub fn new(counter: String, sequence: String, parent: Option<LoopFrame>) -> Self {
        LoopFrame {
            counter,
            sequence,
            parent: parent.map(Box::new),
        }
    }

    /// Return the enclosing [`LoopFrame`], if any.
    pub fn parent(&self) -> Option<&LoopFrame> {
        self.parent.as_deref()
    }

    /// Compile the named attribute to a Javascript expression.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] for attribute names the loop context does not
    /// provide.
    pub fn attribute(&self, key: &str) -> Result<Js, Error> {
        let counter = &self.counter;
        let sequence = &self.sequence;
        let text = match key {
            "counter" => format!("{counter}+1"),
            "counter0" => counter.clone(),
            "revcounter" => format!("{sequence}.length-{counter}"),
            "revcounter0" => format!("{sequence}.length-{counter}-1"),
            "first" => format!("{counter}===0"),
            "last" => format!("{counter}==={sequence}.length-1"),
            other => {
                return Err(Error::build(UNSUPPORTED_CONSTRUCT)
                    .with_kind(ErrorKind::UnsupportedConstruct)
                    .with_help(format!("the loop context has no attribute `{other}`")))
            }
        };
        Ok(Js::fragment(text))
    }
}

/// A name bound in a [`Scope`] frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// An ordinary value, concrete or deferred.
    Value(Js),
    /// The loop context of an enclosing `for` statement.
    Loop(LoopFrame),
}

/// A stack of frames shadowing a [`Store`].
///
/// Lookup searches the frames innermost first and falls back to the store,
/// so function arguments and loop variables shadow stored data of the same
/// name.
#[derive(Debug)]
pub struct Scope<'store> {
    store: &'store Store,
    /// When set, lookups never reach the store. Used by isolated includes.
    masked: bool,
    frames: Vec<HashMap<String, Binding>>,
}

impl<'store> Scope<'store> {
    /// Create a new [`Scope`] over the given [`Store`].
    #[inline]
    pub fn new(store: &'store Store) -> Self {
        Self {
            store,
            masked: false,
            frames: vec![HashMap::new()],
        }
    }

    /// Create a new [`Scope`] whose lookups never reach the [`Store`].
    #[inline]
    pub fn isolated(store: &'store Store) -> Self {
        Self {
            store,
            masked: true,
            frames: vec![HashMap::new()],
        }
    }

    /// Return the underlying [`Store`].
    #[inline]
    pub fn store(&self) -> &'store Store {
        self.store
    }

    /// Push a new frame onto the [`Scope`].
    #[inline]
    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Remove the top frame from the [`Scope`].
    #[inline]
    pub fn pop(&mut self) {
        if self.frames.len() == 1 {
            panic!("last frame must never be removed");
        }
        self.frames.pop();
    }

    /// Bind the name in the top frame of the [`Scope`].
    ///
    /// # Panics
    ///
    /// Panics if no frames exist within the [`Scope`].
    #[inline]
    pub fn insert<S>(&mut self, key: S, binding: Binding)
    where
        S: Into<String>,
    {
        self.frames
            .last_mut()
            .expect("stack must not be empty when binding value")
            .insert(key.into(), binding);
    }

    /// Get the [`Binding`] of the given name.
    ///
    /// If the name is not found within the frames, the store will be
    /// searched.
    pub fn get(&self, name: &str) -> Option<Binding> {
        for frame in self.frames.iter().rev() {
            if let Some(binding) = frame.get(name) {
                return Some(binding.clone());
            }
        }
        if self.masked {
            return None;
        }
        self.store
            .get(name)
            .map(|concrete| Binding::Value(Js::Concrete(concrete.clone())))
    }

    /// Resolve a dotted variable path into a value.
    ///
    /// Deferred values compile the remaining path into property accesses,
    /// concrete values are dug into directly.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the first name is unbound, a lookup step
    /// fails on concrete data, or the path ends on a loop context.
    pub fn resolve(&self, path: &[String]) -> Result<Js, Error> {
        let first = path
            .first()
            .expect("variable path must have at least one name");
        let mut current = self.get(first).ok_or_else(|| {
            Error::build(UNRESOLVED_VARIABLE)
                .with_kind(ErrorKind::UnresolvedVariable)
                .with_help(format!("variable `{}` is not defined", path.join(".")))
        })?;

        for key in path.iter().skip(1) {
            current = match current {
                Binding::Loop(frame) => match (key.as_str(), frame.parent()) {
                    ("parentloop", Some(parent)) => Binding::Loop(parent.clone()),
                    _ => Binding::Value(frame.attribute(key)?),
                },
                Binding::Value(value) => Binding::Value(self.dig(value, key, path)?),
            };
        }

        match current {
            Binding::Value(value) => Ok(value),
            Binding::Loop(_) => Err(Error::build(UNSUPPORTED_CONSTRUCT)
                .with_kind(ErrorKind::UnsupportedConstruct)
                .with_help("the loop context cannot be output itself, use one of its attributes")),
        }
    }

    /// Look up one path step on a value.
    fn dig(&self, value: Js, key: &str, path: &[String]) -> Result<Js, Error> {
        let missing = || {
            Error::build(UNRESOLVED_VARIABLE)
                .with_kind(ErrorKind::UnresolvedVariable)
                .with_help(format!(
                    "failed lookup for key `{key}` in `{}`",
                    path.join(".")
                ))
        };
        match value {
            Js::Fragment { text, .. } => Ok(Js::Fragment {
                text: index_fragment(&text, key),
                safe: false,
            }),
            Js::Concrete(Concrete::Value(data)) => {
                let step = match &data {
                    Value::Object(object) => object.get(key).cloned(),
                    Value::Array(array) => key
                        .parse::<usize>()
                        .ok()
                        .and_then(|index| array.get(index).cloned()),
                    _ => None,
                };
                step.map(|v| Js::Concrete(Concrete::Value(v)))
                    .ok_or_else(missing)
            }
            Js::Concrete(_) => Err(missing()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Binding, LoopFrame, Scope, Store};
    use crate::value::Js;
    use serde_json::json;

    #[test]
    fn test_store_insert() {
        let mut store = Store::new();
        store.insert_must("one", "two");

        assert!(store.get("one").is_some());
    }

    #[test]
    fn test_scope_shadowing() {
        let store = Store::new().with_must("name", "stored");
        let mut scope = Scope::new(&store);
        scope.push();
        scope.insert("name", Binding::Value(Js::fragment("b")));

        assert_eq!(
            scope.resolve(&["name".to_string()]).unwrap(),
            Js::fragment("b")
        );
        scope.pop();

        assert_eq!(
            scope.resolve(&["name".to_string()]).unwrap(),
            Js::text("stored")
        );
    }

    #[test]
    #[should_panic(expected = "last frame must never be removed")]
    fn test_scope_pop_empty() {
        let store = Store::new();
        let mut scope = Scope::new(&store);

        scope.pop();
    }

    #[test]
    fn test_resolve_concrete_path() {
        let store = Store::new().with_must("spam", json!({"ham": "abc"}));
        let scope = Scope::new(&store);

        assert_eq!(
            scope
                .resolve(&["spam".to_string(), "ham".to_string()])
                .unwrap(),
            Js::text("abc")
        );
        assert!(scope
            .resolve(&["spam".to_string(), "eggs".to_string()])
            .is_err());
    }

    #[test]
    fn test_resolve_fragment_path() {
        let store = Store::new();
        let mut scope = Scope::new(&store);
        scope.insert("spam", Binding::Value(Js::fragment("b")));

        assert_eq!(
            scope
                .resolve(&["spam".to_string(), "ham".to_string()])
                .unwrap(),
            Js::fragment("b.ham")
        );
    }

    #[test]
    fn test_isolated_masks_store() {
        let store = Store::new().with_must("name", "stored");
        let scope = Scope::isolated(&store);

        assert!(scope.resolve(&["name".to_string()]).is_err());
    }

    #[test]
    fn test_loop_attributes() {
        let frame = LoopFrame::new("c".into(), "b".into(), None);

        assert_eq!(frame.attribute("counter").unwrap(), Js::fragment("c+1"));
        assert_eq!(frame.attribute("counter0").unwrap(), Js::fragment("c"));
        assert_eq!(
            frame.attribute("revcounter").unwrap(),
            Js::fragment("b.length-c")
        );
        assert_eq!(
            frame.attribute("revcounter0").unwrap(),
            Js::fragment("b.length-c-1")
        );
        assert_eq!(frame.attribute("first").unwrap(), Js::fragment("c===0"));
        assert_eq!(
            frame.attribute("last").unwrap(),
            Js::fragment("c===b.length-1")
        );
        assert!(frame.attribute("doesnotexist").is_err());
    }

    #[test]
    fn test_parentloop_chain() {
        let outer = LoopFrame::new("c".into(), "b".into(), None);
        let inner = LoopFrame::new("e".into(), "d".into(), Some(outer.clone()));
        let store = Store::new();
        let mut scope = Scope::new(&store);
        scope.insert("forloop", Binding::Loop(inner));

        let path: Vec<String> = ["forloop", "parentloop", "counter"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(scope.resolve(&path).unwrap(), Js::fragment("c+1"));
    }
}
