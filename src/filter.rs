//! Contains the `Filter` and `FilterTranslator` traits used to extend the
//! engine with new filters.
//!
//! A filter has two halves. The [`Filter`] trait is the direct
//! implementation, executed while the Javascript function is being built
//! whenever the input and every argument are concrete, so the result is
//! folded into literal output. The [`FilterTranslator`] trait produces a
//! Javascript expression instead, and is consulted when the input or an
//! argument is deferred to function run time.
//!
//! Both halves are registered on an [`Engine`][`crate::Engine`] under the
//! filter's template name. A plain function matching the trait signature is
//! accepted in place of a struct.
//!
//! # Examples
//!
//! Registering a filter that doubles a number, with a matching translation:
//!
//! ```
//! use molt::{
//!     filter::{
//!         serde::{json, Value},
//!         FilterOutput,
//!     },
//!     Concrete, Engine, Error, Js,
//! };
//!
//! fn double(value: &Concrete, _: &[Concrete], _: &Engine) -> Result<Concrete, Error> {
//!     match value {
//!         Concrete::Value(Value::Number(n)) => {
//!             Ok(Concrete::Value(json!(n.as_f64().unwrap() * 2.0)))
//!         }
//!         _ => Err(Error::build("filter `double` requires number input")),
//!     }
//! }
//!
//! fn translate_double(_: &Engine, value: &Js, _: &[Js]) -> Result<FilterOutput, Error> {
//!     Ok(FilterOutput::One(Js::fragment(format!(
//!         "({})*2",
//!         value.express()
//!     ))))
//! }
//!
//! let engine = Engine::default()
//!     .with_filter_must("double", double)
//!     .with_filter_translator_must("double", translate_double);
//! ```

pub mod serde {
    //! Contains types from `serde_json`.
    pub use serde_json::*;
}

use crate::{
    engine::Engine,
    error::Error,
    value::{Concrete, Js},
};

/// What a filter translation produced.
pub enum FilterOutput {
    /// A single value.
    One(Js),
    /// Parts to be concatenated, literal runs collapsing at translation
    /// time.
    Parts(Vec<Js>),
}

/// Describes a type which can transform a concrete input value.
pub trait Filter: Sync + Send {
    /// Execute the filter with the given input and return a new value.
    fn apply(
        &self,
        value: &Concrete,
        arguments: &[Concrete],
        engine: &Engine,
    ) -> Result<Concrete, Error>;

    /// Translate the filter into a Javascript expression.
    ///
    /// Returning `None`, the default, means the filter cannot run on
    /// deferred input unless a [`FilterTranslator`] is registered for it.
    fn translate(
        &self,
        _engine: &Engine,
        _value: &Js,
        _arguments: &[Js],
    ) -> Option<Result<FilterOutput, Error>> {
        None
    }
}

/// Allows assignment of any function matching the signature of `apply` as
/// a `Filter` to `Engine`, instead of requiring a struct be created.
impl<F> Filter for F
where
    F: Fn(&Concrete, &[Concrete], &Engine) -> Result<Concrete, Error> + Sync + Send,
{
    fn apply(
        &self,
        value: &Concrete,
        arguments: &[Concrete],
        engine: &Engine,
    ) -> Result<Concrete, Error> {
        self(value, arguments, engine)
    }
}

/// Describes a type which can compile a filter application into Javascript.
pub trait FilterTranslator: Sync + Send {
    /// Build the Javascript for applying the filter to the given value.
    fn translate(&self, engine: &Engine, value: &Js, arguments: &[Js])
        -> Result<FilterOutput, Error>;
}

/// Allows assignment of any function matching the signature of `translate`
/// as a `FilterTranslator` to `Engine`.
impl<F> FilterTranslator for F
where
    F: Fn(&Engine, &Js, &[Js]) -> Result<FilterOutput, Error> + Sync + Send,
{
    fn translate(
        &self,
        engine: &Engine,
        value: &Js,
        arguments: &[Js],
    ) -> Result<FilterOutput, Error> {
        self(engine, value, arguments)
    }
}
