//! Molt - template to Javascript translation.
//!
//! Templates are partially evaluated against a [`Store`]: everything that
//! only depends on stored data is folded into literal text, and everything
//! that depends on the declared function arguments becomes Javascript that
//! runs in the browser. The result is a compact function body, or a whole
//! named function via [`TemplateFunction`].
//!
//! ```
//! use molt::{
//!     tree::{Expression, Node},
//!     Engine, Store, Translator,
//! };
//!
//! let engine = Engine::default().with_escape_function("escape");
//! let nodes = vec![
//!     Node::Text("hello ".into()),
//!     Node::Output(Expression::variable("name")),
//! ];
//!
//! let mut translator = Translator::new(&engine, vec!["name"]).unwrap();
//! let body = translator.translate(&Store::new(), &nodes).unwrap();
//! assert_eq!(body, "var a=\"\";a+=\"hello \";a+=escape(b);return a;");
//! ```

mod dateformat;
mod engine;
mod error;
mod filters;
mod function;
mod lorem;
mod names;
mod pipe;
mod render;
mod scope;
mod translate;
mod value;

pub mod filter;
pub mod tree;

pub use engine::Engine;
pub use error::{Error, ErrorKind};
pub use function::TemplateFunction;
pub use render::{render, Renderer};
pub use scope::{Binding, LoopFrame, Scope, Store};
pub use translate::Translator;
pub use value::{concatenate, html_escape, is_js_identifier, Concrete, Js};
