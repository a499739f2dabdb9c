//! The directive tree that translation and rendering walk.
//!
//! The tree is the input interface of the crate. A host parser produces
//! [`Node`] lists; names are already resolved into dotted paths and literal
//! values are already parsed into data.

use crate::{error::Error, scope::Scope, translate::Translator};

use std::fmt::Debug;

use serde_json::Value;

/// The base of an expression, before any filters are applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// A parsed literal value.
    Literal(Value),
    /// A dotted variable path such as `spam.ham`.
    Variable(Vec<String>),
}

impl Argument {
    /// Create a variable [`Argument`] from a dotted path.
    pub fn variable(path: &str) -> Self {
        Argument::Variable(path.split('.').map(|part| part.to_string()).collect())
    }

    /// Create a literal [`Argument`].
    pub fn literal(value: Value) -> Self {
        Argument::Literal(value)
    }
}

/// A single filter application within an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub arguments: Vec<Argument>,
}

impl FilterCall {
    /// Create a new [`FilterCall`].
    pub fn new<S>(name: S, arguments: Vec<Argument>) -> Self
    where
        S: Into<String>,
    {
        FilterCall {
            name: name.into(),
            arguments,
        }
    }
}

/// A base value with a chain of filters.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub base: Argument,
    pub filters: Vec<FilterCall>,
}

impl Expression {
    /// Create an [`Expression`] reading a dotted variable path.
    pub fn variable(path: &str) -> Self {
        Expression {
            base: Argument::variable(path),
            filters: vec![],
        }
    }

    /// Create an [`Expression`] holding a literal value.
    pub fn literal(value: Value) -> Self {
        Expression {
            base: Argument::Literal(value),
            filters: vec![],
        }
    }

    /// Append a filter to the chain.
    ///
    /// Returns the `Expression`, so additional calls may be chained.
    pub fn with_filter<S>(mut self, name: S, arguments: Vec<Argument>) -> Self
    where
        S: Into<String>,
    {
        self.filters.push(FilterCall::new(name, arguments));
        self
    }
}

/// Comparison operators usable inside a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    Greater,
    Lesser,
    GreaterOrEqual,
    LesserOrEqual,
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::Greater => ">",
            Operator::Lesser => "<",
            Operator::GreaterOrEqual => ">=",
            Operator::LesserOrEqual => "<=",
        };
        write!(f, "{text}")
    }
}

/// The condition of an `if` branch.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// A bare expression tested for truthiness.
    Expression(Expression),
    Not(Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Compare {
        operator: Operator,
        left: Box<Condition>,
        right: Box<Condition>,
    },
    /// Membership test, `first in second` or `first not in second`.
    In {
        negated: bool,
        member: Box<Condition>,
        sequence: Box<Condition>,
    },
}

impl Condition {
    /// Create a [`Condition`] testing a variable path for truthiness.
    pub fn variable(path: &str) -> Self {
        Condition::Expression(Expression::variable(path))
    }
}

/// One branch of an `if` directive. A branch without a condition is the
/// `else` arm.
#[derive(Debug)]
pub struct Branch {
    pub condition: Option<Condition>,
    pub body: Vec<Node>,
}

/// A `for` directive.
#[derive(Debug)]
pub struct ForLoop {
    /// Names bound per iteration. More than one name unpacks each item.
    pub variables: Vec<String>,
    pub sequence: Expression,
    pub reversed: bool,
    pub body: Vec<Node>,
    /// Rendered instead of the body when the sequence is empty.
    pub empty: Vec<Node>,
}

/// An `include` directive referencing a template registered in the engine.
#[derive(Debug)]
pub struct Include {
    pub template: Expression,
    /// Extra names bound while translating the included template.
    pub with: Vec<(String, Argument)>,
    /// When set, the included template sees only the `with` values.
    pub isolated: bool,
}

/// A block whose rendered output is run through a filter chain.
#[derive(Debug)]
pub struct FilterBlock {
    pub filters: Vec<FilterCall>,
    pub body: Vec<Node>,
}

/// A `now` directive emitting the current time in the given format.
#[derive(Debug)]
pub struct Now {
    /// The format string, or a variable resolving to one.
    pub format: Argument,
    /// Bind the formatted text to this name instead of writing it.
    pub as_name: Option<String>,
}

/// Allows third-party directives to participate in translation.
pub trait Tag: Debug {
    /// Translate the directive, writing lines through the [`Translator`].
    ///
    /// Indentation must be balanced on return.
    fn translate(&self, translator: &mut Translator, scope: &mut Scope) -> Result<(), Error>;
}

/// A single directive in a template.
#[derive(Debug)]
pub enum Node {
    /// Literal template text, written to the output as is.
    Text(String),
    /// An expression whose value is written to the output.
    Output(Expression),
    If(Vec<Branch>),
    For(ForLoop),
    Include(Include),
    FilterBlock(FilterBlock),
    Now(Now),
    /// Lorem ipsum filler, the expression is the paragraph count.
    Lorem(Expression),
    Comment,
    /// Text produced by a directive that always renders the same way.
    Static(String),
    Extension(Box<dyn Tag>),
}
