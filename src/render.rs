pub(crate) mod compare;

use crate::{
    dateformat,
    engine::Engine,
    error::{
        error_missing_filter, error_missing_template, error_write, Error, ErrorKind,
        INCOMPATIBLE_TYPES, NOT_SUPPORTED,
    },
    lorem,
    pipe::Pipe,
    scope::{Binding, Scope, Store},
    tree::{Argument, Condition, Expression, ForLoop, Include, Node, Now},
    value::{Concrete, Js},
};

use std::fmt::Write;

use chrono::Local;
use serde_json::{json, Map, Value};

use self::compare::{compare_concrete, contains, is_truthy_concrete};

/// Render a template directly against a [`Store`].
///
/// Provides a shortcut to quickly render a template when no deferred
/// arguments are involved and no custom filters are needed.
///
/// You may also prefer to create an [`Engine`][`crate::Engine`] if you
/// intend to use custom filters in your templates.
///
/// # Examples
///
/// ```
/// use molt::{render, tree::{Expression, Node}, Store};
///
/// let nodes = vec![
///     Node::Text("hello, ".into()),
///     Node::Output(Expression::variable("name")),
///     Node::Text("!".into()),
/// ];
///
/// let output = render(&nodes, &Store::new().with_must("name", "taylor"));
/// assert_eq!(output.unwrap(), "hello, taylor!");
/// ```
pub fn render(nodes: &[Node], store: &Store) -> Result<String, Error> {
    Renderer::new(&Engine::default()).render(store, nodes)
}

/// Renders templates whose data is fully known, without going through
/// Javascript at all.
pub struct Renderer<'engine> {
    /// An engine containing any registered filters and templates.
    engine: &'engine Engine,
}

impl<'engine> Renderer<'engine> {
    /// Create a new Renderer.
    pub fn new(engine: &'engine Engine) -> Self {
        Renderer { engine }
    }

    /// Render the given nodes against the [`Store`].
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if a variable is missing or deferred, a filter
    /// fails, or writing to the buffer fails.
    pub fn render(&self, store: &Store, nodes: &[Node]) -> Result<String, Error> {
        let mut scope = Scope::new(store);
        self.render_with_scope(&mut scope, nodes)
    }

    /// Render the given nodes in an existing [`Scope`].
    ///
    /// Used when a statement folds away because its data turned out to be
    /// concrete while a surrounding translation is running.
    pub(crate) fn render_with_scope(
        &self,
        scope: &mut Scope,
        nodes: &[Node],
    ) -> Result<String, Error> {
        let mut buffer = String::new();
        let mut pipe = Pipe::new(&mut buffer);
        self.render_nodelist(scope, nodes, &mut pipe)?;
        Ok(buffer)
    }

    fn render_nodelist(
        &self,
        scope: &mut Scope,
        nodes: &[Node],
        pipe: &mut Pipe,
    ) -> Result<(), Error> {
        for node in nodes {
            match node {
                Node::Text(text) => pipe.write_str(text).map_err(|_| error_write())?,
                Node::Static(text) => pipe
                    .write_concrete(&Concrete::Value(Value::String(text.clone())))
                    .map_err(|_| error_write())?,
                Node::Output(expression) => {
                    let value = self.evaluate_expression(scope, expression)?;
                    pipe.write_concrete(&value).map_err(|_| error_write())?
                }
                Node::If(branches) => {
                    for branch in branches {
                        let taken = match &branch.condition {
                            Some(condition) => self.evaluate_condition(scope, condition)?,
                            None => true,
                        };
                        if taken {
                            self.render_nodelist(scope, &branch.body, pipe)?;
                            break;
                        }
                    }
                }
                Node::For(forloop) => self.render_for(scope, forloop, pipe)?,
                Node::Include(include) => self.render_include(scope, include, pipe)?,
                Node::FilterBlock(block) => {
                    let mut buffer = String::new();
                    let mut inner = Pipe::new(&mut buffer);
                    self.render_nodelist(scope, &block.body, &mut inner)?;

                    let mut value = Concrete::Safe(buffer);
                    for call in &block.filters {
                        let filter = self
                            .engine
                            .get_filter(&call.name)
                            .ok_or_else(|| error_missing_filter(&call.name))?;
                        let arguments = self.evaluate_arguments(scope, &call.arguments)?;
                        value = filter.apply(&value, &arguments, self.engine)?;
                    }
                    pipe.write_concrete(&value).map_err(|_| error_write())?
                }
                Node::Now(now) => self.render_now(scope, now, pipe)?,
                Node::Lorem(expression) => {
                    let count = self.evaluate_expression(scope, expression)?;
                    let count = match &count {
                        Concrete::Value(Value::Number(number)) => number.as_u64(),
                        _ => None,
                    }
                    .ok_or_else(|| {
                        Error::build(INCOMPATIBLE_TYPES)
                            .with_help("the paragraph count must be a whole number")
                    })?;
                    pipe.write_str(&lorem::paragraphs(count as usize))
                        .map_err(|_| error_write())?
                }
                Node::Comment => {}
                Node::Extension(_) => {
                    return Err(Error::build(NOT_SUPPORTED)
                        .with_kind(ErrorKind::NotSupported)
                        .with_help(
                            "extension directives translate themselves and have no direct \
                            rendering",
                        ))
                }
            }
        }

        Ok(())
    }

    pub(crate) fn render_for(
        &self,
        scope: &mut Scope,
        forloop: &ForLoop,
        pipe: &mut Pipe,
    ) -> Result<(), Error> {
        let sequence = self.evaluate_expression(scope, &forloop.sequence)?;
        let mut items: Vec<Concrete> = match sequence {
            Concrete::Value(Value::Array(array)) => array.into_iter().map(Concrete::Value).collect(),
            Concrete::Value(Value::String(text)) => text
                .chars()
                .map(|c| Concrete::Value(Value::String(c.to_string())))
                .collect(),
            Concrete::Safe(text) => text.chars().map(|c| Concrete::Safe(c.to_string())).collect(),
            other => {
                return Err(Error::build(INCOMPATIBLE_TYPES).with_help(format!(
                    "type `{}` cannot be iterated",
                    other.express()
                )))
            }
        };
        if forloop.reversed {
            items.reverse();
        }
        if items.is_empty() {
            return self.render_nodelist(scope, &forloop.empty, pipe);
        }

        // A concrete loop context nests as plain data, so attribute paths
        // resolve the same way they do on any object.
        let parent = match scope.get("forloop") {
            Some(Binding::Value(Js::Concrete(Concrete::Value(value)))) => Some(value),
            _ => None,
        };

        let length = items.len();
        for (index, item) in items.into_iter().enumerate() {
            scope.push();
            self.bind_loop_variables(scope, forloop, item)?;

            let mut attributes = Map::new();
            attributes.insert("counter".into(), json!(index + 1));
            attributes.insert("counter0".into(), json!(index));
            attributes.insert("revcounter".into(), json!(length - index));
            attributes.insert("revcounter0".into(), json!(length - index - 1));
            attributes.insert("first".into(), json!(index == 0));
            attributes.insert("last".into(), json!(index == length - 1));
            if let Some(parent) = &parent {
                attributes.insert("parentloop".into(), parent.clone());
            }
            scope.insert(
                "forloop",
                Binding::Value(Js::value(Value::Object(attributes))),
            );

            let result = self.render_nodelist(scope, &forloop.body, pipe);
            scope.pop();
            result?;
        }

        Ok(())
    }

    fn bind_loop_variables(
        &self,
        scope: &mut Scope,
        forloop: &ForLoop,
        item: Concrete,
    ) -> Result<(), Error> {
        if let [variable] = forloop.variables.as_slice() {
            scope.insert(variable.clone(), Binding::Value(Js::Concrete(item)));
            return Ok(());
        }
        match item {
            Concrete::Value(Value::Array(parts)) if parts.len() == forloop.variables.len() => {
                for (variable, part) in forloop.variables.iter().zip(parts) {
                    scope.insert(variable.clone(), Binding::Value(Js::value(part)));
                }
                Ok(())
            }
            other => Err(Error::build(INCOMPATIBLE_TYPES).with_help(format!(
                "cannot unpack `{}` into {} names",
                other.express(),
                forloop.variables.len()
            ))),
        }
    }

    fn render_include(
        &self,
        scope: &mut Scope,
        include: &Include,
        pipe: &mut Pipe,
    ) -> Result<(), Error> {
        let name = match self.evaluate_expression(scope, &include.template)? {
            Concrete::Value(Value::String(name)) => name,
            Concrete::Safe(name) => name,
            other => {
                return Err(Error::build(INCOMPATIBLE_TYPES).with_help(format!(
                    "the include target must be a template name, found `{}`",
                    other.express()
                )))
            }
        };
        let nodes = self
            .engine
            .get_template(&name)
            .ok_or_else(|| error_missing_template(&name))?;

        let mut bindings = Vec::with_capacity(include.with.len());
        for (key, argument) in &include.with {
            bindings.push((key.clone(), self.evaluate_argument(scope, argument)?));
        }

        if include.isolated {
            let mut inner = Scope::isolated(scope.store());
            for (key, value) in bindings {
                inner.insert(key, Binding::Value(Js::Concrete(value)));
            }
            self.render_nodelist(&mut inner, nodes, pipe)
        } else {
            scope.push();
            for (key, value) in bindings {
                scope.insert(key, Binding::Value(Js::Concrete(value)));
            }
            let result = self.render_nodelist(scope, nodes, pipe);
            scope.pop();
            result
        }
    }

    fn render_now(&self, scope: &mut Scope, now: &Now, pipe: &mut Pipe) -> Result<(), Error> {
        let format = match self.evaluate_argument(scope, &now.format)? {
            Concrete::Value(Value::String(format)) => format,
            Concrete::Safe(format) => format,
            other => {
                return Err(Error::build(INCOMPATIBLE_TYPES).with_help(format!(
                    "the format must be text, found `{}`",
                    other.express()
                )))
            }
        };
        let format = self.engine.resolve_format(&format)?;
        let text = dateformat::format_datetime(&Local::now().naive_local(), &format)?;
        match &now.as_name {
            Some(name) => {
                scope.insert(name.clone(), Binding::Value(Js::text(text)));
                Ok(())
            }
            None => pipe
                .write_concrete(&Concrete::Value(Value::String(text)))
                .map_err(|_| error_write()),
        }
    }

    /// Evaluate an [`Expression`] to a [`Concrete`] value, applying its
    /// filter chain directly.
    fn evaluate_expression(
        &self,
        scope: &Scope,
        expression: &Expression,
    ) -> Result<Concrete, Error> {
        let mut value = self.evaluate_argument(scope, &expression.base)?;
        for call in &expression.filters {
            let filter = self
                .engine
                .get_filter(&call.name)
                .ok_or_else(|| error_missing_filter(&call.name))?;
            let arguments = self.evaluate_arguments(scope, &call.arguments)?;
            value = filter.apply(&value, &arguments, self.engine)?;
        }
        Ok(value)
    }

    fn evaluate_arguments(
        &self,
        scope: &Scope,
        arguments: &[Argument],
    ) -> Result<Vec<Concrete>, Error> {
        arguments
            .iter()
            .map(|argument| self.evaluate_argument(scope, argument))
            .collect()
    }

    fn evaluate_argument(&self, scope: &Scope, argument: &Argument) -> Result<Concrete, Error> {
        match argument {
            Argument::Literal(value) => Ok(Concrete::Value(value.clone())),
            Argument::Variable(path) => match scope.resolve(path)? {
                Js::Concrete(concrete) => Ok(concrete),
                Js::Fragment { .. } => Err(Error::build(NOT_SUPPORTED)
                    .with_kind(ErrorKind::NotSupported)
                    .with_help(format!(
                        "variable `{}` is deferred to function run time and cannot be \
                        rendered directly",
                        path.join(".")
                    ))),
            },
        }
    }

    fn evaluate_condition(&self, scope: &Scope, condition: &Condition) -> Result<bool, Error> {
        match condition {
            Condition::Expression(expression) => {
                Ok(is_truthy_concrete(&self.evaluate_expression(scope, expression)?))
            }
            Condition::Not(inner) => Ok(!self.evaluate_condition(scope, inner)?),
            Condition::And(left, right) => {
                Ok(self.evaluate_condition(scope, left)? && self.evaluate_condition(scope, right)?)
            }
            Condition::Or(left, right) => {
                Ok(self.evaluate_condition(scope, left)? || self.evaluate_condition(scope, right)?)
            }
            Condition::Compare {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate_operand(scope, left)?;
                let right = self.evaluate_operand(scope, right)?;
                compare_concrete(&left, *operator, &right)
            }
            Condition::In {
                negated,
                member,
                sequence,
            } => {
                let member = self.evaluate_operand(scope, member)?;
                let sequence = self.evaluate_operand(scope, sequence)?;
                Ok(contains(&member, &sequence)? != *negated)
            }
        }
    }

    /// Evaluate a condition used as a comparison operand.
    fn evaluate_operand(&self, scope: &Scope, condition: &Condition) -> Result<Concrete, Error> {
        match condition {
            Condition::Expression(expression) => self.evaluate_expression(scope, expression),
            other => Ok(Concrete::Value(Value::Bool(
                self.evaluate_condition(scope, other)?,
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{render, Renderer};
    use crate::{
        engine::Engine,
        scope::Store,
        tree::{Branch, Condition, Expression, ForLoop, Include, Node, Now, Operator},
    };
    use serde_json::json;

    #[test]
    fn test_render_text() {
        let nodes = vec![Node::Text("hello there".into())];
        assert_eq!(render(&nodes, &Store::new()).unwrap(), "hello there");
    }

    #[test]
    fn test_render_output_escapes() {
        let nodes = vec![Node::Output(Expression::variable("name"))];
        let store = Store::new().with_must("name", "<b>taylor</b>");
        assert_eq!(
            render(&nodes, &store).unwrap(),
            "&lt;b&gt;taylor&lt;/b&gt;"
        );
    }

    #[test]
    fn test_render_output_filtered() {
        let nodes = vec![Node::Output(
            Expression::variable("count").with_filter("add", vec![crate::tree::Argument::literal(json!(2))]),
        )];
        let store = Store::new().with_must("count", 3);
        assert_eq!(render(&nodes, &store).unwrap(), "5");
    }

    #[test]
    fn test_render_if() {
        let nodes = vec![Node::If(vec![
            Branch {
                condition: Some(Condition::Compare {
                    operator: Operator::Greater,
                    left: Box::new(Condition::variable("left")),
                    right: Box::new(Condition::Expression(Expression::literal(json!(300)))),
                }),
                body: vec![Node::Text("a".into())],
            },
            Branch {
                condition: Some(Condition::Not(Box::new(Condition::variable("name")))),
                body: vec![Node::Text("b".into())],
            },
            Branch {
                condition: None,
                body: vec![Node::Text("c".into())],
            },
        ])];
        let store = Store::new().with_must("left", 101).with_must("name", "");
        assert_eq!(render(&nodes, &store).unwrap(), "b");
    }

    #[test]
    fn test_render_for() {
        let nodes = vec![Node::For(ForLoop {
            variables: vec!["item".into()],
            sequence: Expression::variable("items"),
            reversed: false,
            body: vec![
                Node::Output(Expression::variable("forloop.counter")),
                Node::Text(":".into()),
                Node::Output(Expression::variable("item")),
                Node::Text(" ".into()),
            ],
            empty: vec![Node::Text("none".into())],
        })];
        let store = Store::new().with_must("items", json!(["a", "b"]));
        assert_eq!(render(&nodes, &store).unwrap(), "1:a 2:b ");

        let empty = Store::new().with_must("items", json!([]));
        assert_eq!(render(&nodes, &empty).unwrap(), "none");
    }

    #[test]
    fn test_render_for_unpacks() {
        let nodes = vec![Node::For(ForLoop {
            variables: vec!["key".into(), "value".into()],
            sequence: Expression::variable("pairs"),
            reversed: true,
            body: vec![
                Node::Output(Expression::variable("key")),
                Node::Text("=".into()),
                Node::Output(Expression::variable("value")),
                Node::Text(";".into()),
            ],
            empty: vec![],
        })];
        let store = Store::new().with_must("pairs", json!([["a", 1], ["b", 2]]));
        assert_eq!(render(&nodes, &store).unwrap(), "b=2;a=1;");
    }

    #[test]
    fn test_render_include() {
        let engine = Engine::default().with_template_must(
            "greeting",
            vec![
                Node::Text("hi ".into()),
                Node::Output(Expression::variable("name")),
            ],
        );
        let nodes = vec![Node::Include(Include {
            template: Expression::literal(json!("greeting")),
            with: vec![(
                "name".into(),
                crate::tree::Argument::literal(json!("taylor")),
            )],
            isolated: true,
        })];
        let store = Store::new().with_must("name", "someone else");
        let output = Renderer::new(&engine).render(&store, &nodes).unwrap();
        assert_eq!(output, "hi taylor");
    }

    #[test]
    fn test_render_missing_include() {
        let engine = Engine::default();
        let nodes = vec![Node::Include(Include {
            template: Expression::literal(json!("missing")),
            with: vec![],
            isolated: false,
        })];
        assert!(Renderer::new(&engine).render(&Store::new(), &nodes).is_err());
    }

    #[test]
    fn test_render_filter_block() {
        let nodes = vec![Node::FilterBlock(crate::tree::FilterBlock {
            filters: vec![crate::tree::FilterCall::new("length", vec![])],
            body: vec![Node::Text("abcd".into())],
        })];
        assert_eq!(render(&nodes, &Store::new()).unwrap(), "4");
    }

    #[test]
    fn test_render_now_as_name() {
        let nodes = vec![
            Node::Now(Now {
                format: crate::tree::Argument::literal(json!("Y")),
                as_name: Some("year".into()),
            }),
            Node::Output(Expression::variable("year")),
        ];
        let output = render(&nodes, &Store::new()).unwrap();
        assert_eq!(output.len(), 4);
        assert!(output.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_render_deferred_variable_fails() {
        // Rendering has no function arguments, every variable must be
        // in the store.
        let nodes = vec![Node::Output(Expression::variable("missing"))];
        assert!(render(&nodes, &Store::new()).is_err());
    }

    #[test]
    fn test_render_in_condition() {
        let nodes = vec![Node::If(vec![Branch {
            condition: Some(Condition::In {
                negated: false,
                member: Box::new(Condition::variable("needle")),
                sequence: Box::new(Condition::variable("haystack")),
            }),
            body: vec![Node::Text("found".into())],
        }])];
        let store = Store::new()
            .with_must("needle", "am")
            .with_must("haystack", "spam");
        assert_eq!(render(&nodes, &store).unwrap(), "found");
    }
}
