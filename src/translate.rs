mod tags;

use crate::{
    engine::Engine,
    error::{error_missing_filter, Error, ErrorKind, UNSUPPORTED_CONSTRUCT},
    filter::FilterOutput,
    names::NameGenerator,
    render::compare::{compare_concrete, contains, is_truthy_concrete},
    scope::{Binding, Scope, Store},
    tree::{Argument, Condition, Expression, FilterCall, Node, Operator},
    value::{concatenate, html_escape, Concrete, Js},
};

use serde_json::Value;

/// Javascript source of a comparison, mirroring how the direct renderer
/// compares values. Equality is strict, inequality deliberately is not.
fn operator_expression(operator: Operator) -> &'static str {
    match operator {
        Operator::Equal => "===",
        Operator::NotEqual => "!=",
        Operator::Greater => ">",
        Operator::Lesser => "<",
        Operator::GreaterOrEqual => ">=",
        Operator::LesserOrEqual => "<=",
    }
}

/// Translates templates into Javascript function bodies.
///
/// The named arguments are deferred: they become parameters of the
/// generated function and shadow anything in the [`Store`]. Every other
/// variable must be present in the store, and everything that only
/// depends on the store is folded into literal output.
///
/// # Examples
///
/// ```
/// use molt::{
///     tree::{Expression, Node},
///     Engine, Store, Translator,
/// };
///
/// let engine = Engine::default().with_escape_function("escape");
/// let nodes = vec![
///     Node::Text("hello ".into()),
///     Node::Output(Expression::variable("name")),
/// ];
///
/// let mut translator = Translator::new(&engine, vec!["name"]).unwrap();
/// let body = translator.translate(&Store::new(), &nodes).unwrap();
/// assert_eq!(body, "var a=\"\";a+=\"hello \";a+=escape(b);return a;");
/// ```
pub struct Translator<'engine> {
    engine: &'engine Engine,
    names: NameGenerator,
    /// The variable output is appended to. Temporarily swapped out by
    /// directives that capture their output.
    result: String,
    /// Template-side names of the deferred arguments.
    arguments: Vec<String>,
    /// Generated parameter names, one per argument, in order.
    argument_names: Vec<String>,
    joiner: String,
    indentation: String,
    level: usize,
    lines: Vec<String>,
}

impl<'engine> Translator<'engine> {
    /// Create a new Translator over the given deferred argument names.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when allocating names for the arguments
    /// exhausts the generator.
    pub fn new<S>(engine: &'engine Engine, arguments: Vec<S>) -> Result<Self, Error>
    where
        S: Into<String>,
    {
        let arguments: Vec<String> = arguments.into_iter().map(Into::into).collect();
        let mut names = NameGenerator::new(engine.escape_function());
        let result = names.next_name()?;
        let argument_names = arguments
            .iter()
            .map(|_| names.next_name())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Translator {
            engine,
            names,
            result,
            arguments,
            argument_names,
            joiner: String::new(),
            indentation: String::new(),
            level: 0,
            lines: Vec::new(),
        })
    }

    /// Emit readable Javascript, with one statement per line and nested
    /// blocks indented.
    ///
    /// Returns the `Translator`, so additional methods may be chained.
    pub fn with_debug(self) -> Self {
        self.with_joiner("\n").with_indentation("  ")
    }

    /// Set the text joining emitted statements.
    ///
    /// Returns the `Translator`, so additional methods may be chained.
    pub fn with_joiner<S>(mut self, joiner: S) -> Self
    where
        S: Into<String>,
    {
        self.joiner = joiner.into();
        self
    }

    /// Set the text repeated per nesting level in front of statements.
    ///
    /// Returns the `Translator`, so additional methods may be chained.
    pub fn with_indentation<S>(mut self, indentation: S) -> Self
    where
        S: Into<String>,
    {
        self.indentation = indentation.into();
        self
    }

    /// Return the [`Engine`] translation runs against.
    pub fn engine(&self) -> &'engine Engine {
        self.engine
    }

    /// Return the generated parameter names, in argument order.
    ///
    /// The generated function must be called with its arguments in this
    /// order.
    pub fn argument_names(&self) -> &[String] {
        &self.argument_names
    }

    /// Translate the given nodes into a Javascript function body.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a variable is unresolved, a construct
    /// has no translation, or a directive leaves the indentation
    /// unbalanced.
    pub fn translate(&mut self, store: &Store, nodes: &[Node]) -> Result<String, Error> {
        let mut scope = Scope::new(store);
        for (argument, name) in self.arguments.iter().zip(&self.argument_names) {
            scope.insert(argument.clone(), Binding::Value(Js::fragment(name.clone())));
        }

        self.lines.clear();
        self.level = 0;
        let result = self.result.clone();
        self.line(format!("var {result}=\"\";"));
        self.translate_nodelist(&mut scope, nodes)?;
        self.line(format!("return {result};"));

        Ok(self.lines.join(&self.joiner))
    }

    /// Emit one statement at the current indentation level.
    ///
    /// Empty text is dropped.
    pub fn line<T>(&mut self, text: T)
    where
        T: Into<String>,
    {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        let indented = format!("{}{}", self.indentation.repeat(self.level), text);
        self.lines.push(indented);
    }

    /// Emit a statement appending the value to the function output.
    ///
    /// The value is escaped unless it is already safe. Concrete empty
    /// text is dropped.
    pub fn write(&mut self, value: Js) {
        let escaper = self.engine.escape_function();
        let appended = match value.escape(escaper) {
            Js::Fragment { text, .. } => text,
            Js::Concrete(Concrete::Safe(text)) => {
                if text.is_empty() {
                    return;
                }
                Value::String(text).to_string()
            }
            Js::Concrete(Concrete::Value(Value::String(text))) => {
                if text.is_empty() {
                    return;
                }
                Value::String(text).to_string()
            }
            Js::Concrete(Concrete::DateTime(datetime)) => {
                Value::String(datetime.to_string()).to_string()
            }
            Js::Concrete(Concrete::Value(other)) => {
                format!("\"{}\"", html_escape(&other.to_string()))
            }
        };
        let result = self.result.clone();
        self.line(format!("{result}+={appended};"));
    }

    /// Emit a statement declaring a variable with the given value.
    pub fn assign(&mut self, name: &str, value: &Js) {
        self.line(format!("var {name}={};", value.express()));
    }

    /// Obtain a new unique Javascript variable name.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the generator is exhausted.
    pub fn fresh_name(&mut self) -> Result<String, Error> {
        self.names.next_name()
    }

    /// Increase the indentation by one level.
    ///
    /// Directives must restore the level before returning, pair every
    /// call with [`dedent`][`Translator::dedent`].
    pub fn indent(&mut self) {
        self.level += 1;
    }

    /// Decrease the indentation by one level.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the level is already zero.
    pub fn dedent(&mut self) -> Result<(), Error> {
        if self.level == 0 {
            return Err(Error::build("indentation invariant violation")
                .with_kind(ErrorKind::IndentationInvariantViolation)
                .with_help("too many dedents"));
        }
        self.level -= 1;
        Ok(())
    }

    /// Translate a list of nodes, emitting their statements.
    ///
    /// Can be used by directive implementations to translate their
    /// bodies.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when translating a node fails, or a node
    /// leaves the indentation at a different level than it found it.
    pub fn translate_nodelist(&mut self, scope: &mut Scope, nodes: &[Node]) -> Result<(), Error> {
        for node in nodes {
            let before = self.level;
            self.translate_node(scope, node)?;
            let after = self.level;
            if before != after {
                return Err(Error::build("indentation invariant violation")
                    .with_kind(ErrorKind::IndentationInvariantViolation)
                    .with_help(format!(
                        "indentation level not restored by {node:?}, \
                        going from {before} to {after}"
                    )));
            }
        }
        Ok(())
    }

    fn translate_node(&mut self, scope: &mut Scope, node: &Node) -> Result<(), Error> {
        match node {
            Node::Text(text) => {
                self.write(Js::Concrete(Concrete::Safe(text.clone())));
                Ok(())
            }
            Node::Static(text) => {
                self.write(Js::text(text.clone()));
                Ok(())
            }
            Node::Output(expression) => {
                let value = self.resolve_expression(scope, expression)?;
                self.write(value);
                Ok(())
            }
            Node::If(branches) => tags::translate_if(self, scope, branches),
            Node::For(forloop) => tags::translate_for(self, scope, forloop),
            Node::Include(include) => tags::translate_include(self, scope, include),
            Node::FilterBlock(block) => tags::translate_filter_block(self, scope, block),
            Node::Now(now) => tags::translate_now(self, scope, now),
            Node::Lorem(expression) => tags::translate_lorem(self, scope, expression),
            Node::Comment => Ok(()),
            Node::Extension(tag) => tag.translate(self, scope),
        }
    }

    /// Resolve an [`Expression`] into a value, applying its filter chain.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a variable is unresolved or a filter
    /// cannot run.
    pub fn resolve_expression(
        &self,
        scope: &Scope,
        expression: &Expression,
    ) -> Result<Js, Error> {
        let mut value = self.resolve_argument(scope, &expression.base)?;
        for call in &expression.filters {
            value = self.translate_filter(scope, value, call)?;
        }
        Ok(value)
    }

    /// Resolve an [`Argument`] into a value.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a variable path does not resolve.
    pub fn resolve_argument(&self, scope: &Scope, argument: &Argument) -> Result<Js, Error> {
        match argument {
            Argument::Literal(value) => Ok(Js::value(value.clone())),
            Argument::Variable(path) => scope.resolve(path),
        }
    }

    /// Apply one filter to a value.
    ///
    /// With everything concrete the filter runs directly and its result
    /// is folded in. Otherwise the filter's translation produces a
    /// Javascript expression.
    fn translate_filter(&self, scope: &Scope, value: Js, call: &FilterCall) -> Result<Js, Error> {
        let arguments = call
            .arguments
            .iter()
            .map(|argument| self.resolve_argument(scope, argument))
            .collect::<Result<Vec<_>, _>>()?;

        if !value.is_fragment() && arguments.iter().all(|a| !a.is_fragment()) {
            let filter = self
                .engine
                .get_filter(&call.name)
                .ok_or_else(|| error_missing_filter(&call.name))?;
            let concrete_value = match &value {
                Js::Concrete(concrete) => concrete,
                Js::Fragment { .. } => unreachable!(),
            };
            let concrete_arguments: Vec<Concrete> = arguments
                .iter()
                .map(|a| match a {
                    Js::Concrete(concrete) => concrete.clone(),
                    Js::Fragment { .. } => unreachable!(),
                })
                .collect();
            let result = filter.apply(concrete_value, &concrete_arguments, self.engine)?;
            return Ok(Js::Concrete(result));
        }

        let output = if let Some(translator) = self.engine.get_filter_translator(&call.name) {
            translator.translate(self.engine, &value, &arguments)?
        } else if let Some(filter) = self.engine.get_filter(&call.name) {
            match filter.translate(self.engine, &value, &arguments) {
                Some(result) => result?,
                None => {
                    return Err(Error::build(UNSUPPORTED_CONSTRUCT)
                        .with_kind(ErrorKind::UnsupportedConstruct)
                        .with_help(format!(
                            "filter `{}` has no Javascript translation",
                            call.name
                        )))
                }
            }
        } else {
            return Err(error_missing_filter(&call.name));
        };

        Ok(match output {
            FilterOutput::One(js) => js,
            FilterOutput::Parts(parts) => concatenate(self.engine.escape_function(), parts),
        })
    }

    /// Resolve a [`Condition`] into a value.
    ///
    /// Concrete subconditions are decided immediately, and the decision
    /// short-circuits the way the direct renderer would. Anything
    /// touching a deferred value degrades into a boolean Javascript
    /// expression.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a variable is unresolved or concrete
    /// operands cannot be compared.
    pub fn resolve_condition(&self, scope: &Scope, condition: &Condition) -> Result<Js, Error> {
        match condition {
            Condition::Expression(expression) => self.resolve_expression(scope, expression),
            Condition::Not(inner) => {
                let first = self.resolve_condition(scope, inner)?;
                Ok(match first {
                    Js::Fragment { .. } => Js::fragment(format!("!({})", first.express())),
                    Js::Concrete(concrete) => {
                        Js::value(Value::Bool(!is_truthy_concrete(&concrete)))
                    }
                })
            }
            Condition::And(left, right) => {
                let first = self.resolve_condition(scope, left)?;
                let second = self.resolve_condition(scope, right)?;
                Ok(match (&first, &second) {
                    (Js::Fragment { .. }, Js::Fragment { .. }) => {
                        Js::fragment(format!("{}&&{}", first.express(), second.express()))
                    }
                    (Js::Fragment { .. }, Js::Concrete(concrete)) => {
                        if is_truthy_concrete(concrete) {
                            first
                        } else {
                            Js::value(Value::Bool(false))
                        }
                    }
                    (Js::Concrete(concrete), Js::Fragment { .. }) => {
                        if is_truthy_concrete(concrete) {
                            second
                        } else {
                            Js::value(Value::Bool(false))
                        }
                    }
                    (Js::Concrete(concrete), Js::Concrete(_)) => {
                        if is_truthy_concrete(concrete) {
                            second
                        } else {
                            first
                        }
                    }
                })
            }
            Condition::Or(left, right) => {
                let first = self.resolve_condition(scope, left)?;
                let second = self.resolve_condition(scope, right)?;
                Ok(match (&first, &second) {
                    (Js::Fragment { .. }, Js::Fragment { .. }) => {
                        Js::fragment(format!("{}||{}", first.express(), second.express()))
                    }
                    (Js::Fragment { .. }, Js::Concrete(concrete)) => {
                        if is_truthy_concrete(concrete) {
                            Js::value(Value::Bool(true))
                        } else {
                            first
                        }
                    }
                    (Js::Concrete(concrete), Js::Fragment { .. }) => {
                        if is_truthy_concrete(concrete) {
                            Js::value(Value::Bool(true))
                        } else {
                            second
                        }
                    }
                    (Js::Concrete(concrete), Js::Concrete(_)) => {
                        if is_truthy_concrete(concrete) {
                            first
                        } else {
                            second
                        }
                    }
                })
            }
            Condition::Compare {
                operator,
                left,
                right,
            } => {
                let first = self.resolve_condition(scope, left)?;
                let second = self.resolve_condition(scope, right)?;
                match (&first, &second) {
                    (Js::Concrete(left), Js::Concrete(right)) => {
                        let result = compare_concrete(left, *operator, right)?;
                        Ok(Js::value(Value::Bool(result)))
                    }
                    _ => Ok(Js::fragment(format!(
                        "{}{}{}",
                        first.express(),
                        operator_expression(*operator),
                        second.express()
                    ))),
                }
            }
            Condition::In {
                negated,
                member,
                sequence,
            } => {
                let member = self.resolve_condition(scope, member)?;
                let sequence = self.resolve_condition(scope, sequence)?;
                match (&member, &sequence) {
                    (Js::Concrete(member), Js::Concrete(sequence)) => {
                        let result = contains(member, sequence)? != *negated;
                        Ok(Js::value(Value::Bool(result)))
                    }
                    _ => Ok(Js::fragment(format!(
                        "({}).indexOf({}){}-1",
                        sequence.express(),
                        member.express(),
                        if *negated { "==" } else { "!=" }
                    ))),
                }
            }
        }
    }
}
