use crate::{
    engine::Engine,
    error::Error,
    scope::Store,
    translate::Translator,
    tree::Node,
    value::is_js_identifier,
};

/// A template translated into a named Javascript function.
///
/// The function takes one parameter per deferred argument, in the order
/// the arguments were given, and returns the rendered text.
///
/// # Examples
///
/// ```
/// use molt::{
///     tree::{Expression, Node},
///     Engine, Store, TemplateFunction,
/// };
///
/// let engine = Engine::default().with_escape_function("escape");
/// let nodes = vec![
///     Node::Text("hello ".into()),
///     Node::Output(Expression::variable("name")),
/// ];
///
/// let function = TemplateFunction::new(
///     &engine,
///     "greet",
///     vec!["name".into()],
///     &Store::new(),
///     &nodes,
/// )
/// .unwrap();
/// assert_eq!(
///     function.function_source(),
///     "function greet(b){var a=\"\";a+=\"hello \";a+=escape(b);return a;}"
/// );
/// ```
pub struct TemplateFunction {
    name: String,
    /// Generated parameter names, one per deferred argument.
    parameters: Vec<String>,
    body: String,
}

impl TemplateFunction {
    /// Translate the given nodes into a function with the given name.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the name or an argument is not a valid
    /// Javascript identifier, or when translation fails.
    pub fn new<S>(
        engine: &Engine,
        name: S,
        arguments: Vec<String>,
        store: &Store,
        nodes: &[Node],
    ) -> Result<Self, Error>
    where
        S: Into<String>,
    {
        let name = name.into();
        if !is_js_identifier(&name) {
            return Err(Error::build("invalid function name")
                .with_help(format!("`{name}` is not a valid Javascript identifier")));
        }
        for argument in &arguments {
            if !is_js_identifier(argument) {
                return Err(Error::build("invalid function argument").with_help(format!(
                    "`{argument}` is not a valid Javascript identifier"
                )));
            }
        }

        let mut translator = Translator::new(engine, arguments)?;
        let body = translator.translate(store, nodes)?;
        let parameters = translator.argument_names().to_vec();

        Ok(TemplateFunction {
            name,
            parameters,
            body,
        })
    }

    /// Return the function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the generated parameter names, in argument order.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Return the translated function body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Return the Javascript source of the function.
    pub fn function_source(&self) -> String {
        format!(
            "function {}({}){{{}}}",
            self.name,
            self.parameters.join(","),
            self.body
        )
    }

    /// Return the function wrapped in a `<script>` element, ready to be
    /// spliced into a page.
    pub fn script(&self) -> String {
        format!("<script>{}</script>", self.function_source())
    }
}

#[cfg(test)]
mod tests {
    use super::TemplateFunction;
    use crate::{
        engine::Engine,
        scope::Store,
        tree::{Expression, Node},
    };

    fn engine() -> Engine {
        Engine::default().with_escape_function("escape")
    }

    #[test]
    fn test_function_source() {
        let engine = engine();
        let nodes = vec![
            Node::Output(Expression::variable("x")),
            Node::Text("/".into()),
            Node::Output(Expression::variable("y")),
        ];
        let function = TemplateFunction::new(
            &engine,
            "pair",
            vec!["x".into(), "y".into()],
            &Store::new(),
            &nodes,
        )
        .unwrap();

        assert_eq!(function.name(), "pair");
        assert_eq!(function.parameters(), ["b", "c"]);
        assert_eq!(
            function.function_source(),
            "function pair(b,c){var a=\"\";a+=escape(b);a+=\"/\";a+=escape(c);return a;}"
        );
        assert_eq!(
            function.script(),
            format!("<script>{}</script>", function.function_source())
        );
    }

    #[test]
    fn test_invalid_names() {
        let engine = engine();
        let nodes: Vec<Node> = vec![];
        assert!(
            TemplateFunction::new(&engine, "2bad", vec![], &Store::new(), &nodes).is_err()
        );
        assert!(TemplateFunction::new(
            &engine,
            "fine",
            vec!["not valid".into()],
            &Store::new(),
            &nodes
        )
        .is_err());
    }
}
