//! Translation of the block directives.
//!
//! Every function here emits statements through the [`Translator`] and
//! must leave the indentation level the way it found it.

use crate::{
    dateformat,
    error::{error_missing_template, Error, ErrorKind, INCOMPATIBLE_TYPES, NOT_SUPPORTED},
    lorem,
    pipe::Pipe,
    render::{compare::is_truthy_concrete, Renderer},
    scope::{Binding, LoopFrame, Scope},
    tree::{Branch, Expression, FilterBlock, ForLoop, Include, Node, Now},
    value::{Concrete, Js},
};

use std::mem;

use serde_json::Value;

use super::Translator;

/// Translate an `if` directive.
///
/// Branches whose condition is concrete and falsy fall out. A branch
/// whose condition is concrete and truthy is certain to run, so it
/// becomes the final `else` arm and later branches are dropped. When
/// nothing survives, nothing is emitted, and a single surviving arm is
/// inlined without any `if` at all.
pub(super) fn translate_if(
    translator: &mut Translator,
    scope: &mut Scope,
    branches: &[Branch],
) -> Result<(), Error> {
    let mut kept: Vec<(Option<Js>, &[Node])> = Vec::new();
    for branch in branches {
        match &branch.condition {
            Some(condition) => match translator.resolve_condition(scope, condition)? {
                Js::Concrete(concrete) => {
                    if is_truthy_concrete(&concrete) {
                        kept.push((None, &branch.body));
                        break;
                    }
                }
                fragment => kept.push((Some(fragment), &branch.body)),
            },
            None => kept.push((None, &branch.body)),
        }
    }

    if kept.is_empty() {
        return Ok(());
    }
    if let [(None, body)] = kept.as_slice() {
        return translator.translate_nodelist(scope, body);
    }

    for (n, (condition, body)) in kept.iter().enumerate() {
        match condition {
            Some(condition) if n == 0 => {
                translator.line(format!("if({}){{", condition.express()))
            }
            Some(condition) => translator.line(format!("else if({}){{", condition.express())),
            None => translator.line("else{"),
        }
        translator.indent();
        translator.translate_nodelist(scope, body)?;
        translator.dedent()?;
        translator.line("}");
    }

    Ok(())
}

/// Translate a `for` directive.
///
/// A concrete sequence folds the whole loop into its rendered output.
/// A deferred sequence becomes a counted Javascript loop, with the loop
/// variables assigned from the sequence per iteration and the loop
/// context bound for the body.
pub(super) fn translate_for(
    translator: &mut Translator,
    scope: &mut Scope,
    node: &ForLoop,
) -> Result<(), Error> {
    let sequence = translator.resolve_expression(scope, &node.sequence)?;
    if !sequence.is_fragment() {
        let mut buffer = String::new();
        let mut pipe = Pipe::new(&mut buffer);
        Renderer::new(translator.engine()).render_for(scope, node, &mut pipe)?;
        translator.write(Js::Concrete(Concrete::Safe(buffer)));
        return Ok(());
    }

    // Complex sequence expressions are stored once and reused.
    let sequence = if node.sequence.filters.is_empty() {
        sequence
    } else {
        let name = translator.fresh_name()?;
        translator.assign(&name, &sequence);
        Js::fragment(name)
    };
    let sequence_text = sequence.express();

    if !node.empty.is_empty() {
        translator.line(format!("if({sequence_text}.length==0){{"));
        translator.indent();
        translator.translate_nodelist(scope, &node.empty)?;
        translator.dedent()?;
        translator.line("}else{");
        translator.indent();
    }

    let counter = translator.fresh_name()?;
    if node.reversed {
        translator.line(format!(
            "for(var {counter}={sequence_text}.length-1;{counter}>=0;{counter}--){{"
        ));
    } else {
        translator.line(format!(
            "for(var {counter}=0;{counter}<{sequence_text}.length;{counter}++){{"
        ));
    }
    translator.indent();

    scope.push();
    if let [variable] = node.variables.as_slice() {
        let name = translator.fresh_name()?;
        translator.assign(&name, &Js::fragment(format!("{sequence_text}[{counter}]")));
        scope.insert(variable.clone(), Binding::Value(Js::fragment(name)));
    } else {
        for (index, variable) in node.variables.iter().enumerate() {
            let name = translator.fresh_name()?;
            translator.assign(
                &name,
                &Js::fragment(format!("{sequence_text}[{counter}][{index}]")),
            );
            scope.insert(variable.clone(), Binding::Value(Js::fragment(name)));
        }
    }

    let parent = match scope.get("forloop") {
        Some(Binding::Loop(frame)) => Some(frame),
        _ => None,
    };
    scope.insert(
        "forloop",
        Binding::Loop(LoopFrame::new(counter, sequence_text, parent)),
    );

    let body = translator.translate_nodelist(scope, &node.body);
    scope.pop();
    body?;

    translator.dedent()?;
    translator.line("}");
    if !node.empty.is_empty() {
        translator.dedent()?;
        translator.line("}");
    }

    Ok(())
}

/// Translate an `include` directive by splicing the named template in,
/// translated against the bindings the directive provides.
pub(super) fn translate_include(
    translator: &mut Translator,
    scope: &mut Scope,
    node: &Include,
) -> Result<(), Error> {
    let name = match translator.resolve_expression(scope, &node.template)? {
        Js::Concrete(Concrete::Value(Value::String(name))) => name,
        Js::Concrete(Concrete::Safe(name)) => name,
        Js::Fragment { .. } => {
            return Err(Error::build(NOT_SUPPORTED)
                .with_kind(ErrorKind::NotSupported)
                .with_help(
                    "include directives with variable targets cannot be translated",
                ))
        }
        other => {
            return Err(Error::build(INCOMPATIBLE_TYPES).with_help(format!(
                "the include target must be a template name, found `{}`",
                other.express()
            )))
        }
    };
    let nodes = translator
        .engine()
        .get_template(&name)
        .ok_or_else(|| error_missing_template(&name))?;

    let mut bindings = Vec::with_capacity(node.with.len());
    for (key, argument) in &node.with {
        bindings.push((key.clone(), translator.resolve_argument(scope, argument)?));
    }

    if node.isolated {
        let mut inner = Scope::isolated(scope.store());
        for (key, value) in bindings {
            inner.insert(key, Binding::Value(value));
        }
        translator.translate_nodelist(&mut inner, nodes)
    } else {
        scope.push();
        for (key, value) in bindings {
            scope.insert(key, Binding::Value(value));
        }
        let result = translator.translate_nodelist(scope, nodes);
        scope.pop();
        result
    }
}

/// Translate a `filter` block directive.
///
/// The body writes into a fresh variable, and the captured output runs
/// through the filter chain as a deferred value.
pub(super) fn translate_filter_block(
    translator: &mut Translator,
    scope: &mut Scope,
    node: &FilterBlock,
) -> Result<(), Error> {
    let temp = translator.fresh_name()?;
    translator.assign(&temp, &Js::text(""));

    let previous = mem::replace(&mut translator.result, temp.clone());
    let body = translator.translate_nodelist(scope, &node.body);
    translator.result = previous;
    body?;

    let mut value = Js::fragment(temp);
    for call in &node.filters {
        value = translator.translate_filter(scope, value, call)?;
    }
    translator.write(value);

    Ok(())
}

/// Translate a `now` directive.
///
/// The current time is only known when the generated function runs, so
/// a `Date` is constructed and the format characters are emitted one by
/// one, the way the `date` filter translates them.
pub(super) fn translate_now(
    translator: &mut Translator,
    scope: &mut Scope,
    node: &Now,
) -> Result<(), Error> {
    if let Some(as_name) = &node.as_name {
        let temp = translator.fresh_name()?;
        translator.line(format!("var {temp} = \"\";"));

        let inner = Now {
            format: node.format.clone(),
            as_name: None,
        };
        let previous = mem::replace(&mut translator.result, temp.clone());
        let result = translate_now(translator, scope, &inner);
        translator.result = previous;
        result?;

        scope.insert(as_name.clone(), Binding::Value(Js::fragment(temp)));
        return Ok(());
    }

    let format = match translator.resolve_argument(scope, &node.format)? {
        Js::Concrete(Concrete::Value(Value::String(format))) => format,
        Js::Concrete(Concrete::Safe(format)) => format,
        Js::Fragment { .. } => {
            return Err(Error::build(NOT_SUPPORTED)
                .with_kind(ErrorKind::NotSupported)
                .with_help(
                    "now directives with variable format strings cannot be translated",
                ))
        }
        other => {
            return Err(Error::build(INCOMPATIBLE_TYPES).with_help(format!(
                "the format must be text, found `{}`",
                other.express()
            )))
        }
    };
    let format = translator.engine().resolve_format(&format)?;

    let name = translator.fresh_name()?;
    translator.assign(&name, &Js::fragment("new Date()"));

    let mut characters = format.chars();
    while let Some(character) = characters.next() {
        if character == '\\' {
            if let Some(escaped) = characters.next() {
                translator.write(Js::text(escaped.to_string()));
            }
            continue;
        }
        match dateformat::javascript_expression(character)? {
            Some(template) => {
                translator.write(Js::safe_fragment(template.replace("{x}", &name)))
            }
            None => translator.write(Js::text(character.to_string())),
        }
    }

    Ok(())
}

/// Translate a `lorem` directive. The paragraph count must be concrete,
/// the filler text is folded into the output.
pub(super) fn translate_lorem(
    translator: &mut Translator,
    scope: &mut Scope,
    expression: &Expression,
) -> Result<(), Error> {
    let count = match translator.resolve_expression(scope, expression)? {
        Js::Fragment { .. } => {
            return Err(Error::build(NOT_SUPPORTED)
                .with_kind(ErrorKind::NotSupported)
                .with_help("lorem directives with variable counts cannot be translated"))
        }
        Js::Concrete(Concrete::Value(Value::Number(number))) => {
            number.as_u64().ok_or_else(|| {
                Error::build(INCOMPATIBLE_TYPES)
                    .with_help("the paragraph count must be a whole number")
            })?
        }
        _ => {
            return Err(Error::build(INCOMPATIBLE_TYPES)
                .with_help("the paragraph count must be a whole number"))
        }
    };
    translator.write(Js::text(lorem::paragraphs(count as usize)));

    Ok(())
}
