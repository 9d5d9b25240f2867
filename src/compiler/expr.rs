//! Parsers for the small expression forms directives accept.
//!
//! - `{{ expr }}` inside text
//! - `{key: value, other: value}` object literals (`v-bind`, `v-on`, class/style)
//! - `handler(arg, $event, 'x')` calls
//! - `alias in source` loops

use crate::types::Value;

/// One parsed handler argument.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Arg {
    /// `$event`
    Event,
    /// `$index`, read when the handler runs
    Index,
    Value(Value),
}

/// Split text around its first `open expr close` block. The expression must
/// not be blank.
pub(crate) fn split_interpolation<'a>(
    text: &'a str,
    open: &str,
    close: &str,
) -> Option<(&'a str, &'a str, &'a str)> {
    let start = text.find(open)?;
    let inner_start = start + open.len();
    let end = inner_start + text[inner_start..].find(close)?;
    let expression = text[inner_start..end].trim();
    if expression.is_empty() {
        return None;
    }
    Some((&text[..start], expression, &text[end + close.len()..]))
}

/// Split on commas that are not nested in brackets or quotes.
fn split_top_level(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

fn unquote(text: &str) -> &str {
    let text = text.trim();
    for q in ['\'', '"'] {
        if let Some(inner) = text.strip_prefix(q).and_then(|t| t.strip_suffix(q)) {
            return inner;
        }
    }
    text
}

/// `{a: b, 'c-d': e}` -> `[("a", "b"), ("c-d", "e")]`. `None` when the input
/// is not an object literal or an entry has no `:`.
pub(crate) fn parse_object(expression: &str) -> Option<Vec<(String, String)>> {
    let inner = expression
        .trim()
        .strip_prefix('{')?
        .strip_suffix('}')?;

    split_top_level(inner)
        .into_iter()
        .map(|entry| {
            let (key, value) = entry.split_once(':')?;
            let key = unquote(key);
            let value = value.trim();
            if key.is_empty() || value.is_empty() {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// `name` or `name(a, b)`. The argument list is `None` without parentheses.
pub(crate) fn parse_call(expression: &str) -> Option<(String, Option<Vec<String>>)> {
    let expression = expression.trim();
    let Some(open) = expression.find('(') else {
        return is_name(expression).then(|| (expression.to_string(), None));
    };

    let name = expression[..open].trim();
    let args = expression[open + 1..].strip_suffix(')')?;
    if !is_name(name) {
        return None;
    }
    let args = split_top_level(args).into_iter().map(str::to_string).collect();
    Some((name.to_string(), Some(args)))
}

fn is_name(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '-'))
}

/// `item in items` -> `("item", "items")`.
pub(crate) fn parse_for(expression: &str) -> Option<(String, String)> {
    let (alias, source) = expression.trim().split_once(" in ")?;
    let alias = alias.trim();
    let source = source.trim();
    if !is_name(alias) || alias.contains('.') || source.is_empty() {
        return None;
    }
    Some((alias.to_string(), source.to_string()))
}

/// Parse one handler argument.
pub(crate) fn parse_arg(text: &str) -> Arg {
    let text = text.trim();
    match text {
        "$event" => return Arg::Event,
        "$index" => return Arg::Index,
        _ => {}
    }

    if (text.starts_with('\'') && text.ends_with('\'') && text.len() >= 2)
        || (text.starts_with('"') && text.ends_with('"') && text.len() >= 2)
    {
        return Arg::Value(Value::String(unquote(text).to_string()));
    }

    match serde_json::from_str::<Value>(text) {
        Ok(value @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => Arg::Value(value),
        _ => Arg::Value(Value::String(text.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_interpolation() {
        assert_eq!(
            split_interpolation("Hi {{ name }}!", "{{", "}}"),
            Some(("Hi ", "name", "!"))
        );
        assert_eq!(split_interpolation("{{a}}{{b}}", "{{", "}}"), Some(("", "a", "{{b}}")));
        assert_eq!(split_interpolation("no braces", "{{", "}}"), None);
        assert_eq!(split_interpolation("{{  }}", "{{", "}}"), None);
        assert_eq!(split_interpolation("{{ open", "{{", "}}"), None);
    }

    #[test]
    fn test_parse_object() {
        assert_eq!(
            parse_object("{ a: one, 'b-c': two.x , d : f(1, 2) }"),
            Some(vec![
                ("a".into(), "one".into()),
                ("b-c".into(), "two.x".into()),
                ("d".into(), "f(1, 2)".into()),
            ])
        );
        assert_eq!(parse_object("plain"), None);
        assert_eq!(parse_object("{a}"), None);
        assert_eq!(parse_object("{}"), Some(vec![]));
    }

    #[test]
    fn test_parse_call() {
        assert_eq!(parse_call("save"), Some(("save".into(), None)));
        assert_eq!(
            parse_call("remove($index, $event, 'a, b')"),
            Some((
                "remove".into(),
                Some(vec!["$index".into(), "$event".into(), "'a, b'".into()])
            ))
        );
        assert_eq!(parse_call("go()"), Some(("go".into(), Some(vec![]))));
        assert_eq!(parse_call("bad name()"), None);
    }

    #[test]
    fn test_parse_for() {
        assert_eq!(parse_for("item in items"), Some(("item".into(), "items".into())));
        assert_eq!(
            parse_for(" tag in group.tags "),
            Some(("tag".into(), "group.tags".into()))
        );
        assert_eq!(parse_for("items"), None);
    }

    #[test]
    fn test_parse_arg() {
        assert_eq!(parse_arg("$event"), Arg::Event);
        assert_eq!(parse_arg(" $index "), Arg::Index);
        assert_eq!(parse_arg("'x'"), Arg::Value(json!("x")));
        assert_eq!(parse_arg("2.5"), Arg::Value(json!(2.5)));
        assert_eq!(parse_arg("true"), Arg::Value(json!(true)));
        assert_eq!(parse_arg("word"), Arg::Value(json!("word")));
    }
}
