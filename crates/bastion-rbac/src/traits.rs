//! Trait substitution for role logins.
//!
//! A login may carry one placeholder of the form `{{scope.name}}`, optionally
//! surrounded by literal text:
//!
//! ```text
//! {{external.logins}}      -> one login per value of the "logins" trait
//! dev-{{internal.team}}    -> "dev-" + each value of the "team" trait
//! root                     -> kept as is
//! ```
//!
//! Embedded placeholders such as `dev-{{internal.team}}` are an extension:
//! the reference role format only recognises a placeholder that makes up the
//! whole trimmed login, and treats anything else as a literal.
//!
//! Only the `internal` and `external` scopes resolve to trait values. The
//! parser is a hand-written scan over the braces so that every malformed
//! input maps to a precise [`TemplateError`].

use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

/// Per-principal attributes, keyed by trait name.
pub type TraitMap = BTreeMap<String, Vec<String>>;

/// Scope for traits the platform assigns itself.
pub const INTERNAL_SCOPE: &str = "internal";

/// Scope for traits copied from an external identity provider.
pub const EXTERNAL_SCOPE: &str = "external";

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Why a login failed to parse as a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("\"{{{{\" is never closed by \"}}}}\"")]
    Unclosed,

    #[error("\"}}}}\" has no opening \"{{{{\"")]
    Unopened,

    #[error("placeholder {0:?} must have the form scope.name")]
    Malformed(String),

    #[error("a login may contain at most one placeholder")]
    MultiplePlaceholders,
}

/// A parsed login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginTemplate<'a> {
    /// No placeholder markers at all.
    Literal(&'a str),

    /// A single `{{scope.name}}` placeholder with the text around it.
    Variable {
        prefix: &'a str,
        scope: &'a str,
        name: &'a str,
        suffix: &'a str,
    },
}

/// Parses a login into a literal or a placeholder.
pub fn parse_login(login: &str) -> Result<LoginTemplate<'_>, TemplateError> {
    let (open, close) = match (login.find(OPEN), login.find(CLOSE)) {
        (None, None) => return Ok(LoginTemplate::Literal(login)),
        (Some(_), None) => return Err(TemplateError::Unclosed),
        (None, Some(_)) => return Err(TemplateError::Unopened),
        (Some(open), Some(close)) if close < open => return Err(TemplateError::Unopened),
        (Some(open), Some(close)) => (open, close),
    };

    let prefix = &login[..open];
    let body = &login[open + OPEN.len()..close];
    let suffix = &login[close + CLOSE.len()..];

    if suffix.contains(OPEN) || suffix.contains(CLOSE) {
        return Err(TemplateError::MultiplePlaceholders);
    }

    let variable = body.trim();
    if variable.contains(['{', '}']) || variable.contains(char::is_whitespace) {
        return Err(TemplateError::Malformed(body.to_string()));
    }

    match variable.split_once('.') {
        Some((scope, name)) if !scope.is_empty() && !name.is_empty() => {
            Ok(LoginTemplate::Variable {
                prefix,
                scope,
                name,
                suffix,
            })
        }
        _ => Err(TemplateError::Malformed(body.to_string())),
    }
}

/// Checks placeholder syntax without expanding anything.
pub fn validate_login(login: &str) -> Result<(), TemplateError> {
    parse_login(login).map(|_| ())
}

/// Expands trait placeholders in `logins`.
///
/// - Literals and unparseable strings are kept verbatim.
/// - `{{internal.x}}` / `{{external.x}}` expand to every value of trait `x`,
///   at the placeholder's position; a missing trait expands to nothing.
/// - Placeholders in any other scope expand to nothing.
/// - The result keeps only the first occurrence of each login.
pub fn apply_login_traits(logins: &[String], traits: &TraitMap) -> Vec<String> {
    let mut expanded = Vec::with_capacity(logins.len());

    for login in logins {
        match parse_login(login) {
            Ok(LoginTemplate::Variable {
                prefix,
                scope,
                name,
                suffix,
            }) => {
                if scope != INTERNAL_SCOPE && scope != EXTERNAL_SCOPE {
                    continue;
                }
                if let Some(values) = traits.get(name) {
                    expanded.extend(values.iter().map(|v| format!("{prefix}{v}{suffix}")));
                }
            }
            Ok(LoginTemplate::Literal(_)) | Err(_) => expanded.push(login.clone()),
        }
    }

    deduplicate(expanded)
}

/// Removes repeated entries, keeping the first occurrence of each.
pub fn deduplicate(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(values.len());
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn traits(name: &str, values: &[&str]) -> TraitMap {
        let mut traits = TraitMap::new();
        traits.insert(name.to_string(), values.iter().map(ToString::to_string).collect());
        traits
    }

    fn logins(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test_case("foo", &["bar"], &["{{external.foo}}", "root"], &["bar", "root"]; "substitute")]
    #[test_case("foo", &["bar"], &["root"], &["root"]; "no variable")]
    #[test_case("foo", &["bar"], &["external.foo}}"], &["external.foo}}"]; "malformed passes through")]
    #[test_case("foo", &["bar"], &["{{internal.bar}}", "root"], &["root"]; "missing trait")]
    #[test_case("logins", &["bar", "baz"], &["{{internal.logins}}", "root"], &["bar", "baz", "root"]; "many values")]
    #[test_case("foo", &["bar"], &["{{external.foo}}", "bar"], &["bar"]; "deduplicate")]
    #[test_case("foo", &["bar"], &["{{custom.foo}}", "root"], &["root"]; "unknown scope")]
    #[test_case("team", &["a", "b"], &["dev-{{external.team}}"], &["dev-a", "dev-b"]; "prefix kept")]
    #[test_case("foo", &["bar"], &["{{ external.foo }}"], &["bar"]; "inner whitespace")]
    fn test_apply_login_traits(name: &str, values: &[&str], input: &[&str], expected: &[&str]) {
        let out = apply_login_traits(&logins(input), &traits(name, values));
        assert_eq!(out, logins(expected));
    }

    #[test_case("{{foo", TemplateError::Unclosed; "open without close")]
    #[test_case("bar}}", TemplateError::Unopened; "close without open")]
    #[test_case("}}{{a.b", TemplateError::Unopened; "close before open")]
    #[test_case("{{foo}}", TemplateError::Malformed("foo".to_string()); "no scope")]
    #[test_case("{{.foo}}", TemplateError::Malformed(".foo".to_string()); "empty scope")]
    #[test_case("{{a.b}}{{c.d}}", TemplateError::MultiplePlaceholders; "two placeholders")]
    fn test_validate_login_rejects(login: &str, expected: TemplateError) {
        assert_eq!(validate_login(login), Err(expected));
    }

    #[test_case("root"; "literal")]
    #[test_case("{{foo.bar}}"; "any scope is valid syntax")]
    #[test_case("{{external.foo}}"; "external")]
    #[test_case("x-{{internal.foo}}-y"; "surrounded")]
    fn test_validate_login_accepts(login: &str) {
        assert!(validate_login(login).is_ok());
    }

    #[test]
    fn test_parse_login_parts() {
        assert_eq!(
            parse_login("dev-{{external.team}}.corp").unwrap(),
            LoginTemplate::Variable {
                prefix: "dev-",
                scope: "external",
                name: "team",
                suffix: ".corp",
            }
        );
        assert_eq!(parse_login("root").unwrap(), LoginTemplate::Literal("root"));
    }

    #[test]
    fn test_deduplicate_keeps_first_occurrence() {
        let out = deduplicate(logins(&["b", "a", "b", "c", "a"]));
        assert_eq!(out, logins(&["b", "a", "c"]));
    }
}
