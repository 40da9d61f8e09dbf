//! Matchers used by the decision engine.
//!
//! Each matcher answers one question about one condition block. They are
//! pure functions so the same block can be checked against any number of
//! queries.

use std::collections::BTreeMap;

use bastion_types::{DEFAULT_NAMESPACE, Server, WILDCARD};

use crate::roles::RoleConditions;

/// Returns true if `namespace` is listed in `namespaces` or `*` is.
///
/// A blank query namespace is the default namespace.
pub fn match_namespace(namespaces: &[String], namespace: &str) -> bool {
    let namespace = if namespace.is_empty() {
        DEFAULT_NAMESPACE
    } else {
        namespace
    };
    namespaces
        .iter()
        .any(|candidate| candidate == WILDCARD || candidate == namespace)
}

/// Returns true if `target` satisfies every pair in `selector`.
///
/// An empty selector places no restriction. A `*` key matches any target;
/// a `*` value matches any value of a present key.
pub fn match_labels(selector: &BTreeMap<String, String>, target: &BTreeMap<String, String>) -> bool {
    selector.iter().all(|(key, value)| {
        if key == WILDCARD {
            return true;
        }
        target
            .get(key)
            .is_some_and(|actual| value == WILDCARD || actual == value)
    })
}

/// Returns true if `login` is listed verbatim.
pub fn match_login(logins: &[String], login: &str) -> bool {
    logins.iter().any(|candidate| candidate == login)
}

/// Returns true if the block grants `action` on resources of `kind`.
///
/// The action list is looked up in order: `rules[kind]`,
/// `system_resources[kind]`, `rules["*"]`, `system_resources["*"]`. The first
/// list found decides, even when it does not contain the action.
pub fn match_rule_or_resource(conditions: &RoleConditions, kind: &str, action: &str) -> bool {
    let actions = conditions
        .rules
        .get(kind)
        .or_else(|| conditions.system_resources.get(kind))
        .or_else(|| conditions.rules.get(WILDCARD))
        .or_else(|| conditions.system_resources.get(WILDCARD));

    actions.is_some_and(|actions| {
        actions
            .iter()
            .any(|candidate| candidate == WILDCARD || candidate == action)
    })
}

/// Namespace, labels and login of `server` against one block.
pub fn match_server(conditions: &RoleConditions, login: &str, server: &Server) -> bool {
    match_namespace(&conditions.namespaces, server.namespace())
        && match_labels(&conditions.node_labels, server.labels())
        && match_login(&conditions.logins, login)
}

/// Namespace and resource rule against one block.
pub fn match_resource(conditions: &RoleConditions, namespace: &str, kind: &str, action: &str) -> bool {
    match_namespace(&conditions.namespaces, namespace)
        && match_rule_or_resource(conditions, kind, action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test_case(&["default"], "default", true; "listed")]
    #[test_case(&["system"], "default", false; "not listed")]
    #[test_case(&["*"], "anything", true; "wildcard")]
    #[test_case(&["default"], "", true; "blank query is default")]
    #[test_case(&[], "default", false; "empty list")]
    fn test_match_namespace(namespaces: &[&str], namespace: &str, expected: bool) {
        assert_eq!(match_namespace(&strings(namespaces), namespace), expected);
    }

    #[test_case(&[], &[], true; "empty selector")]
    #[test_case(&[], &[("role", "db")], true; "empty selector with labels")]
    #[test_case(&[("role", "db")], &[("role", "db"), ("status", "follower")], true; "subset")]
    #[test_case(&[("role", "db")], &[("role", "worker")], false; "value differs")]
    #[test_case(&[("role", "db")], &[], false; "key missing")]
    #[test_case(&[("role", "*")], &[("role", "worker")], true; "wildcard value")]
    #[test_case(&[("role", "*")], &[], false; "wildcard value needs key")]
    #[test_case(&[("*", "*")], &[], true; "wildcard key")]
    #[test_case(&[("*", "*"), ("role", "db")], &[("role", "worker")], false; "wildcard key with other pair")]
    fn test_match_labels(selector: &[(&str, &str)], target: &[(&str, &str)], expected: bool) {
        assert_eq!(match_labels(&labels(selector), &labels(target)), expected);
    }

    #[test]
    fn test_match_login_is_verbatim() {
        let logins = strings(&["root", "{{external.logins}}"]);
        assert!(match_login(&logins, "root"));
        assert!(!match_login(&logins, "admin"));
        assert!(!match_login(&logins, "*"));
    }

    #[test_case("role", "read", true; "explicit rule")]
    #[test_case("role", "write", false; "rule is authoritative")]
    #[test_case("user", "write", true; "wildcard rule kind")]
    #[test_case("session", "write", true; "kind specific system resource")]
    #[test_case("session", "read", false; "system resource is authoritative for its kind")]
    fn test_match_rule_precedence(kind: &str, action: &str, expected: bool) {
        let conditions = RoleConditions::new()
            .with_rule("role", ["read"])
            .with_rule("*", ["*"])
            .with_system_resource("role", ["write"])
            .with_system_resource("session", ["write"]);
        assert_eq!(match_rule_or_resource(&conditions, kind, action), expected);
    }

    #[test]
    fn test_wildcard_rule_does_not_hide_system_resource() {
        let conditions = RoleConditions::new()
            .with_namespaces(["default"])
            .with_rule("*", ["read"])
            .with_system_resource("session", ["write"]);

        assert!(match_resource(&conditions, "default", "session", "write"));
        assert!(!match_resource(&conditions, "default", "session", "read"));
        assert!(match_resource(&conditions, "default", "node", "read"));
        assert!(!match_resource(&conditions, "default", "node", "write"));
    }

    #[test]
    fn test_match_system_resources_fallback() {
        let conditions = RoleConditions::new()
            .with_system_resource("session", ["read"])
            .with_system_resource("*", ["write"]);

        assert!(match_rule_or_resource(&conditions, "session", "read"));
        assert!(!match_rule_or_resource(&conditions, "session", "write"));
        assert!(match_rule_or_resource(&conditions, "node", "write"));
        assert!(!match_rule_or_resource(&conditions, "node", "read"));
    }

    #[test]
    fn test_match_rule_empty_block() {
        assert!(!match_rule_or_resource(&RoleConditions::new(), "role", "read"));
    }

    #[test]
    fn test_match_server() {
        let conditions = RoleConditions::new()
            .with_logins(["admin"])
            .with_namespaces(["default"])
            .with_node_label("role", "worker");

        let worker = Server::new("b").with_label("role", "worker");
        let db = Server::new("c").with_label("role", "db");

        assert!(match_server(&conditions, "admin", &worker));
        assert!(!match_server(&conditions, "root", &worker));
        assert!(!match_server(&conditions, "admin", &db));
    }
}
