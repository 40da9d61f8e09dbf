//! Role documents.
//!
//! A role is a named policy with two condition blocks:
//! - `allow`: what the role grants
//! - `deny`: what the role forbids, evaluated with higher precedence
//!
//! Roles are validated once with [`RoleV3::check_and_set_defaults`] and are
//! treated as immutable values afterwards. Personalising a role for a
//! principal ([`RoleV3::apply_traits`]) produces a new role.

use std::collections::BTreeMap;

use bastion_types::{
    ACTION_READ, ACTION_WRITE, DEFAULT_NAMESPACE, Duration, KIND_ROLE, Metadata, V3, WILDCARD,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RoleError};
use crate::traits::{self, TraitMap};

/// Selects one of a role's two condition blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleConditionType {
    Allow,
    Deny,
}

/// Conditions of one block (`allow` or `deny`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleConditions {
    /// Logins a principal may use on matching servers.
    ///
    /// May contain trait placeholders such as `{{external.logins}}` until
    /// traits are applied.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logins: Vec<String>,

    /// Namespaces the block applies to. `*` matches any namespace.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,

    /// Label selector for servers. `*` as a key or value is a wildcard.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_labels: BTreeMap<String, String>,

    /// Resource kind to actions.
    ///
    /// Authoritative over `system_resources` for the same kind.
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        with = "rule_list"
    )]
    pub rules: BTreeMap<String, Vec<String>>,

    /// Legacy resource kind to actions.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub system_resources: BTreeMap<String, Vec<String>>,
}

impl RoleConditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logins<I, S>(mut self, logins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.logins.extend(logins.into_iter().map(Into::into));
        self
    }

    pub fn with_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespaces.extend(namespaces.into_iter().map(Into::into));
        self
    }

    pub fn with_node_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.node_labels.insert(key.into(), value.into());
        self
    }

    /// Grants `actions` on `kind`. Repeated actions are kept once.
    pub fn with_rule<I, S>(mut self, kind: impl Into<String>, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        merge_actions(self.rules.entry(kind.into()).or_default(), actions);
        self
    }

    /// Grants `actions` on `kind` through the legacy channel.
    pub fn with_system_resource<I, S>(mut self, kind: impl Into<String>, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        merge_actions(self.system_resources.entry(kind.into()).or_default(), actions);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.logins.is_empty()
            && self.namespaces.is_empty()
            && self.node_labels.is_empty()
            && self.rules.is_empty()
            && self.system_resources.is_empty()
    }
}

fn merge_actions<I, S>(existing: &mut Vec<String>, actions: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    for action in actions {
        let action = action.into();
        if !existing.contains(&action) {
            existing.push(action);
        }
    }
}

/// Wire form of `rules`: a list of `{resources, verbs}` entries.
mod rule_list {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Rule {
        resources: Vec<String>,
        #[serde(default)]
        verbs: Vec<String>,
    }

    pub fn serialize<S: Serializer>(
        rules: &BTreeMap<String, Vec<String>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let list: Vec<Rule> = rules
            .iter()
            .map(|(kind, verbs)| Rule {
                resources: vec![kind.clone()],
                verbs: verbs.clone(),
            })
            .collect();
        list.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, Vec<String>>, D::Error> {
        let list = Vec::<Rule>::deserialize(deserializer)?;
        let mut rules: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for rule in list {
            for resource in rule.resources {
                super::merge_actions(rules.entry(resource).or_default(), rule.verbs.iter().cloned());
            }
        }
        Ok(rules)
    }
}

/// Options that are not conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleOptions {
    /// Upper bound on session length. Zero means unset.
    #[serde(default, skip_serializing_if = "Duration::is_zero")]
    pub max_session_ttl: Duration,

    /// Whether the principal may forward their SSH agent.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub forward_agent: bool,
}

impl RoleOptions {
    pub fn is_empty(&self) -> bool {
        self.max_session_ttl.is_zero() && !self.forward_agent
    }
}

/// Specification of a current-version role.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleSpecV3 {
    #[serde(default, skip_serializing_if = "RoleOptions::is_empty")]
    pub options: RoleOptions,

    #[serde(default, skip_serializing_if = "RoleConditions::is_empty")]
    pub allow: RoleConditions,

    #[serde(default, skip_serializing_if = "RoleConditions::is_empty")]
    pub deny: RoleConditions,
}

/// `spec` keys a v3 document understands.
pub(crate) const V3_SPEC_FIELDS: &[&str] = &["options", "allow", "deny"];

/// A role in the current schema.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoleV3 {
    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default)]
    pub spec: RoleSpecV3,
}

/// Session TTL granted by [`RoleV3::admin`].
pub const ADMIN_MAX_SESSION_TTL: Duration = Duration::from_hours(30);

impl RoleV3 {
    /// Creates an empty role in the default namespace.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            kind: KIND_ROLE.to_string(),
            version: V3.to_string(),
            metadata: Metadata::new(name).with_namespace(DEFAULT_NAMESPACE),
            spec: RoleSpecV3::default(),
        }
    }

    /// Creates a role that grants everything.
    ///
    /// Logins come from the principal's `logins` trait plus the ones given.
    pub fn admin<I, S>(name: impl Into<String>, logins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allow = RoleConditions::new()
            .with_logins(["{{internal.logins}}".to_string()])
            .with_logins(logins)
            .with_namespaces([WILDCARD])
            .with_node_label(WILDCARD, WILDCARD)
            .with_rule(WILDCARD, [ACTION_READ, ACTION_WRITE]);

        Self::new(name)
            .with_allow(allow)
            .with_max_session_ttl(ADMIN_MAX_SESSION_TTL)
            .with_forward_agent(true)
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.metadata.namespace = namespace.into();
        self
    }

    pub fn with_allow(mut self, conditions: RoleConditions) -> Self {
        self.spec.allow = conditions;
        self
    }

    pub fn with_deny(mut self, conditions: RoleConditions) -> Self {
        self.spec.deny = conditions;
        self
    }

    pub fn with_max_session_ttl(mut self, ttl: Duration) -> Self {
        self.spec.options.max_session_ttl = ttl;
        self
    }

    pub fn with_forward_agent(mut self, forward_agent: bool) -> Self {
        self.spec.options.forward_agent = forward_agent;
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Returns the requested condition block.
    pub fn conditions(&self, condition: RoleConditionType) -> &RoleConditions {
        match condition {
            RoleConditionType::Allow => &self.spec.allow,
            RoleConditionType::Deny => &self.spec.deny,
        }
    }

    pub fn logins(&self, condition: RoleConditionType) -> &[String] {
        &self.conditions(condition).logins
    }

    pub fn namespaces(&self, condition: RoleConditionType) -> &[String] {
        &self.conditions(condition).namespaces
    }

    pub fn node_labels(&self, condition: RoleConditionType) -> &BTreeMap<String, String> {
        &self.conditions(condition).node_labels
    }

    pub fn rules(&self, condition: RoleConditionType) -> &BTreeMap<String, Vec<String>> {
        &self.conditions(condition).rules
    }

    pub fn system_resources(&self, condition: RoleConditionType) -> &BTreeMap<String, Vec<String>> {
        &self.conditions(condition).system_resources
    }

    /// Maximum session TTL, zero when unset.
    pub fn max_session_ttl(&self) -> Duration {
        self.spec.options.max_session_ttl
    }

    pub fn can_forward_agent(&self) -> bool {
        self.spec.options.forward_agent
    }

    /// Validates the role and fills in defaults.
    ///
    /// - `metadata.name` is required
    /// - blank `kind`, `version` and `metadata.namespace` get their defaults
    /// - every login must have well-formed placeholder syntax
    pub fn check_and_set_defaults(&mut self) -> Result<()> {
        check_kind(&mut self.kind)?;

        if self.version.is_empty() {
            self.version = V3.to_string();
        } else if self.version != V3 {
            return Err(RoleError::UnsupportedVersion(self.version.clone()));
        }

        self.metadata.check_and_set_defaults()?;

        for login in self.spec.allow.logins.iter().chain(&self.spec.deny.logins) {
            check_login(login)?;
        }

        Ok(())
    }

    /// Returns a copy of this role with trait placeholders in `allow` and
    /// `deny` logins expanded.
    ///
    /// The role itself is left untouched, so one base role can be
    /// personalised for any number of principals.
    pub fn apply_traits(&self, traits: &TraitMap) -> RoleV3 {
        let mut role = self.clone();
        role.spec.allow.logins = traits::apply_login_traits(&self.spec.allow.logins, traits);
        role.spec.deny.logins = traits::apply_login_traits(&self.spec.deny.logins, traits);
        role
    }
}

pub(crate) fn check_kind(kind: &mut String) -> Result<()> {
    if kind.is_empty() {
        *kind = KIND_ROLE.to_string();
        Ok(())
    } else if kind == KIND_ROLE {
        Ok(())
    } else {
        Err(RoleError::Validation {
            field: "kind".to_string(),
            reason: format!("expected {KIND_ROLE:?}, got {kind:?}"),
        })
    }
}

pub(crate) fn check_login(login: &str) -> Result<()> {
    traits::validate_login(login).map_err(|source| RoleError::TraitSyntax {
        login: login.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::TemplateError;

    fn role_with_logins(logins: &[&str]) -> RoleV3 {
        RoleV3::new("name1").with_allow(RoleConditions::new().with_logins(logins.iter().copied()))
    }

    #[test]
    fn test_check_and_set_defaults_fills_blanks() {
        let mut role = RoleV3 {
            metadata: Metadata::new("name1"),
            ..RoleV3::default()
        };
        role.check_and_set_defaults().unwrap();

        assert_eq!(role.kind, KIND_ROLE);
        assert_eq!(role.version, V3);
        assert_eq!(role.metadata.namespace, DEFAULT_NAMESPACE);
    }

    #[test]
    fn test_check_and_set_defaults_requires_name() {
        let mut role = RoleV3::default();
        let err = role.check_and_set_defaults().unwrap_err();
        assert_eq!(err.to_string(), "failed to validate: name: name is required");
    }

    #[test]
    fn test_check_and_set_defaults_rejects_wrong_kind() {
        let mut role = RoleV3::new("name1");
        role.kind = "user".to_string();
        assert!(matches!(
            role.check_and_set_defaults(),
            Err(RoleError::Validation { field, .. }) if field == "kind"
        ));
    }

    #[test]
    fn test_check_and_set_defaults_trait_syntax() {
        for (logins, ok) in [
            (&["{{foo"][..], false),
            (&["bar}}"][..], false),
            (&["{{foo.bar}}"][..], true),
        ] {
            let mut role = role_with_logins(logins);
            assert_eq!(role.check_and_set_defaults().is_ok(), ok, "logins {logins:?}");
        }
    }

    #[test]
    fn test_check_and_set_defaults_checks_deny_logins() {
        let mut role =
            RoleV3::new("name1").with_deny(RoleConditions::new().with_logins(["{{external.x"]));
        match role.check_and_set_defaults() {
            Err(RoleError::TraitSyntax { login, source }) => {
                assert_eq!(login, "{{external.x");
                assert_eq!(source, TemplateError::Unclosed);
            }
            other => panic!("expected trait syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_apply_traits_leaves_original_untouched() {
        let role = RoleV3::new("name1")
            .with_allow(RoleConditions::new().with_logins(["{{external.foo}}", "root"]))
            .with_deny(RoleConditions::new().with_logins(["{{internal.blocked}}"]));

        let mut traits = TraitMap::new();
        traits.insert("foo".to_string(), vec!["bar".to_string()]);
        traits.insert("blocked".to_string(), vec!["nobody".to_string()]);

        let applied = role.apply_traits(&traits);

        assert_eq!(applied.logins(RoleConditionType::Allow), ["bar", "root"]);
        assert_eq!(applied.logins(RoleConditionType::Deny), ["nobody"]);
        assert_eq!(
            role.logins(RoleConditionType::Allow),
            ["{{external.foo}}", "root"]
        );
    }

    #[test]
    fn test_with_rule_merges_actions() {
        let conditions = RoleConditions::new()
            .with_rule("role", [ACTION_READ])
            .with_rule("role", [ACTION_READ, ACTION_WRITE]);
        assert_eq!(conditions.rules["role"], [ACTION_READ, ACTION_WRITE]);
    }

    #[test]
    fn test_rules_wire_form() {
        let conditions = RoleConditions::new().with_rule("role", [ACTION_READ, ACTION_WRITE]);
        let json = serde_json::to_value(&conditions).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"rules": [{"resources": ["role"], "verbs": ["read", "write"]}]})
        );

        let merged: RoleConditions = serde_json::from_value(serde_json::json!({
            "rules": [
                {"resources": ["role", "user"], "verbs": ["read"]},
                {"resources": ["role"], "verbs": ["write", "read"]}
            ]
        }))
        .unwrap();
        assert_eq!(merged.rules["role"], [ACTION_READ, ACTION_WRITE]);
        assert_eq!(merged.rules["user"], [ACTION_READ]);
    }

    #[test]
    fn test_unknown_condition_field_rejected() {
        let result: std::result::Result<RoleConditions, _> =
            serde_json::from_value(serde_json::json!({"logins": ["a"], "hosts": ["b"]}));
        assert!(result.is_err());
    }

    #[test]
    fn test_admin_role_is_valid() {
        let mut role = RoleV3::admin("admin", ["root"]);
        role.check_and_set_defaults().unwrap();
        assert_eq!(role.namespaces(RoleConditionType::Allow), [WILDCARD]);
        assert_eq!(role.max_session_ttl(), ADMIN_MAX_SESSION_TTL);
        assert!(role.can_forward_agent());
    }
}
