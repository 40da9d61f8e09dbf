//! Role sets and the allow/deny decision engine.
//!
//! Evaluation order for every query:
//!
//! 1. **Deny pass**: if any role's `deny` block matches, access is denied.
//! 2. **Allow pass**: if any role's `allow` block matches, access is granted.
//! 3. **Default deny**: otherwise access is denied.
//!
//! The verdict does not depend on the order of roles in the set.

use bastion_types::{Duration, Server};

use crate::enforcement::EnforcementError;
use crate::error::RoleError;
use crate::matchers;
use crate::roles::{RoleConditionType, RoleConditions, RoleV3};
use crate::traits::{self, TraitMap};

// ============================================================================
// Verdict
// ============================================================================

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Verdict {
    Granted,
    Denied { reason: String },
}

impl Verdict {
    pub fn denied(reason: impl Into<String>) -> Self {
        Verdict::Denied {
            reason: reason.into(),
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Verdict::Granted)
    }

    pub fn is_denied(&self) -> bool {
        !self.is_granted()
    }

    /// Reason for a denial, `None` when granted.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Verdict::Granted => None,
            Verdict::Denied { reason } => Some(reason),
        }
    }

    /// Converts a denial into [`EnforcementError::AccessDenied`].
    pub fn into_result(self) -> Result<(), EnforcementError> {
        match self {
            Verdict::Granted => Ok(()),
            Verdict::Denied { reason } => Err(EnforcementError::AccessDenied { reason }),
        }
    }
}

// ============================================================================
// Role Set
// ============================================================================

/// The validated roles attached to one principal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet {
    roles: Vec<RoleV3>,
}

impl RoleSet {
    /// Builds a set from roles, validating each one.
    ///
    /// Fails on the first role that does not pass
    /// [`RoleV3::check_and_set_defaults`].
    pub fn new<I>(roles: I) -> Result<Self, RoleError>
    where
        I: IntoIterator<Item = RoleV3>,
    {
        let roles = roles
            .into_iter()
            .map(|mut role| {
                role.check_and_set_defaults()?;
                Ok(role)
            })
            .collect::<Result<Vec<_>, RoleError>>()?;

        Ok(Self { roles })
    }

    /// A set with no roles. It grants nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn roles(&self) -> &[RoleV3] {
        &self.roles
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RoleV3> {
        self.roles.iter()
    }

    pub fn role_names(&self) -> Vec<&str> {
        self.roles.iter().map(RoleV3::name).collect()
    }

    /// Returns the set with trait placeholders expanded in every role.
    ///
    /// Trait values are inserted verbatim and the derived roles are not
    /// validated again, so a value such as `{{x` survives into the logins.
    pub fn apply_traits(&self, traits: &TraitMap) -> RoleSet {
        RoleSet {
            roles: self
                .roles
                .iter()
                .map(|role| role.apply_traits(traits))
                .collect(),
        }
    }

    /// Decides whether `login` may be used on `server`.
    pub fn check_access_to_server(&self, login: &str, server: &Server) -> Verdict {
        let target = || {
            format!(
                "server {:?} in namespace {:?} as {login:?}",
                server.name(),
                server.namespace()
            )
        };

        if let Some(role) = self.find(RoleConditionType::Deny, |conditions| {
            matchers::match_server(conditions, login, server)
        }) {
            return Verdict::denied(format!(
                "role {:?} denies access to {}",
                role.name(),
                target()
            ));
        }

        if self
            .find(RoleConditionType::Allow, |conditions| {
                matchers::match_server(conditions, login, server)
            })
            .is_some()
        {
            return Verdict::Granted;
        }

        Verdict::denied(format!("no role grants access to {}", target()))
    }

    /// Decides whether `action` may be performed on resources of `kind`
    /// inside `namespace`.
    pub fn check_access_to_rule_or_resource(
        &self,
        namespace: &str,
        kind: &str,
        action: &str,
    ) -> Verdict {
        let target = || format!("{action} on {kind:?} in namespace {namespace:?}");

        if let Some(role) = self.find(RoleConditionType::Deny, |conditions| {
            matchers::match_resource(conditions, namespace, kind, action)
        }) {
            return Verdict::denied(format!("role {:?} denies {}", role.name(), target()));
        }

        if self
            .find(RoleConditionType::Allow, |conditions| {
                matchers::match_resource(conditions, namespace, kind, action)
            })
            .is_some()
        {
            return Verdict::Granted;
        }

        Verdict::denied(format!("no role grants access to {}", target()))
    }

    fn find<F>(&self, condition: RoleConditionType, matches: F) -> Option<&RoleV3>
    where
        F: Fn(&RoleConditions) -> bool,
    {
        self.roles
            .iter()
            .find(|role| matches(role.conditions(condition)))
    }

    /// Caps `ttl` by the smallest maximum session TTL set on any role.
    pub fn adjust_session_ttl(&self, ttl: Duration) -> Duration {
        self.roles
            .iter()
            .map(RoleV3::max_session_ttl)
            .filter(|max| !max.is_zero())
            .fold(ttl, std::cmp::min)
    }

    /// Returns the logins usable on a certificate valid for `ttl`.
    ///
    /// Only roles with a maximum session TTL of at least `ttl` contribute.
    pub fn check_login_duration(&self, ttl: Duration) -> Result<Vec<String>, EnforcementError> {
        let mut qualified = false;
        let mut logins = Vec::new();

        for role in &self.roles {
            let max = role.max_session_ttl();
            if !max.is_zero() && ttl <= max {
                qualified = true;
                logins.extend(role.logins(RoleConditionType::Allow).iter().cloned());
            }
        }

        if !qualified {
            return Err(EnforcementError::AccessDenied {
                reason: format!("this user cannot request a certificate for {ttl}"),
            });
        }
        if logins.is_empty() {
            return Err(EnforcementError::AccessDenied {
                reason: format!(
                    "this user cannot request a certificate for {ttl}: qualifying roles have no allowed logins"
                ),
            });
        }

        Ok(traits::deduplicate(logins))
    }

    /// Returns true if any role permits agent forwarding.
    pub fn can_forward_agent(&self) -> bool {
        self.roles.iter().any(RoleV3::can_forward_agent)
    }
}

impl<'a> IntoIterator for &'a RoleSet {
    type Item = &'a RoleV3;
    type IntoIter = std::slice::Iter<'a, RoleV3>;

    fn into_iter(self) -> Self::IntoIter {
        self.roles.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(name: &str, ttl: Duration, logins: &[&str]) -> RoleV3 {
        RoleV3::new(name)
            .with_max_session_ttl(ttl)
            .with_allow(RoleConditions::new().with_logins(logins.iter().copied()))
    }

    #[test]
    fn test_new_rejects_invalid_role() {
        let result = RoleSet::new([RoleV3::new("ok"), RoleV3::new("")]);
        assert!(matches!(result, Err(RoleError::Validation { .. })));
    }

    #[test]
    fn test_adjust_session_ttl() {
        let set = RoleSet::new([
            role("a", Duration::from_hours(10), &[]),
            role("b", Duration::ZERO, &[]),
            role("c", Duration::from_hours(4), &[]),
        ])
        .unwrap();

        assert_eq!(set.adjust_session_ttl(Duration::from_hours(12)), Duration::from_hours(4));
        assert_eq!(set.adjust_session_ttl(Duration::from_hours(1)), Duration::from_hours(1));
        assert_eq!(
            RoleSet::empty().adjust_session_ttl(Duration::from_hours(12)),
            Duration::from_hours(12)
        );
    }

    #[test]
    fn test_check_login_duration() {
        let set = RoleSet::new([
            role("short", Duration::from_hours(1), &["guest"]),
            role("long", Duration::from_hours(30), &["root", "guest"]),
            role("unset", Duration::ZERO, &["nobody"]),
        ])
        .unwrap();

        assert_eq!(
            set.check_login_duration(Duration::from_mins(30)).unwrap(),
            ["guest", "root"]
        );
        assert_eq!(
            set.check_login_duration(Duration::from_hours(10)).unwrap(),
            ["root", "guest"]
        );

        let err = set.check_login_duration(Duration::from_hours(31)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Access denied: this user cannot request a certificate for 31h0m0s"
        );
    }

    #[test]
    fn test_check_login_duration_without_logins() {
        let set = RoleSet::new([role("empty", Duration::from_hours(1), &[])]).unwrap();
        let err = set.check_login_duration(Duration::from_mins(5)).unwrap_err();
        assert!(err.to_string().contains("no allowed logins"));
    }

    #[test]
    fn test_can_forward_agent() {
        let plain = RoleV3::new("plain");
        let forwarding = RoleV3::new("forwarding").with_forward_agent(true);

        assert!(!RoleSet::new([plain.clone()]).unwrap().can_forward_agent());
        assert!(RoleSet::new([plain, forwarding]).unwrap().can_forward_agent());
    }

    #[test]
    fn test_verdict_into_result() {
        assert!(Verdict::Granted.into_result().is_ok());

        let denied = Verdict::denied("nope");
        assert_eq!(denied.reason(), Some("nope"));
        assert!(matches!(
            denied.into_result(),
            Err(EnforcementError::AccessDenied { reason }) if reason == "nope"
        ));
    }

    #[test]
    fn test_apply_traits_inserts_values_verbatim() {
        let mut traits = TraitMap::new();
        traits.insert("logins".to_string(), vec!["{{x".to_string()]);

        let set = RoleSet::new([RoleV3::admin("admin", Vec::<String>::new())])
            .unwrap()
            .apply_traits(&traits);
        assert_eq!(set.roles()[0].logins(RoleConditionType::Allow), ["{{x"]);

        let mut derived = set.roles()[0].clone();
        assert!(matches!(
            derived.check_and_set_defaults(),
            Err(RoleError::TraitSyntax { .. })
        ));
    }

    #[test]
    fn test_denial_reasons_describe_target() {
        let set = RoleSet::empty();
        let server = Server::new("web-1");

        assert_eq!(
            set.check_access_to_server("root", &server).reason(),
            Some("no role grants access to server \"web-1\" in namespace \"default\" as \"root\"")
        );
        assert_eq!(
            set.check_access_to_rule_or_resource("default", "session", "write").reason(),
            Some("no role grants access to write on \"session\" in namespace \"default\"")
        );
    }

    #[test]
    fn test_denial_names_role() {
        let set = RoleSet::new([RoleV3::new("blocker").with_deny(
            RoleConditions::new()
                .with_namespaces(["*"])
                .with_rule("*", ["*"]),
        )])
        .unwrap();

        let verdict = set.check_access_to_rule_or_resource("default", "role", "read");
        assert!(verdict.reason().is_some_and(|reason| reason.contains("\"blocker\"")));
    }
}
