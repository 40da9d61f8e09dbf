//! Policy enforcement logic.
//!
//! Answers access queries for one principal and audit-logs every decision.

use bastion_config::RbacConfig;
use bastion_types::Server;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::RoleError;
use crate::role_set::{RoleSet, Verdict};
use crate::traits::TraitMap;
use crate::version::unmarshal_role;

/// Error type for policy enforcement.
#[derive(Debug, Error)]
pub enum EnforcementError {
    /// Access denied by policy.
    #[error("Access denied: {reason}")]
    AccessDenied { reason: String },

    /// A role document could not be loaded.
    #[error("Invalid role: {0}")]
    InvalidRole(#[from] RoleError),
}

/// Result type for enforcement operations.
pub type Result<T> = std::result::Result<T, EnforcementError>;

/// Policy enforcement engine.
///
/// Holds the personalised role set of one principal:
/// - Server login checks
/// - Resource rule checks
/// - Audit logging
#[derive(Debug, Clone)]
pub struct PolicyEnforcer {
    /// Roles with traits already applied.
    roles: RoleSet,

    /// Whether to log access decisions.
    audit_enabled: bool,
}

impl PolicyEnforcer {
    /// Creates a new policy enforcer.
    pub fn new(roles: RoleSet) -> Self {
        Self {
            roles,
            audit_enabled: true,
        }
    }

    /// Loads role documents of any readable version and personalises them.
    ///
    /// Runs the full pipeline: decode, convert to the current schema,
    /// validate, then apply `traits`.
    pub fn from_documents<D: AsRef<[u8]>>(
        documents: &[D],
        traits: &TraitMap,
    ) -> std::result::Result<Self, RoleError> {
        let roles = documents
            .iter()
            .map(|document| unmarshal_role(document.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let roles = RoleSet::new(roles)?.apply_traits(traits);
        Ok(Self::new(roles))
    }

    /// Disables audit logging (for testing).
    pub fn without_audit(mut self) -> Self {
        self.audit_enabled = false;
        self
    }

    /// Applies the `[rbac]` configuration section.
    pub fn with_config(mut self, config: &RbacConfig) -> Self {
        self.audit_enabled = config.audit;
        self
    }

    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    /// Decides whether `login` may be used on `server`.
    ///
    /// **Audit:** Logs the decision.
    pub fn evaluate_server(&self, login: &str, server: &Server) -> Verdict {
        let verdict = self.roles.check_access_to_server(login, server);

        if self.audit_enabled {
            match &verdict {
                Verdict::Granted => info!(
                    login = %login,
                    server = %server.name(),
                    namespace = %server.namespace(),
                    roles = ?self.roles.role_names(),
                    "Server access granted"
                ),
                Verdict::Denied { reason } => warn!(
                    login = %login,
                    server = %server.name(),
                    namespace = %server.namespace(),
                    roles = ?self.roles.role_names(),
                    reason = %reason,
                    "Server access denied"
                ),
            }
        }

        verdict
    }

    /// Decides whether `action` may be performed on `kind` in `namespace`.
    ///
    /// **Audit:** Logs the decision.
    pub fn evaluate_resource(&self, namespace: &str, kind: &str, action: &str) -> Verdict {
        let verdict = self
            .roles
            .check_access_to_rule_or_resource(namespace, kind, action);

        if self.audit_enabled {
            match &verdict {
                Verdict::Granted => info!(
                    namespace = %namespace,
                    kind = %kind,
                    action = %action,
                    roles = ?self.roles.role_names(),
                    "Resource access granted"
                ),
                Verdict::Denied { reason } => warn!(
                    namespace = %namespace,
                    kind = %kind,
                    action = %action,
                    roles = ?self.roles.role_names(),
                    reason = %reason,
                    "Resource access denied"
                ),
            }
        }

        verdict
    }

    /// Enforces server access.
    ///
    /// Returns `Ok(())` if access is allowed, `Err` otherwise.
    pub fn enforce_server_access(&self, login: &str, server: &Server) -> Result<()> {
        self.evaluate_server(login, server).into_result()
    }

    /// Enforces resource access.
    ///
    /// Returns `Ok(())` if access is allowed, `Err` otherwise.
    pub fn enforce_resource_access(&self, namespace: &str, kind: &str, action: &str) -> Result<()> {
        self.evaluate_resource(namespace, kind, action)
            .into_result()
    }
}
