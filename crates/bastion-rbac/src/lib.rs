//! # bastion-rbac: Role-Based Access Control
//!
//! Decides what a principal may do on the cluster through its roles:
//! - **Server logins** (namespace, node labels and login)
//! - **Resource rules** (resource kind and action inside a namespace)
//! - **Trait substitution** (`{{external.logins}}` style placeholders)
//! - **Schema versions** (legacy `v2` documents read as `v3`)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Role Documents (v2 / v3 JSON) + Traits      │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Version Adapter                             │
//! │  ├─ Decode by `version`                      │
//! │  ├─ Convert to RoleV3                        │
//! │  └─ check_and_set_defaults                   │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  RoleSet (traits applied)                    │
//! │  ├─ Deny pass     -> Denied                  │
//! │  ├─ Allow pass    -> Granted                 │
//! │  └─ Default       -> Denied                  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Examples
//!
//! ```
//! use bastion_rbac::{PolicyEnforcer, RoleConditions, RoleSet, RoleV3, TraitMap};
//! use bastion_types::Server;
//!
//! let role = RoleV3::new("ops").with_allow(
//!     RoleConditions::new()
//!         .with_logins(["{{external.logins}}"])
//!         .with_namespaces(["default"])
//!         .with_node_label("env", "prod"),
//! );
//!
//! let mut traits = TraitMap::new();
//! traits.insert("logins".to_string(), vec!["alice".to_string()]);
//!
//! let roles = RoleSet::new([role]).unwrap().apply_traits(&traits);
//! let enforcer = PolicyEnforcer::new(roles).without_audit();
//!
//! let server = Server::new("web-1").with_label("env", "prod");
//! assert!(enforcer.evaluate_server("alice", &server).is_granted());
//! assert!(enforcer.evaluate_server("root", &server).is_denied());
//! ```

pub mod enforcement;
pub mod error;
pub mod matchers;
pub mod role_set;
pub mod roles;
pub mod traits;
pub mod version;

pub use enforcement::{EnforcementError, PolicyEnforcer};
pub use error::{Result, RoleError};
pub use role_set::{RoleSet, Verdict};
pub use roles::{RoleConditionType, RoleConditions, RoleOptions, RoleSpecV3, RoleV3};
pub use traits::{TemplateError, TraitMap};
pub use version::{
    ExtendedRole, RoleDocument, RoleSpecV2, RoleV2, marshal_role, marshal_role_document,
    unmarshal_role, unmarshal_role_with_extension,
};
