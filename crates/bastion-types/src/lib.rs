//! # bastion-types: Core types for `Bastion`
//!
//! This crate contains shared types used across the `Bastion` system:
//! - Well-known names ([`DEFAULT_NAMESPACE`], [`WILDCARD`], resource kinds, actions)
//! - Resource metadata ([`Metadata`])
//! - Durations with a string wire form ([`Duration`])
//! - Access targets ([`Server`])
//! - Trust anchors ([`CertAuthority`], [`CertAuthId`], [`CertAuthType`])

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod duration;

pub use duration::Duration;

// ============================================================================
// Well-known names
// ============================================================================

/// Namespace assigned to every resource that does not name one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Token that matches any value in a label, namespace, kind or action position.
pub const WILDCARD: &str = "*";

/// Resource schema version 2 (legacy roles, servers, cert authorities).
pub const V2: &str = "v2";

/// Resource schema version 3 (current roles).
pub const V3: &str = "v3";

pub const KIND_ROLE: &str = "role";
pub const KIND_USER: &str = "user";
pub const KIND_NODE: &str = "node";
pub const KIND_SESSION: &str = "session";
pub const KIND_NAMESPACE: &str = "namespace";
pub const KIND_CERT_AUTHORITY: &str = "cert_authority";

pub const ACTION_READ: &str = "read";
pub const ACTION_WRITE: &str = "write";

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while validating shared resource types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid duration {input:?}: {reason}")]
    InvalidDuration { input: String, reason: String },

    #[error("failed to validate: {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("unsupported cert authority type {0:?}")]
    UnknownCertAuthType(String),
}

// ============================================================================
// Metadata
// ============================================================================

/// Metadata shared by every stored resource.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Unique name of the resource within its kind.
    #[serde(default)]
    pub name: String,

    /// Namespace the resource lives in. Blank means [`DEFAULT_NAMESPACE`].
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Absolute expiry time. Backends use it to derive a TTL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
}

impl Metadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Returns the namespace, falling back to [`DEFAULT_NAMESPACE`] when blank.
    pub fn namespace(&self) -> &str {
        if self.namespace.is_empty() {
            DEFAULT_NAMESPACE
        } else {
            &self.namespace
        }
    }

    /// Requires a name and fills in the default namespace.
    pub fn check_and_set_defaults(&mut self) -> Result<(), TypeError> {
        if self.name.trim().is_empty() {
            return Err(TypeError::Validation {
                field: "name",
                reason: "name is required".to_string(),
            });
        }
        if self.namespace.is_empty() {
            self.namespace = DEFAULT_NAMESPACE.to_string();
        }
        Ok(())
    }
}

// ============================================================================
// Server
// ============================================================================

/// A node principals log in to.
///
/// Only the parts the access checks look at are modelled: the name,
/// namespace and labels (in [`Metadata`]) plus the advertised address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    #[serde(default = "kind_node")]
    pub kind: String,

    #[serde(default = "version_v2")]
    pub version: String,

    pub metadata: Metadata,

    #[serde(default)]
    pub spec: ServerSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub addr: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hostname: String,
}

fn kind_node() -> String {
    KIND_NODE.to_string()
}

fn version_v2() -> String {
    V2.to_string()
}

impl Server {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            kind: kind_node(),
            version: version_v2(),
            metadata: Metadata::new(name),
            spec: ServerSpec::default(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.metadata.namespace = namespace.into();
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.spec.addr = addr.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Namespace of the server, [`DEFAULT_NAMESPACE`] when unset.
    pub fn namespace(&self) -> &str {
        self.metadata.namespace()
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.metadata.labels
    }
}

// ============================================================================
// Certificate authorities
// ============================================================================

/// Which kind of certificates an authority signs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertAuthType {
    /// Signs host certificates presented by nodes.
    Host,
    /// Signs user certificates presented by principals.
    User,
}

impl CertAuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertAuthType::Host => "host",
            CertAuthType::User => "user",
        }
    }
}

impl Display for CertAuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CertAuthType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host" => Ok(CertAuthType::Host),
            "user" => Ok(CertAuthType::User),
            other => Err(TypeError::UnknownCertAuthType(other.to_string())),
        }
    }
}

/// Identifies a certificate authority: its type plus the cluster domain it serves.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CertAuthId {
    #[serde(rename = "type")]
    pub auth_type: CertAuthType,
    pub domain_name: String,
}

impl CertAuthId {
    pub fn new(auth_type: CertAuthType, domain_name: impl Into<String>) -> Self {
        Self {
            auth_type,
            domain_name: domain_name.into(),
        }
    }
}

impl Display for CertAuthId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CA(type={}, domain={})", self.auth_type, self.domain_name)
    }
}

/// A trust anchor record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertAuthority {
    #[serde(default = "kind_cert_authority")]
    pub kind: String,

    #[serde(default = "version_v2")]
    pub version: String,

    #[serde(default)]
    pub metadata: Metadata,

    pub spec: CertAuthoritySpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertAuthoritySpec {
    #[serde(rename = "type")]
    pub auth_type: CertAuthType,

    pub cluster_name: String,

    /// Public keys used to verify certificates signed by this authority.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checking_keys: Vec<String>,

    /// Private keys. Only loaded when explicitly requested.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signing_keys: Vec<String>,

    /// Roles assumed by principals whose certificates this authority signed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

fn kind_cert_authority() -> String {
    KIND_CERT_AUTHORITY.to_string()
}

impl CertAuthority {
    pub fn new(auth_type: CertAuthType, cluster_name: impl Into<String>) -> Self {
        let cluster_name = cluster_name.into();
        Self {
            kind: kind_cert_authority(),
            version: version_v2(),
            metadata: Metadata::new(cluster_name.clone()),
            spec: CertAuthoritySpec {
                auth_type,
                cluster_name,
                checking_keys: Vec::new(),
                signing_keys: Vec::new(),
                roles: Vec::new(),
            },
        }
    }

    pub fn with_checking_key(mut self, key: impl Into<String>) -> Self {
        self.spec.checking_keys.push(key.into());
        self
    }

    pub fn with_signing_key(mut self, key: impl Into<String>) -> Self {
        self.spec.signing_keys.push(key.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.spec.roles.push(role.into());
        self
    }

    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.metadata.expires = Some(expires);
        self
    }

    pub fn id(&self) -> CertAuthId {
        CertAuthId::new(self.spec.auth_type, self.spec.cluster_name.clone())
    }

    /// Returns a copy with the signing keys removed.
    pub fn without_secrets(&self) -> Self {
        let mut ca = self.clone();
        ca.spec.signing_keys.clear();
        ca
    }

    /// Requires a cluster name and fills in kind, version, name and namespace.
    pub fn check_and_set_defaults(&mut self) -> Result<(), TypeError> {
        if self.spec.cluster_name.trim().is_empty() {
            return Err(TypeError::Validation {
                field: "cluster_name",
                reason: "cluster name is required".to_string(),
            });
        }
        if self.kind.is_empty() {
            self.kind = kind_cert_authority();
        }
        if self.version.is_empty() {
            self.version = version_v2();
        }
        if self.metadata.name.is_empty() {
            self.metadata.name = self.spec.cluster_name.clone();
        }
        self.metadata.check_and_set_defaults()
    }
}
