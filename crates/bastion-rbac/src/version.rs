//! Schema versions of role documents.
//!
//! Two schemas are readable:
//!
//! | Version          | Shape                                                  |
//! |------------------|--------------------------------------------------------|
//! | `v2` (or absent) | flat `spec`: logins, node_labels, namespaces, resources |
//! | `v3`             | `spec.options`, `spec.allow`, `spec.deny`              |
//!
//! Everything downstream works on [`RoleV3`]. Legacy documents are converted
//! explicitly with [`RoleDocument::into_v3`]; there is no implicit fallback
//! for other versions.

use std::collections::BTreeMap;

use bastion_types::{DEFAULT_NAMESPACE, Duration, KIND_ROLE, Metadata, V2, V3};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, RoleError};
use crate::roles::{
    self, RoleConditions, RoleOptions, RoleSpecV3, RoleV3, V3_SPEC_FIELDS,
};

// ============================================================================
// Legacy Role (v2)
// ============================================================================

/// Flat legacy role specification.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleSpecV2 {
    #[serde(default, skip_serializing_if = "Duration::is_zero")]
    pub max_session_ttl: Duration,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logins: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, Vec<String>>,
}

const V2_SPEC_FIELDS: &[&str] = &[
    "max_session_ttl",
    "logins",
    "node_labels",
    "namespaces",
    "resources",
];

/// A role in the legacy schema.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoleV2 {
    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default)]
    pub spec: RoleSpecV2,
}

impl RoleV2 {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            kind: KIND_ROLE.to_string(),
            version: V2.to_string(),
            metadata: Metadata::new(name).with_namespace(DEFAULT_NAMESPACE),
            spec: RoleSpecV2::default(),
        }
    }

    /// Validates the legacy role and fills in defaults.
    pub fn check_and_set_defaults(&mut self) -> Result<()> {
        roles::check_kind(&mut self.kind)?;

        if self.version.is_empty() {
            self.version = V2.to_string();
        } else if self.version != V2 {
            return Err(RoleError::UnsupportedVersion(self.version.clone()));
        }

        self.metadata.check_and_set_defaults()?;

        for login in &self.spec.logins {
            roles::check_login(login)?;
        }

        Ok(())
    }

    /// Converts to the current schema.
    ///
    /// Flat fields become the `allow` block, `resources` becomes
    /// `allow.system_resources` and `deny` stays empty. Wildcards are kept
    /// verbatim.
    pub fn v3(&self) -> RoleV3 {
        let allow = RoleConditions {
            logins: self.spec.logins.clone(),
            namespaces: self.spec.namespaces.clone(),
            node_labels: self.spec.node_labels.clone(),
            rules: BTreeMap::new(),
            system_resources: self.spec.resources.clone(),
        };

        RoleV3 {
            kind: KIND_ROLE.to_string(),
            version: V3.to_string(),
            metadata: self.metadata.clone(),
            spec: RoleSpecV3 {
                options: RoleOptions {
                    max_session_ttl: self.spec.max_session_ttl,
                    forward_agent: false,
                },
                allow,
                deny: RoleConditions::default(),
            },
        }
    }
}

// ============================================================================
// Role Document
// ============================================================================

/// A role document in any readable schema version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RoleDocument {
    V2(RoleV2),
    V3(RoleV3),
}

impl RoleDocument {
    /// Decodes a document, dispatching on its `version` field.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        if data.trim_ascii().is_empty() {
            return Err(RoleError::EmptyInput);
        }
        let value: Value = serde_json::from_slice(data)?;
        Self::try_from(value)
    }

    pub fn version(&self) -> &'static str {
        match self {
            RoleDocument::V2(_) => V2,
            RoleDocument::V3(_) => V3,
        }
    }

    pub fn check_and_set_defaults(&mut self) -> Result<()> {
        match self {
            RoleDocument::V2(role) => role.check_and_set_defaults(),
            RoleDocument::V3(role) => role.check_and_set_defaults(),
        }
    }

    /// Converts to the current schema.
    pub fn into_v3(self) -> RoleV3 {
        match self {
            RoleDocument::V2(role) => role.v3(),
            RoleDocument::V3(role) => role,
        }
    }
}

impl TryFrom<Value> for RoleDocument {
    type Error = RoleError;

    fn try_from(value: Value) -> Result<Self> {
        match schema_version(&value)? {
            V3 => Ok(RoleDocument::V3(serde_json::from_value(value)?)),
            _ => Ok(RoleDocument::V2(serde_json::from_value(value)?)),
        }
    }
}

impl From<RoleV2> for RoleDocument {
    fn from(role: RoleV2) -> Self {
        RoleDocument::V2(role)
    }
}

impl From<RoleV3> for RoleDocument {
    fn from(role: RoleV3) -> Self {
        RoleDocument::V3(role)
    }
}

/// Reads the `version` field. A missing or blank version is `v2`.
fn schema_version(value: &Value) -> Result<&'static str> {
    match value.get("version") {
        None | Some(Value::Null) => Ok(V2),
        Some(Value::String(version)) => match version.as_str() {
            "" | V2 => Ok(V2),
            V3 => Ok(V3),
            other => Err(RoleError::UnsupportedVersion(other.to_string())),
        },
        Some(other) => Err(RoleError::UnsupportedVersion(other.to_string())),
    }
}

fn spec_fields(version: &str) -> &'static [&'static str] {
    if version == V3 { V3_SPEC_FIELDS } else { V2_SPEC_FIELDS }
}

// ============================================================================
// Marshalling
// ============================================================================

/// Decodes, converts and validates a role document of any readable version.
pub fn unmarshal_role(data: &[u8]) -> Result<RoleV3> {
    let mut document = RoleDocument::from_json(data)?;
    document.check_and_set_defaults()?;
    Ok(document.into_v3())
}

/// Encodes a role in the current schema.
pub fn marshal_role(role: &RoleV3) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(role)?)
}

/// Encodes a document in its own schema version.
pub fn marshal_role_document(document: &RoleDocument) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(document)?)
}

/// A role together with caller-declared extension fields from its `spec`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedRole<E> {
    pub role: RoleV3,
    pub extension: E,
}

/// Decodes a role whose `spec` carries extra fields.
///
/// Every `spec` key the document's version does not define is decoded into
/// `E`, so a wrongly typed extension field fails the whole document. The
/// remaining fields go through [`unmarshal_role`] unchanged.
pub fn unmarshal_role_with_extension<E: DeserializeOwned>(data: &[u8]) -> Result<ExtendedRole<E>> {
    if data.trim_ascii().is_empty() {
        return Err(RoleError::EmptyInput);
    }
    let mut value: Value = serde_json::from_slice(data)?;
    let known = spec_fields(schema_version(&value)?);

    let mut extension = Map::new();
    if let Some(object) = value.as_object_mut() {
        let spec = match object.remove("spec") {
            None | Some(Value::Null) => Map::new(),
            Some(spec) => serde_json::from_value::<Map<String, Value>>(spec)?,
        };

        let mut core = Map::new();
        for (key, field) in spec {
            if known.contains(&key.as_str()) {
                core.insert(key, field);
            } else {
                extension.insert(key, field);
            }
        }
        object.insert("spec".to_string(), Value::Object(core));
    }

    let extension: E = serde_json::from_value(Value::Object(extension))?;

    let mut document = RoleDocument::try_from(value)?;
    document.check_and_set_defaults()?;

    Ok(ExtendedRole {
        role: document.into_v3(),
        extension,
    })
}
