//! Typed records produced by the function collector.
//!
//! Raw records arrive from the facade as provider-shaped JSON objects. They are
//! parsed into [`RawFunction`], which names every field the inventory keeps and
//! drops everything else, and then assembled into a [`FunctionRecord`] once the
//! enrichment steps have run.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Provider-shaped description of one function, as returned by the facade
pub type RawRecord = Value;

/// Policy language version used for the default access policy
pub const DEFAULT_POLICY_VERSION: &str = "2012-10-17";

/// Policy id used for the default access policy
pub const DEFAULT_POLICY_ID: &str = "default";

/// The subset of a raw record that is copied verbatim into the inventory
///
/// Unknown provider fields are dropped: only the fields named below can reach
/// a [`FunctionRecord`]. A field with an unexpected shape reads as `None`, so
/// only a non-object record fails to parse.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawFunction {
    #[serde(default, deserialize_with = "lenient")]
    pub function_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub function_arn: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub runtime: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub handler: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub code_size: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub timeout: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub memory_size: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub last_modified: Option<String>,
    #[serde(default, rename = "CodeSha256", deserialize_with = "lenient")]
    pub code_sha256: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub tracing_config: Option<TracingConfig>,
    #[serde(default, deserialize_with = "lenient")]
    pub revision_id: Option<String>,
}

impl RawFunction {
    /// Parse a raw record, ignoring any field the inventory does not keep
    pub fn from_raw(raw: &RawRecord) -> Result<Self, serde_json::Error> {
        Self::deserialize(raw)
    }
}

/// Read a field as `T`, or `None` when the provider sent some other shape
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TracingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// A resource-based policy document, kept exactly as the provider returned it
///
/// Only the top-level shape is checked: the document must be a JSON object.
/// `Version`, `Statement` and any other keys are stored untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyDocument(Map<String, Value>);

impl PolicyDocument {
    pub fn new(document: Map<String, Value>) -> Self {
        Self(document)
    }

    /// Policy stored for functions without a resource-based policy
    pub fn default_access_policy() -> Self {
        let mut document = Map::new();
        document.insert("Id".to_string(), Value::from(DEFAULT_POLICY_ID));
        document.insert("Statement".to_string(), Value::Array(Vec::new()));
        document.insert("Version".to_string(), Value::from(DEFAULT_POLICY_VERSION));
        Self(document)
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default_access_policy()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn version(&self) -> Option<&str> {
        self.get("Version").and_then(Value::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.get("Id").and_then(Value::as_str)
    }

    /// Statements as a list; a single statement object counts as one
    pub fn statements(&self) -> Vec<Value> {
        statement_list(self.get("Statement"))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl TryFrom<Value> for PolicyDocument {
    type Error = Value;

    /// Wrap a JSON object; any other value is handed back
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(document) => Ok(Self(document)),
            other => Err(other),
        }
    }
}

/// IAM allows `Statement` to be a single object as well as a list
fn statement_list(statement: Option<&Value>) -> Vec<Value> {
    match statement {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single.clone()],
    }
}

/// A managed policy attached to an execution role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManagedPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_arn: Option<String>,
    /// Decoded default-version document, absent when it could not be read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Value>,
}

impl ManagedPolicy {
    /// Statements of this policy, empty unless both `Document` and `Statement` exist
    pub fn statements(&self) -> Vec<Value> {
        statement_list(self.document.as_ref().and_then(|doc| doc.get("Statement")))
    }
}

/// Execution identity as returned by the facade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub role_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assume_role_policy_document: Option<Value>,
    #[serde(default)]
    pub policies: Vec<ManagedPolicy>,
}

impl IdentityRecord {
    pub fn new(role_name: impl Into<String>) -> Self {
        Self {
            role_name: role_name.into(),
            role_id: None,
            arn: None,
            path: None,
            create_date: None,
            description: None,
            assume_role_policy_document: None,
            policies: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: ManagedPolicy) -> Self {
        self.policies.push(policy);
        self
    }
}

/// Execution identity plus the flattened statements of its managed policies
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRole {
    #[serde(flatten)]
    pub identity: IdentityRecord,
    pub policy_statements: Vec<Value>,
}

impl ExecutionRole {
    /// Concatenate the statements of every policy, in the order the policies were listed
    pub fn from_identity(identity: IdentityRecord) -> Self {
        let policy_statements = identity
            .policies
            .iter()
            .flat_map(ManagedPolicy::statements)
            .collect();

        Self {
            identity,
            policy_statements,
        }
    }
}

/// One enriched function in the inventory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionRecord {
    pub name: String,
    pub arn: Option<String>,
    pub runtime: Option<String>,
    pub handler: Option<String>,
    pub code_size: Option<i64>,
    pub description: Option<String>,
    pub timeout: Option<i64>,
    pub memory_size: Option<i64>,
    pub last_modified: Option<String>,
    pub code_sha256: Option<String>,
    pub version: Option<String>,
    pub tracing_config: Option<TracingConfig>,
    pub revision_id: Option<String>,
    pub role_arn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_role: Option<ExecutionRole>,
    pub access_policy: PolicyDocument,
    pub env_variables: BTreeMap<String, String>,
    pub env_variable_names: Vec<String>,
    pub env_variable_values: Vec<String>,
}

impl FunctionRecord {
    /// Copy the verbatim fields of a raw function; enrichment fields start empty
    ///
    /// Returns `None` when the record has no usable name.
    pub fn from_raw(raw: RawFunction) -> Option<Self> {
        let name = raw.function_name.filter(|name| !name.is_empty())?;

        Some(Self {
            name,
            arn: raw.function_arn,
            runtime: raw.runtime,
            handler: raw.handler,
            code_size: raw.code_size,
            description: raw.description,
            timeout: raw.timeout,
            memory_size: raw.memory_size,
            last_modified: raw.last_modified,
            code_sha256: raw.code_sha256,
            version: raw.version,
            tracing_config: raw.tracing_config,
            revision_id: raw.revision_id,
            role_arn: raw.role.unwrap_or_default(),
            execution_role: None,
            access_policy: PolicyDocument::default_access_policy(),
            env_variables: BTreeMap::new(),
            env_variable_names: Vec::new(),
            env_variable_values: Vec::new(),
        })
    }
}
