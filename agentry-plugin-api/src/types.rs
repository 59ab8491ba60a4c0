//! Plugin types and metadata structures

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ErrorKind, PluginError};

// ─── Scope & Instance Key ────────────────────────────────────────────

/// Owner of a plugin instance
///
/// Textual form is `system` for the shared scope and `agent:<id>` for a
/// specific agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Scope {
    /// Shared scope for globally available plugins
    System,
    /// Scope owned by a single agent
    Agent(String),
}

impl Scope {
    /// Build an agent scope
    pub fn agent(id: impl Into<String>) -> Self {
        Self::Agent(id.into())
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Self::System)
    }

    /// Whether an entry owned by `owner` is visible from this scope.
    ///
    /// Agents see their own entries and the shared ones; the system scope
    /// sees only its own.
    pub fn sees(&self, owner: &Scope) -> bool {
        owner == self || owner.is_system()
    }

    /// Filesystem-safe directory name for this scope.
    ///
    /// Distinct scopes always map to distinct names: bytes outside
    /// `[A-Za-z0-9-]` are written as `_` plus two hex digits.
    pub fn dir_name(&self) -> String {
        match self {
            Self::System => "system".to_string(),
            Self::Agent(id) => format!("agent-{}", sanitize(id)),
        }
    }
}

fn sanitize(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("_{byte:02x}"));
        }
    }
    out
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::Agent(id) => write!(f, "agent:{id}"),
        }
    }
}

/// Error returned when a scope string cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid scope '{0}': expected 'system' or 'agent:<id>'")]
pub struct ParseScopeError(pub String);

impl FromStr for Scope {
    type Err = ParseScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "system" {
            return Ok(Self::System);
        }
        match s.strip_prefix("agent:") {
            Some(id) if !id.trim().is_empty() => Ok(Self::Agent(id.to_string())),
            _ => Err(ParseScopeError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Scope {
    type Error = ParseScopeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.to_string()
    }
}

/// Composite key identifying a live instance: (plugin name, scope)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceKey {
    pub name: String,
    pub scope: Scope,
}

impl InstanceKey {
    pub fn new(name: impl Into<String>, scope: Scope) -> Self {
        Self {
            name: name.into(),
            scope,
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.scope)
    }
}

// ─── Manifest & Schema ───────────────────────────────────────────────

/// Identity of a plugin variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Plugin name
    pub name: String,
    /// Plugin version (semver)
    pub version: String,
    /// Human-readable description
    pub description: String,
}

impl PluginManifest {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
        }
    }
}

/// Type of a configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Integer,
    Float,
    Boolean,
}

impl ValueType {
    /// Whether `value` is of this type. Integers are accepted where floats are expected.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

/// A single declared configuration option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigOption {
    pub name: String,
    pub value_type: ValueType,
    pub default: Value,
    #[serde(default)]
    pub description: String,
}

/// Declared configuration schema of a variant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub options: Vec<ConfigOption>,
}

impl ConfigSchema {
    /// The schema of a variant with no configuration options
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builder: declare an option
    pub fn option(
        mut self,
        name: impl Into<String>,
        value_type: ValueType,
        default: impl Into<Value>,
        description: impl Into<String>,
    ) -> Self {
        self.options.push(ConfigOption {
            name: name.into(),
            value_type,
            default: default.into(),
            description: description.into(),
        });
        self
    }

    pub fn get(&self, name: &str) -> Option<&ConfigOption> {
        self.options.iter().find(|o| o.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Options whose default does not match their declared type
    pub fn mistyped_defaults(&self) -> Vec<&str> {
        self.options
            .iter()
            .filter(|o| !o.value_type.matches(&o.default))
            .map(|o| o.name.as_str())
            .collect()
    }
}

/// Immutable description of a registered variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub version: String,
    pub description: String,
    pub schema: ConfigSchema,
}

impl PluginDescriptor {
    pub fn new(manifest: PluginManifest, schema: ConfigSchema) -> Self {
        Self {
            name: manifest.name,
            version: manifest.version,
            description: manifest.description,
            schema,
        }
    }
}

// ─── Requests & Results ──────────────────────────────────────────────

/// Caller-supplied parameters, validated by each variant
pub type PluginRequest = Map<String, Value>;

/// Successful result payload
pub type Payload = Map<String, Value>;

/// Outcome of a single execution: the payload or a typed failure
pub type PluginResult = Result<Payload, PluginError>;

/// Validation helpers for request maps
pub trait RequestExt {
    /// A required string field
    fn require_str(&self, field: &str) -> Result<&str, PluginError>;

    /// An optional string field; present but non-string is a validation error
    fn optional_str(&self, field: &str) -> Result<Option<&str>, PluginError>;
}

impl RequestExt for PluginRequest {
    fn require_str(&self, field: &str) -> Result<&str, PluginError> {
        match self.get(field) {
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(PluginError::validation(format!(
                "field '{field}' must be a string"
            ))),
            None => Err(PluginError::validation(format!(
                "missing required field '{field}'"
            ))),
        }
    }

    fn optional_str(&self, field: &str) -> Result<Option<&str>, PluginError> {
        match self.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(PluginError::validation(format!(
                "field '{field}' must be a string"
            ))),
        }
    }
}

// ─── Execution Records ───────────────────────────────────────────────

/// Outcome of one execute call as recorded by the execution guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure(ErrorKind),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Duration and outcome of a single execute call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub duration: Duration,
    pub outcome: Outcome,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scope_parse_and_display() {
        assert_eq!("system".parse::<Scope>().unwrap(), Scope::System);
        assert_eq!(
            "agent:42".parse::<Scope>().unwrap(),
            Scope::agent("42")
        );
        assert_eq!(Scope::agent("a1").to_string(), "agent:a1");
        assert!("agent:".parse::<Scope>().is_err());
        assert!("global".parse::<Scope>().is_err());
    }

    #[test]
    fn test_scope_serializes_as_string() {
        let json = serde_json::to_string(&Scope::agent("7")).unwrap();
        assert_eq!(json, "\"agent:7\"");
        let parsed: Scope = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(parsed, Scope::System);
    }

    #[test]
    fn test_scope_visibility() {
        let agent = Scope::agent("1");
        assert!(agent.sees(&Scope::System));
        assert!(agent.sees(&Scope::agent("1")));
        assert!(!agent.sees(&Scope::agent("2")));
        assert!(!Scope::System.sees(&agent));
    }

    #[test]
    fn test_scope_dir_name_is_filesystem_safe() {
        assert_eq!(Scope::agent("a/../b").dir_name(), "agent-a_2f_2e_2e_2fb");
        assert_eq!(Scope::agent("agent-7").dir_name(), "agent-agent-7");
        assert_eq!(Scope::System.dir_name(), "system");
    }

    #[test]
    fn test_scope_dir_names_are_distinct() {
        let scopes = [
            Scope::System,
            Scope::agent("system"),
            Scope::agent("a.b"),
            Scope::agent("a/b"),
            Scope::agent("a_b"),
            Scope::agent("a_2eb"),
            Scope::agent("a-b"),
        ];
        let names: std::collections::HashSet<String> =
            scopes.iter().map(Scope::dir_name).collect();
        assert_eq!(names.len(), scopes.len());
    }

    #[test]
    fn test_instance_key_display() {
        let key = InstanceKey::new("echo", Scope::agent("9"));
        assert_eq!(key.to_string(), "echo@agent:9");
    }

    #[test]
    fn test_value_type_matches() {
        assert!(ValueType::String.matches(&json!("x")));
        assert!(!ValueType::String.matches(&json!(1)));
        assert!(ValueType::Integer.matches(&json!(3)));
        assert!(!ValueType::Integer.matches(&json!(3.5)));
        assert!(ValueType::Float.matches(&json!(3)));
        assert!(ValueType::Boolean.matches(&json!(false)));
    }

    #[test]
    fn test_schema_builder_and_mistyped_defaults() {
        let schema = ConfigSchema::empty()
            .option("prefix", ValueType::String, "Echo: ", "Prefix")
            .option("limit", ValueType::Integer, "ten", "Broken default");

        assert_eq!(schema.options.len(), 2);
        assert_eq!(schema.get("prefix").unwrap().default, json!("Echo: "));
        assert_eq!(schema.mistyped_defaults(), vec!["limit"]);
        assert!(ConfigSchema::empty().is_empty());
    }

    #[test]
    fn test_request_require_str() {
        let mut request = PluginRequest::new();
        assert!(matches!(
            request.require_str("message"),
            Err(PluginError::Validation(_))
        ));

        request.insert("message".into(), json!(5));
        assert!(matches!(
            request.require_str("message"),
            Err(PluginError::Validation(_))
        ));

        request.insert("message".into(), json!("hi"));
        assert_eq!(request.require_str("message").unwrap(), "hi");
    }

    #[test]
    fn test_request_optional_str() {
        let mut request = PluginRequest::new();
        assert_eq!(request.optional_str("format").unwrap(), None);
        request.insert("format".into(), Value::Null);
        assert_eq!(request.optional_str("format").unwrap(), None);
        request.insert("format".into(), json!("%Y"));
        assert_eq!(request.optional_str("format").unwrap(), Some("%Y"));
        request.insert("format".into(), json!(true));
        assert!(request.optional_str("format").is_err());
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(Outcome::Failure(ErrorKind::Timeout)).unwrap();
        assert_eq!(json, json!({"status": "failure", "kind": "timeout"}));
        assert!(Outcome::Success.is_success());
    }
}
