#![forbid(unsafe_code)]

//! Declarative catalog of MoQT implementations.
//!
//! The registry is a JSON document:
//!
//! ```text
//! {
//!   "current_target": "draft-14",
//!   "implementations": {
//!     "<id>": {
//!       "name": "...", "organization": "...", "url": "...",
//!       "draft_versions": ["draft-14", ...],
//!       "roles": {
//!         "client": { "docker": { "image": "..." } },
//!         "relay":  { "docker": { "image": "..." },
//!                     "remote": [{ "url": "https://...", "transport": "webtransport" }] }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Loading is all-or-nothing and validation is total: every offending value is
//! reported in a single [`ConfigError::Invalid`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{ConfigError, ConfigIssue, ConfigResult, DraftVersion};

/// Role name of the side that runs the test process.
pub const ROLE_CLIENT: &str = "client";
/// Role name of the side under test that forwards objects.
pub const ROLE_RELAY: &str = "relay";

/// Network transport of a remote endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Raw QUIC, `moqt://` URLs.
    Quic,
    /// WebTransport over HTTP/3, `https://` URLs.
    Webtransport,
}

impl Transport {
    pub const ALL: [Transport; 2] = [Transport::Quic, Transport::Webtransport];

    /// URL scheme a remote endpoint of this transport must use.
    #[must_use]
    pub fn scheme(self) -> &'static str {
        match self {
            Transport::Quic => "moqt",
            Transport::Webtransport => "https",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Quic => "quic",
            Transport::Webtransport => "webtransport",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quic" => Ok(Transport::Quic),
            "webtransport" => Ok(Transport::Webtransport),
            other => Err(ConfigError::Invalid(vec![ConfigIssue::new(
                "transport",
                format!("unknown transport {other:?} (expected `quic` or `webtransport`)"),
            )])),
        }
    }
}

/// Lifecycle status of a remote endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    #[default]
    Active,
    /// Soft-deleted: kept in the registry, never planned.
    Inactive,
    Untested,
}

impl EndpointStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Untested => "untested",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "untested" => Some(Self::Untested),
            _ => None,
        }
    }
}

/// How a containerized image can be produced locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuildSpec {
    Context(String),
    Detailed {
        context: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dockerfile: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerRef {
    /// Opaque launch reference handed to the container runtime.
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteEndpoint {
    pub url: String,
    pub transport: Transport,
    pub tls_disable_verify: bool,
    pub status: EndpointStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl RemoteEndpoint {
    #[must_use]
    pub fn is_inactive(&self) -> bool {
        self.status == EndpointStatus::Inactive
    }
}

/// Per (implementation, role) configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker: Option<DockerRef>,
    /// Remote endpoints in declaration order.
    pub remote: Vec<RemoteEndpoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Implementation {
    pub id: String,
    pub name: String,
    pub organization: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub draft_versions: BTreeSet<DraftVersion>,
    pub roles: BTreeMap<String, RoleConfig>,
}

impl Implementation {
    pub fn role(&self, name: &str) -> Option<&RoleConfig> {
        self.roles.get(name)
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    /// Container launch reference for `role`, if one is configured.
    pub fn docker_image(&self, role: &str) -> Option<&str> {
        self.role(role)?.docker.as_ref().map(|d| d.image.as_str())
    }
}

/// Validated implementation catalog. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registry {
    pub current_target: DraftVersion,
    pub implementations: BTreeMap<String, Implementation>,
}

impl Registry {
    /// Read and validate a registry file.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let data = std::fs::read_to_string(&path)?;
        let registry = Self::from_json(&data)?;
        debug!(
            path = %path.as_ref().display(),
            implementations = registry.implementations.len(),
            "registry loaded"
        );
        Ok(registry)
    }

    /// Parse and validate a registry document. Only a JSON syntax error is
    /// reported as [`ConfigError::Json`]; everything else is collected.
    pub fn from_json(data: &str) -> ConfigResult<Self> {
        let doc: Value = serde_json::from_str(data)?;
        validate(&doc)
    }

    pub fn get(&self, id: &str) -> Option<&Implementation> {
        self.implementations.get(id)
    }

    /// Ids of implementations carrying the `client` role, in id order.
    pub fn clients(&self) -> impl Iterator<Item = &Implementation> {
        self.with_role(ROLE_CLIENT)
    }

    /// Ids of implementations carrying the `relay` role, in id order.
    pub fn relays(&self) -> impl Iterator<Item = &Implementation> {
        self.with_role(ROLE_RELAY)
    }

    fn with_role<'a>(&'a self, role: &'a str) -> impl Iterator<Item = &'a Implementation> + 'a {
        self.implementations.values().filter(move |imp| imp.has_role(role))
    }

    /// Every container image referenced by any role.
    pub fn images(&self) -> BTreeSet<&str> {
        self.implementations
            .values()
            .flat_map(|imp| imp.roles.values())
            .filter_map(|role| role.docker.as_ref().map(|d| d.image.as_str()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Wire validation. The document is walked as untyped JSON so that a missing
// or mistyped field becomes one more issue instead of aborting the load.
// ---------------------------------------------------------------------------

type Object = serde_json::Map<String, Value>;

fn validate(doc: &Value) -> ConfigResult<Registry> {
    let mut issues = Vec::new();
    let Some(root) = object(doc, "registry", &mut issues) else {
        return Err(ConfigError::Invalid(issues));
    };

    let current_target = string_field(root, "", "current_target", true, &mut issues)
        .and_then(|s| version(&s, "current_target".into(), &mut issues));

    let mut implementations = BTreeMap::new();
    match root.get("implementations") {
        Some(Value::Object(entries)) => {
            for (id, value) in entries {
                if let Some(imp) = implementation(id, value, &mut issues) {
                    implementations.insert(id.clone(), imp);
                }
            }
        }
        other => mistyped(other, "implementations", "an object", &mut issues),
    }

    match current_target {
        Some(current_target) if issues.is_empty() => Ok(Registry { current_target, implementations }),
        _ => Err(ConfigError::Invalid(issues)),
    }
}

fn implementation(id: &str, value: &Value, issues: &mut Vec<ConfigIssue>) -> Option<Implementation> {
    let base = format!("implementations.{id}");
    let before = issues.len();
    let map = object(value, &base, issues)?;

    let name = string_field(map, &base, "name", true, issues);
    let organization = string_field(map, &base, "organization", true, issues);
    let url = string_field(map, &base, "url", false, issues);

    let mut draft_versions = BTreeSet::new();
    let versions_path = format!("{base}.draft_versions");
    match map.get("draft_versions") {
        Some(Value::Array(items)) => {
            if items.is_empty() {
                issues.push(ConfigIssue::new(&versions_path, "must list at least one version"));
            }
            for (i, item) in items.iter().enumerate() {
                let path = format!("{versions_path}[{i}]");
                match item {
                    Value::String(s) => {
                        if let Some(v) = version(s, path, issues) {
                            draft_versions.insert(v);
                        }
                    }
                    other => issues.push(ConfigIssue::new(
                        path,
                        format!("expected a version string, found {}", kind(other)),
                    )),
                }
            }
        }
        other => mistyped(other, &versions_path, "an array of versions", issues),
    }

    let mut roles = BTreeMap::new();
    let roles_path = format!("{base}.roles");
    match map.get("roles") {
        None | Some(Value::Null) => {
            issues.push(ConfigIssue::new(&roles_path, "must declare at least one role"));
        }
        Some(Value::Object(entries)) => {
            if entries.is_empty() {
                issues.push(ConfigIssue::new(&roles_path, "must declare at least one role"));
            }
            for (role_name, value) in entries {
                if let Some(role) = role(&format!("{roles_path}.{role_name}"), value, issues) {
                    roles.insert(role_name.clone(), role);
                }
            }
        }
        Some(other) => issues.push(ConfigIssue::new(&roles_path, format!("expected an object, found {}", kind(other)))),
    }

    if issues.len() != before {
        return None;
    }
    Some(Implementation { id: id.to_string(), name: name?, organization: organization?, url, draft_versions, roles })
}

fn role(base: &str, value: &Value, issues: &mut Vec<ConfigIssue>) -> Option<RoleConfig> {
    let before = issues.len();
    let map = object(value, base, issues)?;

    let declares_docker = map.get("docker").is_some_and(|v| !v.is_null());
    let declares_remote = map
        .get("remote")
        .is_some_and(|v| !v.is_null() && v.as_array().map_or(true, |a| !a.is_empty()));
    if !declares_docker && !declares_remote {
        issues.push(ConfigIssue::new(base, "role declares neither a docker image nor a remote endpoint"));
    }

    let docker = match map.get("docker") {
        None | Some(Value::Null) => None,
        Some(value) => docker_ref(&format!("{base}.docker"), value, issues),
    };

    let mut remote = Vec::new();
    match map.get("remote") {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                if let Some(ep) = endpoint(&format!("{base}.remote[{i}]"), item, issues) {
                    remote.push(ep);
                }
            }
        }
        Some(other) => issues.push(ConfigIssue::new(
            format!("{base}.remote"),
            format!("expected an array, found {}", kind(other)),
        )),
    }

    (issues.len() == before).then_some(RoleConfig { docker, remote })
}

fn docker_ref(base: &str, value: &Value, issues: &mut Vec<ConfigIssue>) -> Option<DockerRef> {
    let map = object(value, base, issues)?;
    let image = string_field(map, base, "image", true, issues);
    if image.as_deref().is_some_and(|i| i.trim().is_empty()) {
        issues.push(ConfigIssue::new(format!("{base}.image"), "image reference is empty"));
    }
    let build = match map.get("build") {
        None | Some(Value::Null) => None,
        Some(value) => match serde_json::from_value::<BuildSpec>(value.clone()) {
            Ok(build) => Some(build),
            Err(_) => {
                issues.push(ConfigIssue::new(
                    format!("{base}.build"),
                    "expected a context path or an object with `context` and optional `dockerfile`",
                ));
                None
            }
        },
    };
    Some(DockerRef { image: image?, build })
}

fn endpoint(base: &str, value: &Value, issues: &mut Vec<ConfigIssue>) -> Option<RemoteEndpoint> {
    let before = issues.len();
    let map = object(value, base, issues)?;

    let url = string_field(map, base, "url", true, issues);
    let transport = string_field(map, base, "transport", true, issues).and_then(|t| {
        let parsed = t.parse::<Transport>().ok();
        if parsed.is_none() {
            issues.push(ConfigIssue::new(
                format!("{base}.transport"),
                format!("unknown transport {t:?} (expected `quic` or `webtransport`)"),
            ));
        }
        parsed
    });

    let status = match string_field(map, base, "status", false, issues) {
        None => EndpointStatus::default(),
        Some(s) => EndpointStatus::parse(&s).unwrap_or_else(|| {
            issues.push(ConfigIssue::new(
                format!("{base}.status"),
                format!("unknown status {s:?} (expected `active`, `inactive` or `untested`)"),
            ));
            EndpointStatus::default()
        }),
    };

    let tls_disable_verify = match map.get("tls_disable_verify") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(other) => {
            issues.push(ConfigIssue::new(
                format!("{base}.tls_disable_verify"),
                format!("expected a boolean, found {}", kind(other)),
            ));
            false
        }
    };
    let notes = string_field(map, base, "notes", false, issues);

    if let Some(url) = &url {
        match url::Url::parse(url) {
            Err(e) => issues.push(ConfigIssue::new(format!("{base}.url"), format!("invalid URL {url:?}: {e}"))),
            Ok(parsed) => {
                if let Some(t) = transport {
                    if parsed.scheme() != t.scheme() {
                        issues.push(ConfigIssue::new(
                            format!("{base}.url"),
                            format!("{t} endpoint must use the `{}://` scheme, got `{}://`", t.scheme(), parsed.scheme()),
                        ));
                    }
                }
            }
        }
    }

    if issues.len() != before {
        return None;
    }
    Some(RemoteEndpoint { url: url?, transport: transport?, tls_disable_verify, status, notes })
}

fn object<'a>(value: &'a Value, path: &str, issues: &mut Vec<ConfigIssue>) -> Option<&'a Object> {
    match value {
        Value::Object(map) => Some(map),
        other => {
            issues.push(ConfigIssue::new(path, format!("expected an object, found {}", kind(other))));
            None
        }
    }
}

/// String field `key` of `map`. `null` counts as absent.
fn string_field(map: &Object, base: &str, key: &str, required: bool, issues: &mut Vec<ConfigIssue>) -> Option<String> {
    let path = if base.is_empty() { key.to_string() } else { format!("{base}.{key}") };
    match map.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        None | Some(Value::Null) => {
            if required {
                issues.push(ConfigIssue::new(path, "missing required field"));
            }
            None
        }
        Some(other) => {
            issues.push(ConfigIssue::new(path, format!("expected a string, found {}", kind(other))));
            None
        }
    }
}

fn mistyped(value: Option<&Value>, path: &str, expected: &str, issues: &mut Vec<ConfigIssue>) {
    let message = match value {
        None | Some(Value::Null) => "missing required field".to_string(),
        Some(other) => format!("expected {expected}, found {}", kind(other)),
    };
    issues.push(ConfigIssue::new(path, message));
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn version(value: &str, path: String, issues: &mut Vec<ConfigIssue>) -> Option<DraftVersion> {
    match value.parse::<DraftVersion>() {
        Ok(v) => Some(v),
        Err(_) => {
            issues.push(ConfigIssue::new(path, format!("malformed version {value:?}: expected `draft-NN`")));
            None
        }
    }
}
