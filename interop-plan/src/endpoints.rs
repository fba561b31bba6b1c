#![forbid(unsafe_code)]

//! Expansion of a relay into concrete endpoints to test against.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use interop_core::{ConfigError, ConfigIssue, Implementation, Transport, ROLE_RELAY};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::PlanningFilters;

/// How a relay is reached for one plan entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EndpointMode {
    /// Relay container started locally for the run.
    Docker,
    /// Already deployed relay reached over the network.
    Remote(Transport),
}

impl fmt::Display for EndpointMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointMode::Docker => f.write_str("docker"),
            EndpointMode::Remote(t) => write!(f, "remote-{t}"),
        }
    }
}

impl FromStr for EndpointMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "docker" {
            return Ok(EndpointMode::Docker);
        }
        s.strip_prefix("remote-")
            .and_then(|t| t.parse().ok())
            .map(EndpointMode::Remote)
            .ok_or_else(|| ConfigError::Invalid(vec![ConfigIssue::new("mode", format!("unknown endpoint mode {s:?}"))]))
    }
}

impl TryFrom<String> for EndpointMode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EndpointMode> for String {
    fn from(mode: EndpointMode) -> Self {
        mode.to_string()
    }
}

/// Whether a plan entry can be handed to the launcher.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Availability {
    #[default]
    Runnable,
    Unavailable { reason: String },
}

impl Availability {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Availability::Unavailable { reason: reason.into() }
    }

    pub fn is_runnable(&self) -> bool {
        matches!(self, Availability::Runnable)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Availability::Runnable => None,
            Availability::Unavailable { reason } => Some(reason),
        }
    }
}

/// One runnable (or explicitly unavailable) way of reaching a relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTarget {
    pub mode: EndpointMode,
    /// Image reference for docker mode, URL for remote mode.
    pub target: String,
    pub tls_disable_verify: bool,
    pub availability: Availability,
}

/// Answers whether a container launch reference can currently be run.
pub trait ImageCatalog {
    fn is_available(&self, image: &str) -> bool;
}

/// Catalog that treats every image as present. Used for dry runs without a container runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeAvailable;

impl ImageCatalog for AssumeAvailable {
    fn is_available(&self, _image: &str) -> bool {
        true
    }
}

/// Snapshot of images known to be present, taken before planning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownImages(BTreeSet<String>);

impl KnownImages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, image: impl Into<String>) {
        self.0.insert(image.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for KnownImages {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl ImageCatalog for KnownImages {
    fn is_available(&self, image: &str) -> bool {
        self.0.contains(image)
    }
}

/// Enumerate the endpoints of `relay` that survive `filters`.
///
/// Order is stable: the docker endpoint (if any) first, then remote endpoints in declaration
/// order. Inactive remote endpoints are never produced. A docker image the catalog does not
/// know is still produced, tagged [`Availability::Unavailable`].
pub fn enumerate(relay: &Implementation, filters: &PlanningFilters, images: &dyn ImageCatalog) -> Vec<EndpointTarget> {
    let Some(role) = relay.role(ROLE_RELAY) else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(role.remote.len() + 1);

    if let Some(docker) = role.docker.as_ref().filter(|_| filters.mode().allows_docker()) {
        let availability = if images.is_available(&docker.image) {
            Availability::Runnable
        } else {
            Availability::unavailable(format!("relay image {} is not available", docker.image))
        };
        out.push(EndpointTarget {
            mode: EndpointMode::Docker,
            target: docker.image.clone(),
            tls_disable_verify: true,
            availability,
        });
    }

    if filters.mode().allows_remote() {
        for ep in &role.remote {
            if ep.is_inactive() {
                trace!(relay = %relay.id, url = %ep.url, "skipping inactive endpoint");
                continue;
            }
            if !filters.allows_transport(ep.transport) {
                continue;
            }
            out.push(EndpointTarget {
                mode: EndpointMode::Remote(ep.transport),
                target: ep.url.clone(),
                tls_disable_verify: ep.tls_disable_verify,
                availability: Availability::Runnable,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use interop_core::Registry;

    const REGISTRY: &str = r#"{
        "current_target": "draft-14",
        "implementations": {
            "r": {
                "name": "r", "organization": "o", "draft_versions": ["draft-14"],
                "roles": { "relay": {
                    "docker": { "image": "r-relay:latest" },
                    "remote": [
                        { "url": "https://a.example:4443", "transport": "webtransport" },
                        { "url": "moqt://b.example:4443", "transport": "quic", "status": "inactive" },
                        { "url": "moqt://c.example:4443", "transport": "quic", "tls_disable_verify": true, "status": "untested" }
                    ]
                } }
            }
        }
    }"#;

    fn relay() -> Implementation {
        Registry::from_json(REGISTRY).unwrap().get("r").unwrap().clone()
    }

    #[test]
    fn docker_first_then_active_remotes_in_order() {
        let filters = PlanningFilters::default();
        let eps = enumerate(&relay(), &filters, &AssumeAvailable);
        let targets: Vec<_> = eps.iter().map(|e| e.target.as_str()).collect();
        assert_eq!(targets, ["r-relay:latest", "https://a.example:4443", "moqt://c.example:4443"]);
        assert_eq!(eps[0].mode, EndpointMode::Docker);
        assert_eq!(eps[2].mode, EndpointMode::Remote(Transport::Quic));
        assert!(eps[2].tls_disable_verify);
        assert!(!eps[1].tls_disable_verify);
    }

    #[test]
    fn missing_image_is_tagged_not_dropped() {
        let eps = enumerate(&relay(), &PlanningFilters::default(), &KnownImages::new());
        assert_eq!(eps.len(), 3);
        assert_eq!(eps[0].availability.reason(), Some("relay image r-relay:latest is not available"));
        assert!(eps[1].availability.is_runnable());
    }

    #[test]
    fn mode_and_transport_filters() {
        let docker = PlanningFilters::builder().docker_only(true).build().unwrap();
        assert_eq!(enumerate(&relay(), &docker, &AssumeAvailable).len(), 1);

        let quic = PlanningFilters::builder().remote_only(true).transport(Some(Transport::Quic)).build().unwrap();
        let eps = enumerate(&relay(), &quic, &AssumeAvailable);
        assert_eq!(eps.len(), 1);
        assert_eq!(eps[0].target, "moqt://c.example:4443");
    }

    #[test]
    fn mode_strings() {
        for mode in [EndpointMode::Docker, EndpointMode::Remote(Transport::Quic), EndpointMode::Remote(Transport::Webtransport)] {
            assert_eq!(mode.to_string().parse::<EndpointMode>().unwrap(), mode);
        }
        assert_eq!(serde_json::to_string(&EndpointMode::Remote(Transport::Webtransport)).unwrap(), "\"remote-webtransport\"");
        assert!("remote-tcp".parse::<EndpointMode>().is_err());
    }
}
