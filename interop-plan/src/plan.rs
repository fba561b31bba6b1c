#![forbid(unsafe_code)]

//! Test plan compilation.
//!
//! Planning is pure: it needs the registry, the target version, the filters and an image catalog
//! snapshot, and produces a [`Plan`] without starting any process.

use std::collections::BTreeSet;

use interop_core::{ConfigResult, DraftVersion, Implementation, Registry, ROLE_CLIENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::endpoints::{enumerate, Availability, EndpointMode, EndpointTarget, ImageCatalog};
use crate::predict::{predict, Classification};
use crate::PlanningFilters;

/// Non-fatal planning outcome. The affected pair is simply absent from the plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanningWarning {
    #[error("{client} and {relay} share no draft version")]
    NoSharedVersion { client: String, relay: String },
    #[error("no endpoint of relay {relay} survives the filters (client {client})")]
    NoEndpoints { client: String, relay: String },
}

/// Fully resolved unit of work. Created by [`compile`], never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    /// Position in the sorted plan.
    pub index: usize,
    pub client: String,
    pub relay: String,
    /// Predicted negotiated version. A label, never passed to the test process.
    pub version: DraftVersion,
    pub classification: Classification,
    pub mode: EndpointMode,
    /// Relay image (docker mode) or relay URL (remote mode).
    pub target: String,
    /// Launch reference for the client side.
    pub client_image: Option<String>,
    pub tls_disable_verify: bool,
    #[serde(flatten)]
    pub availability: Availability,
}

impl PlanEntry {
    pub fn is_runnable(&self) -> bool {
        self.availability.is_runnable()
    }

    /// Short `client -> relay (mode)` label for logs and progress output.
    pub fn label(&self) -> String {
        format!("{} -> {} ({})", self.client, self.relay, self.mode)
    }
}

/// Ordered execution plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub target_version: DraftVersion,
    entries: Vec<PlanEntry>,
    #[serde(skip)]
    warnings: Vec<PlanningWarning>,
}

impl Plan {
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<PlanEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn warnings(&self) -> &[PlanningWarning] {
        &self.warnings
    }

    /// Distinct (client, relay) pairs in plan order.
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        let mut seen = BTreeSet::new();
        self.entries
            .iter()
            .map(|e| (e.client.as_str(), e.relay.as_str()))
            .filter(|pair| seen.insert(*pair))
            .collect()
    }

    pub fn runnable_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_runnable()).count()
    }
}

/// Compile the plan for every (client, relay) pair admitted by `filters`.
///
/// Disjoint pairs and pairs without surviving endpoints are omitted and reported as
/// [`PlanningWarning`]s. The result is stably sorted by classification (`at`, `ahead`, `behind`),
/// so the registry's (client, relay, endpoint) order is kept within each class.
pub fn compile(
    registry: &Registry,
    target: &DraftVersion,
    filters: &PlanningFilters,
    images: &dyn ImageCatalog,
) -> ConfigResult<Plan> {
    filters.check_names(registry)?;

    let clients: Vec<&Implementation> = registry.clients().filter(|c| filters.allows_client(&c.id)).collect();
    let relays: Vec<&Implementation> = registry.relays().filter(|r| filters.allows_relay(&r.id)).collect();
    debug!(clients = clients.len(), relays = relays.len(), target = %target, "compiling plan");

    let mut entries = Vec::new();
    let mut warnings = Vec::new();

    for client in &clients {
        for relay in &relays {
            let Some(prediction) = predict(client, relay, target) else {
                let w = PlanningWarning::NoSharedVersion { client: client.id.clone(), relay: relay.id.clone() };
                warn!("{w}");
                warnings.push(w);
                continue;
            };
            if !filters.allows_classification(prediction.classification) {
                debug!(
                    client = %client.id,
                    relay = %relay.id,
                    classification = %prediction.classification,
                    "pair excluded by classification filter"
                );
                continue;
            }

            let endpoints = enumerate(relay, filters, images);
            if endpoints.is_empty() {
                let w = PlanningWarning::NoEndpoints { client: client.id.clone(), relay: relay.id.clone() };
                warn!("{w}");
                warnings.push(w);
                continue;
            }

            let client_image = client.docker_image(ROLE_CLIENT).map(str::to_string);
            for ep in endpoints {
                let EndpointTarget { mode, target: ep_target, tls_disable_verify, availability } = ep;
                let availability = client_availability(client, client_image.as_deref(), images, availability);
                entries.push(PlanEntry {
                    index: 0,
                    client: client.id.clone(),
                    relay: relay.id.clone(),
                    version: prediction.version.clone(),
                    classification: prediction.classification,
                    mode,
                    target: ep_target,
                    client_image: client_image.clone(),
                    tls_disable_verify,
                    availability,
                });
            }
        }
    }

    // Stable: equal classifications keep their cartesian order.
    entries.sort_by_key(|e| e.classification.rank());
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.index = i;
    }

    debug!(entries = entries.len(), warnings = warnings.len(), "plan compiled");
    Ok(Plan { target_version: target.clone(), entries, warnings })
}

/// Downgrade an endpoint's availability when the client side cannot be launched.
fn client_availability(
    client: &Implementation,
    image: Option<&str>,
    images: &dyn ImageCatalog,
    endpoint: Availability,
) -> Availability {
    if !endpoint.is_runnable() {
        return endpoint;
    }
    match image {
        None => Availability::unavailable(format!("client {} has no launch reference", client.id)),
        Some(img) if !images.is_available(img) => {
            Availability::unavailable(format!("client image {img} is not available"))
        }
        Some(_) => endpoint,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::{AssumeAvailable, KnownImages};
    use interop_core::{ConfigError, Transport};

    fn registry() -> Registry {
        Registry::from_json(
            r#"{
            "current_target": "draft-14",
            "implementations": {
                "x": { "name": "X", "organization": "o", "draft_versions": ["draft-13", "draft-14", "draft-15"],
                       "roles": { "client": { "docker": { "image": "x-client" } },
                                  "relay":  { "docker": { "image": "x-relay" } } } },
                "y": { "name": "Y", "organization": "o", "draft_versions": ["draft-13"],
                       "roles": { "relay": { "remote": [{ "url": "https://y.example", "transport": "webtransport" }] } } },
                "z": { "name": "Z", "organization": "o", "draft_versions": ["draft-15"],
                       "roles": { "relay": { "remote": [{ "url": "moqt://z.example", "transport": "quic" },
                                                        { "url": "https://z.example", "transport": "webtransport" }] } } },
                "w": { "name": "W", "organization": "o", "draft_versions": ["draft-2"],
                       "roles": { "client": { "docker": { "image": "w-client" } } } }
            }
        }"#,
        )
        .unwrap()
    }

    fn target() -> DraftVersion {
        "draft-14".parse().unwrap()
    }

    #[test]
    fn sorted_by_classification_and_stable() {
        let plan = compile(&registry(), &target(), &PlanningFilters::default(), &AssumeAvailable).unwrap();
        let summary: Vec<_> = plan
            .entries()
            .iter()
            .map(|e| (e.index, e.client.as_str(), e.relay.as_str(), e.classification, e.target.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (0, "x", "x", Classification::Ahead, "x-relay"),
                (1, "x", "z", Classification::Ahead, "moqt://z.example"),
                (2, "x", "z", Classification::Ahead, "https://z.example"),
                (3, "x", "y", Classification::Behind, "https://y.example"),
            ]
        );
        assert_eq!(plan.pairs(), vec![("x", "x"), ("x", "z"), ("x", "y")]);
        // w shares no version with any relay.
        assert_eq!(plan.warnings().len(), 3);
    }

    #[test]
    fn classification_filter() {
        let filters = PlanningFilters::builder().only(Classification::Behind).build().unwrap();
        let plan = compile(&registry(), &target(), &filters, &AssumeAvailable).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.entries()[0].relay, "y");
    }

    #[test]
    fn transport_filter_empties_pair() {
        let filters = PlanningFilters::builder()
            .remote_only(true)
            .transport(Some(Transport::Quic))
            .relays(["y"])
            .build()
            .unwrap();
        let plan = compile(&registry(), &target(), &filters, &AssumeAvailable).unwrap();
        assert!(plan.is_empty());
        assert!(plan.warnings().contains(&PlanningWarning::NoEndpoints { client: "x".into(), relay: "y".into() }));
    }

    #[test]
    fn unknown_names_are_rejected() {
        let filters = PlanningFilters::builder().relays(["nope"]).build().unwrap();
        let err = compile(&registry(), &target(), &filters, &AssumeAvailable).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownImplementation { id, .. } if id == "nope"));
        // y has no client role.
        let filters = PlanningFilters::builder().clients(["y"]).build().unwrap();
        assert!(compile(&registry(), &target(), &filters, &AssumeAvailable).is_err());
    }

    #[test]
    fn missing_images_mark_entries_unavailable() {
        let images: KnownImages = ["x-relay"].into_iter().collect();
        let plan = compile(&registry(), &target(), &PlanningFilters::default(), &images).unwrap();
        assert!(plan.entries().iter().all(|e| !e.is_runnable()));
        assert_eq!(plan.entries()[0].availability.reason(), Some("client image x-client is not available"));

        let images: KnownImages = ["x-client"].into_iter().collect();
        let plan = compile(&registry(), &target(), &PlanningFilters::default(), &images).unwrap();
        assert_eq!(plan.entries()[0].availability.reason(), Some("relay image x-relay is not available"));
        assert_eq!(plan.runnable_count(), 3);
    }

    #[test]
    fn entry_serializes_flat() {
        let plan = compile(&registry(), &target(), &PlanningFilters::default(), &AssumeAvailable).unwrap();
        let v = serde_json::to_value(&plan.entries()[1]).unwrap();
        assert_eq!(v["mode"], "remote-quic");
        assert_eq!(v["state"], "runnable");
        assert_eq!(v["version"], "draft-15");
        assert_eq!(v["classification"], "ahead");
        let back: PlanEntry = serde_json::from_value(v).unwrap();
        assert_eq!(back, plan.entries()[1]);
    }
}
