#![forbid(unsafe_code)]

//! Registry documents assembled in code.

use interop_core::Registry;
use serde_json::{json, Map, Value};

/// Remote relay endpoint of a fixture implementation.
#[derive(Debug, Clone)]
pub struct Remote {
    pub url: String,
    pub transport: &'static str,
    pub status: &'static str,
}

impl Remote {
    pub fn active(url: impl Into<String>, transport: &'static str) -> Self {
        Self { url: url.into(), transport, status: "active" }
    }

    pub fn inactive(url: impl Into<String>, transport: &'static str) -> Self {
        Self { url: url.into(), transport, status: "inactive" }
    }
}

/// One implementation entry. Clients and docker relays get `<id>-client` / `<id>-relay` images.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub id: String,
    pub versions: Vec<u32>,
    pub client: bool,
    pub relay_docker: bool,
    pub remotes: Vec<Remote>,
}

impl Fixture {
    pub fn new(id: impl Into<String>, versions: impl IntoIterator<Item = u32>) -> Self {
        Self { id: id.into(), versions: versions.into_iter().collect(), client: false, relay_docker: false, remotes: Vec::new() }
    }

    pub fn client(mut self) -> Self {
        self.client = true;
        self
    }

    pub fn docker_relay(mut self) -> Self {
        self.relay_docker = true;
        self
    }

    pub fn remote(mut self, remote: Remote) -> Self {
        self.remotes.push(remote);
        self
    }

    fn to_json(&self) -> Value {
        let mut roles = Map::new();
        if self.client {
            roles.insert("client".into(), json!({ "docker": { "image": format!("{}-client", self.id) } }));
        }
        if self.relay_docker || !self.remotes.is_empty() {
            let mut relay = Map::new();
            if self.relay_docker {
                relay.insert("docker".into(), json!({ "image": format!("{}-relay", self.id) }));
            }
            let remotes: Vec<Value> = self
                .remotes
                .iter()
                .map(|r| json!({ "url": r.url, "transport": r.transport, "status": r.status }))
                .collect();
            relay.insert("remote".into(), Value::Array(remotes));
            roles.insert("relay".into(), Value::Object(relay));
        }
        let versions: Vec<String> = self.versions.iter().map(|v| format!("draft-{v:02}")).collect();
        json!({
            "name": self.id.to_uppercase(),
            "organization": "conformance",
            "draft_versions": versions,
            "roles": roles,
        })
    }
}

pub fn registry_json(target: u32, fixtures: &[Fixture]) -> String {
    let implementations: Map<String, Value> = fixtures.iter().map(|f| (f.id.clone(), f.to_json())).collect();
    json!({ "current_target": format!("draft-{target:02}"), "implementations": implementations }).to_string()
}

/// Build and validate a registry. Panics on invalid fixtures.
pub fn registry(target: u32, fixtures: &[Fixture]) -> Registry {
    match Registry::from_json(&registry_json(target, fixtures)) {
        Ok(r) => r,
        Err(e) => panic!("fixture registry rejected: {e}"),
    }
}
