#![forbid(unsafe_code)]

//! Immutable planning filters.

use interop_core::{ConfigError, ConfigResult, Registry, Transport, ROLE_CLIENT, ROLE_RELAY};

use crate::Classification;

/// Which endpoint kinds are planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeFilter {
    #[default]
    All,
    DockerOnly,
    RemoteOnly,
}

impl ModeFilter {
    pub fn allows_docker(self) -> bool {
        self != ModeFilter::RemoteOnly
    }

    pub fn allows_remote(self) -> bool {
        self != ModeFilter::DockerOnly
    }
}

/// Filters applied while compiling a plan. Built once, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanningFilters {
    mode: ModeFilter,
    transport: Option<Transport>,
    classification: Option<Classification>,
    clients: Vec<String>,
    relays: Vec<String>,
}

impl PlanningFilters {
    pub fn builder() -> PlanningFiltersBuilder {
        PlanningFiltersBuilder::default()
    }

    pub fn mode(&self) -> ModeFilter {
        self.mode
    }

    pub fn transport(&self) -> Option<Transport> {
        self.transport
    }

    pub fn classification(&self) -> Option<Classification> {
        self.classification
    }

    pub fn allows_transport(&self, transport: Transport) -> bool {
        self.transport.map_or(true, |t| t == transport)
    }

    pub fn allows_classification(&self, classification: Classification) -> bool {
        self.classification.map_or(true, |c| c == classification)
    }

    /// An empty list admits every client.
    pub fn allows_client(&self, id: &str) -> bool {
        self.clients.is_empty() || self.clients.iter().any(|c| c == id)
    }

    pub fn allows_relay(&self, id: &str) -> bool {
        self.relays.is_empty() || self.relays.iter().any(|r| r == id)
    }

    /// Reject name filters that match no implementation in the required role.
    pub fn check_names(&self, registry: &Registry) -> ConfigResult<()> {
        let check = |ids: &[String], role: &str| {
            for id in ids {
                if !registry.get(id).is_some_and(|imp| imp.has_role(role)) {
                    return Err(ConfigError::UnknownImplementation { id: id.clone(), role: role.to_string() });
                }
            }
            Ok(())
        };
        check(&self.clients, ROLE_CLIENT)?;
        check(&self.relays, ROLE_RELAY)
    }
}

#[derive(Debug, Default)]
pub struct PlanningFiltersBuilder {
    docker_only: bool,
    remote_only: bool,
    transport: Option<Transport>,
    classifications: Vec<Classification>,
    clients: Vec<String>,
    relays: Vec<String>,
}

impl PlanningFiltersBuilder {
    pub fn docker_only(mut self, yes: bool) -> Self {
        self.docker_only = yes;
        self
    }

    pub fn remote_only(mut self, yes: bool) -> Self {
        self.remote_only = yes;
        self
    }

    pub fn transport(mut self, transport: Option<Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Request a single classification. Calling this for more than one value fails `build`.
    pub fn only(mut self, classification: Classification) -> Self {
        if !self.classifications.contains(&classification) {
            self.classifications.push(classification);
        }
        self
    }

    pub fn clients<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clients.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn relays<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relays.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> ConfigResult<PlanningFilters> {
        let mode = match (self.docker_only, self.remote_only) {
            (true, true) => {
                return Err(ConfigError::ConflictingFilters(
                    "docker-only and remote-only cannot be combined".into(),
                ))
            }
            (true, false) => ModeFilter::DockerOnly,
            (false, true) => ModeFilter::RemoteOnly,
            (false, false) => ModeFilter::All,
        };
        if self.classifications.len() > 1 {
            let names: Vec<_> = self.classifications.iter().map(|c| format!("only-{c}")).collect();
            return Err(ConfigError::ConflictingFilters(format!(
                "at most one classification filter may be active, got {}",
                names.join(", ")
            )));
        }
        Ok(PlanningFilters {
            mode,
            transport: self.transport,
            classification: self.classifications.into_iter().next(),
            clients: self.clients,
            relays: self.relays,
        })
    }
}
