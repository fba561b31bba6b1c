#![forbid(unsafe_code)]

//! Core types shared by the MoQT interop runner: the implementation registry, draft version
//! identifiers, runner configuration and error types.

pub mod config;
pub mod error;
pub mod registry;
pub mod version;

pub use config::{DockerSettings, RunnerConfig, CONFIG_ENV};
pub use error::{ConfigError, ConfigIssue, ConfigResult};
pub use registry::{
    BuildSpec, DockerRef, EndpointStatus, Implementation, Registry, RemoteEndpoint, RoleConfig, Transport,
    ROLE_CLIENT, ROLE_RELAY,
};
pub use version::DraftVersion;
