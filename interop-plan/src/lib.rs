#![forbid(unsafe_code)]
//! Plan compiler for the MoQT interop runner.
//!
//! Registry → [`predict`] → [`enumerate`] → [`compile`]. Everything in this crate is pure and
//! performs no I/O.

pub mod endpoints;
pub mod filters;
pub mod plan;
pub mod predict;

pub use endpoints::{enumerate, AssumeAvailable, Availability, EndpointMode, EndpointTarget, ImageCatalog, KnownImages};
pub use filters::{ModeFilter, PlanningFilters, PlanningFiltersBuilder};
pub use plan::{compile, Plan, PlanEntry, PlanningWarning};
pub use predict::{classify, highest_common, predict, Classification, Prediction};
