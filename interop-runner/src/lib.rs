#![forbid(unsafe_code)]

//! Execution side of the MoQT interop runner: process launching, concurrent scheduling and the
//! `moq-interop` command line surface.

pub mod cli;
pub mod launcher;
pub mod render;
pub mod scheduler;

pub use launcher::{DockerLauncher, ExecOutput, LaunchError, LaunchOptions, Launcher};
pub use scheduler::Scheduler;
