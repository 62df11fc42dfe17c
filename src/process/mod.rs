//! Process supervision module

pub mod backoff;
pub mod launch;
pub mod supervisor;

pub use backoff::RestartPolicy;
pub use launch::{LaunchArtifact, LaunchPlan, Readiness};
pub use supervisor::{ProcessSupervisor, SupervisorOptions};
