//! bobflow build pipeline
//!
//! This crate turns a parsed Bobfile into container images:
//! build context assembly, run-token based artifact tracking,
//! the docker backend and the sequential build/tag/push orchestrator.

pub mod backend;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod tracker;
pub mod workdir;

pub use backend::{Artifact, Backend, CommandStatus, DockerBackend};
pub use context::ContextAssembler;
pub use error::{BuildError, BuildResult, RunError};
pub use orchestrator::{BuiltImage, Orchestrator, OrchestratorConfig, RunState, RunSummary, Step};
pub use progress::{ConsoleReporter, NoopReporter, Reporter};
pub use tracker::{ArtifactTracker, DEFAULT_LABEL_KEY, RunToken};
pub use workdir::Workdir;
