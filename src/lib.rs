//! vba-blocks - a package manager and build tool for VBA projects.
//!
//! This crate provides the core library functionality: manifest loading,
//! dependency resolution, source acquisition, build-graph staging, and the
//! changeset engine that patches target documents through the addin
//! bridge.

pub mod addin;
pub mod build;
pub mod core;
pub mod ops;
pub mod resolver;
pub mod sources;
pub mod util;

/// Mocks and fixtures for vba-blocks unit tests.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{
    Component, Dependency, Error, Manifest, Project, Registration, Snapshot, SourceUri, Target,
    TargetKind, Workspace,
};
pub use crate::resolver::{DependencyGraph, Lockfile};
pub use crate::util::GlobalContext;
