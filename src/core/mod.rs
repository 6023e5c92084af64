//! Core data model: manifests, dependencies, registrations, components.

pub mod component;
pub mod dependency;
pub mod errors;
pub mod manifest;
pub mod project;
pub mod registration;
pub mod snapshot;
pub mod source_id;
pub mod target;

pub use component::{Component, ComponentKind, Reference};
pub use dependency::{Dependency, GitReference};
pub use errors::Error;
pub use manifest::Manifest;
pub use project::Project;
pub use registration::Registration;
pub use snapshot::{Snapshot, Workspace};
pub use source_id::{SourceKind, SourceUri};
pub use target::{Target, TargetKind};
