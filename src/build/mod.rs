//! Build pipeline: graph loading, staging, and the changeset engine.

pub mod changeset;
pub mod graph;
pub mod stage;

pub use changeset::{apply_changeset, diff, Changeset};
pub use graph::{BuildGraph, ImportGraph};
pub use stage::stage_import_graph;
