//! Typed errors with stable kind identifiers.
//!
//! Every user-facing failure maps onto one of these variants. The kind
//! string is part of the CLI contract (scripts match on it), so variants
//! are renamed only with care. Exit codes: 1 user error, 2 resolve
//! failure, 3 I/O or bridge failure, 4 fatal restore failure.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown command `{command}`")]
    UnknownCommand { command: String },

    #[error("could not find project.toml in {path}")]
    ManifestNotFound { path: PathBuf },

    #[error("invalid project.toml at {path}: {message}")]
    ManifestInvalid { path: PathBuf, message: String },

    #[error("source `{kind}` is not supported for dependency `{name}`")]
    SourceUnsupported { kind: String, name: String },

    #[error("no registry named `{name}` is configured")]
    SourceMisconfiguredRegistry { name: String },

    #[error("no source matches dependency `{name}`")]
    SourceNoMatching { name: String },

    #[error("failed to download {url}: {message}")]
    SourceDownloadFailed { url: String, message: String },

    #[error("unrecognized source type in `{uri}`")]
    SourceUnrecognizedType { uri: String },

    #[error("dependency `{name}` not found")]
    DependencyNotFound { name: String },

    #[error(
        "checksum mismatch for `{name}`:\n  expected: {expected}\n  actual:   {actual}"
    )]
    DependencyInvalidChecksum {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("path dependency `{name}` has no manifest at {path}")]
    DependencyPathNotFound { name: String, path: PathBuf },

    #[error("dependency `{name}` has an unknown source `{source_value}`")]
    DependencyUnknownSource { name: String, source_value: String },

    #[error("invalid build graph: {message}")]
    BuildInvalid { message: String },

    #[error("failed to write lockfile to {path}: {message}")]
    LockfileWriteFailed { path: PathBuf, message: String },

    #[error("no target matches `{selector}`")]
    TargetNoMatching { selector: String },

    #[error("project has multiple targets and no default; pass --target")]
    TargetNoDefault,

    #[error("target file not found: {path}")]
    TargetNotFound { path: PathBuf },

    #[error("target {path} is open in the host application; close it and retry")]
    TargetIsOpen { path: PathBuf },

    #[error("failed to create target {path}: {message}")]
    TargetCreateFailed { path: PathBuf, message: String },

    #[error("failed to import into target {path}: {message}")]
    TargetImportFailed { path: PathBuf, message: String },

    #[error(
        "failed to restore {path} from backup {backup}; the target may be corrupt.\n\
         The backup file is retained, restore it manually"
    )]
    TargetRestoreFailed { path: PathBuf, backup: PathBuf },

    #[error("`target add` requires a target type (e.g. `vba target add xlsm`)")]
    TargetAddNoType,

    #[error("failed to resolve dependency graph:\n{detail}")]
    ResolveFailed { detail: String },

    #[error("unrecognized component extension: {path}")]
    ComponentUnrecognized { path: PathBuf },

    #[error("component {path} declares no VB_Name attribute")]
    ComponentInvalidNoName { path: PathBuf },

    #[error("script not found: {path}")]
    RunScriptNotFound { path: PathBuf },

    #[error("directory {path} already exists")]
    NewDirExists { path: PathBuf },

    #[error("`{name}` is not a valid project name: {message}")]
    NewInvalidName { name: String, message: String },

    #[error("--from file not found: {path}")]
    FromNotFound { path: PathBuf },

    #[error("project has no targets to export")]
    ExportNoTarget,

    #[error("failed to export target {path}: {message}")]
    ExportFailed { path: PathBuf, message: String },

    #[error("the addin bridge does not support `{kind}` targets")]
    AddinUnsupportedType { kind: String },
}

impl Error {
    /// Stable kind identifier for scripting and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::UnknownCommand { .. } => "unknown-command",
            Error::ManifestNotFound { .. } => "manifest-not-found",
            Error::ManifestInvalid { .. } => "manifest-invalid",
            Error::SourceUnsupported { .. } => "source-unsupported",
            Error::SourceMisconfiguredRegistry { .. } => "source-misconfigured-registry",
            Error::SourceNoMatching { .. } => "source-no-matching",
            Error::SourceDownloadFailed { .. } => "source-download-failed",
            Error::SourceUnrecognizedType { .. } => "source-unrecognized-type",
            Error::DependencyNotFound { .. } => "dependency-not-found",
            Error::DependencyInvalidChecksum { .. } => "dependency-invalid-checksum",
            Error::DependencyPathNotFound { .. } => "dependency-path-not-found",
            Error::DependencyUnknownSource { .. } => "dependency-unknown-source",
            Error::BuildInvalid { .. } => "build-invalid",
            Error::LockfileWriteFailed { .. } => "lockfile-write-failed",
            Error::TargetNoMatching { .. } => "target-no-matching",
            Error::TargetNoDefault => "target-no-default",
            Error::TargetNotFound { .. } => "target-not-found",
            Error::TargetIsOpen { .. } => "target-is-open",
            Error::TargetCreateFailed { .. } => "target-create-failed",
            Error::TargetImportFailed { .. } => "target-import-failed",
            Error::TargetRestoreFailed { .. } => "target-restore-failed",
            Error::TargetAddNoType => "target-add-no-type",
            Error::ResolveFailed { .. } => "resolve-failed",
            Error::ComponentUnrecognized { .. } => "component-unrecognized",
            Error::ComponentInvalidNoName { .. } => "component-invalid-no-name",
            Error::RunScriptNotFound { .. } => "run-script-not-found",
            Error::NewDirExists { .. } => "new-dir-exists",
            Error::NewInvalidName { .. } => "new-invalid-name",
            Error::FromNotFound { .. } => "from-not-found",
            Error::ExportNoTarget => "export-no-target",
            Error::ExportFailed { .. } => "export-failed",
            Error::AddinUnsupportedType { .. } => "addin-unsupported-type",
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ResolveFailed { .. } => 2,

            Error::SourceDownloadFailed { .. }
            | Error::DependencyInvalidChecksum { .. }
            | Error::LockfileWriteFailed { .. }
            | Error::TargetIsOpen { .. }
            | Error::TargetCreateFailed { .. }
            | Error::TargetImportFailed { .. }
            | Error::ExportFailed { .. } => 3,

            Error::TargetRestoreFailed { .. } => 4,

            _ => 1,
        }
    }
}

/// Exit code for an arbitrary error chain.
///
/// Walks the chain looking for a typed [`Error`]; plain I/O errors map to 3,
/// anything else to 1.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(typed) = cause.downcast_ref::<Error>() {
            return typed.exit_code();
        }
        if cause.downcast_ref::<std::io::Error>().is_some() {
            return 3;
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_stable() {
        let err = Error::ResolveFailed {
            detail: "conflict".into(),
        };
        assert_eq!(err.kind(), "resolve-failed");
        assert_eq!(err.exit_code(), 2);

        let err = Error::TargetRestoreFailed {
            path: "book.xlsm".into(),
            backup: "backup/book.xlsm".into(),
        };
        assert_eq!(err.kind(), "target-restore-failed");
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_exit_code_from_chain() {
        let err = anyhow::Error::new(Error::TargetIsOpen {
            path: "book.xlsm".into(),
        })
        .context("while building target");

        assert_eq!(exit_code(&err), 3);
    }

    #[test]
    fn test_exit_code_default() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(exit_code(&err), 1);
    }
}
