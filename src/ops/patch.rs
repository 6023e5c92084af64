//! Byte-minimal manifest patching.
//!
//! Edits to project.toml made by `export` and `target add` go through
//! toml_edit so comments, ordering, and formatting in the rest of the file
//! survive untouched.

use std::path::Path;

use anyhow::{Context, Result};
use toml_edit::{value, ArrayOfTables, DocumentMut, Item, Table};

use crate::util::fs::atomic_write;

fn load_document(manifest_path: &Path) -> Result<DocumentMut> {
    let content = crate::util::fs::read_to_string(manifest_path)?;
    content
        .parse()
        .with_context(|| format!("failed to parse {}", manifest_path.display()))
}

fn save_document(manifest_path: &Path, doc: &DocumentMut) -> Result<()> {
    atomic_write(manifest_path, doc.to_string().as_bytes())
}

fn array_of_tables<'a>(doc: &'a mut DocumentMut, key: &str) -> Result<&'a mut ArrayOfTables> {
    doc.entry(key)
        .or_insert(Item::ArrayOfTables(ArrayOfTables::new()))
        .as_array_of_tables_mut()
        .with_context(|| format!("`{}` is not an array of tables", key))
}

/// Register a component in the manifest's `[[src]]` entries.
pub fn add_source(
    manifest_path: &Path,
    name: &str,
    path: &str,
    binary: Option<&str>,
) -> Result<()> {
    let mut doc = load_document(manifest_path)?;
    let sources = array_of_tables(&mut doc, "src")?;

    let mut table = Table::new();
    table["name"] = value(name);
    table["path"] = value(path);
    if let Some(binary) = binary {
        table["binary"] = value(binary);
    }
    sources.push(table);

    save_document(manifest_path, &doc)
}

/// Drop a component from the manifest's `[[src]]` entries.
pub fn remove_source(manifest_path: &Path, name: &str) -> Result<()> {
    let mut doc = load_document(manifest_path)?;
    let sources = array_of_tables(&mut doc, "src")?;

    let mut index = 0;
    while index < sources.len() {
        let matches = sources
            .get(index)
            .and_then(|t| t.get("name"))
            .and_then(|v| v.as_str())
            .map(|n| n == name)
            .unwrap_or(false);
        if matches {
            sources.remove(index);
        } else {
            index += 1;
        }
    }

    save_document(manifest_path, &doc)
}

/// Register a new `[[targets]]` entry.
pub fn add_target(
    manifest_path: &Path,
    kind: &str,
    name: Option<&str>,
    path: Option<&str>,
    blank: bool,
) -> Result<()> {
    let mut doc = load_document(manifest_path)?;
    let targets = array_of_tables(&mut doc, "targets")?;

    let mut table = Table::new();
    table["type"] = value(kind);
    if let Some(name) = name {
        table["name"] = value(name);
    }
    if let Some(path) = path {
        table["path"] = value(path);
    }
    if blank {
        table["blank"] = value(true);
    }
    targets.push(table);

    save_document(manifest_path, &doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"# My project
[package]
name = "app"
version = "0.1.0"

# Components
[[src]]
name = "Main"
path = "src/Main.bas"
"#;

    fn manifest_fixture(tmp: &TempDir) -> std::path::PathBuf {
        let path = tmp.path().join("project.toml");
        std::fs::write(&path, MANIFEST).unwrap();
        path
    }

    #[test]
    fn test_add_source_preserves_comments() {
        let tmp = TempDir::new().unwrap();
        let path = manifest_fixture(&tmp);

        add_source(&path, "Helper", "src/Helper.cls", None).unwrap();

        let patched = std::fs::read_to_string(&path).unwrap();
        assert!(patched.contains("# My project"));
        assert!(patched.contains("# Components"));
        assert!(patched.contains("name = \"Helper\""));

        let manifest =
            crate::core::Manifest::parse(&patched, &path).unwrap();
        assert_eq!(manifest.src.len(), 2);
    }

    #[test]
    fn test_add_source_with_binary() {
        let tmp = TempDir::new().unwrap();
        let path = manifest_fixture(&tmp);

        add_source(&path, "Form1", "src/Form1.frm", Some("src/Form1.frx")).unwrap();

        let manifest = crate::core::Manifest::load(tmp.path()).unwrap();
        let entry = manifest.src.iter().find(|s| s.name == "Form1").unwrap();
        assert_eq!(entry.binary.as_deref().unwrap().to_str().unwrap(), "src/Form1.frx");
    }

    #[test]
    fn test_remove_source() {
        let tmp = TempDir::new().unwrap();
        let path = manifest_fixture(&tmp);

        remove_source(&path, "Main").unwrap();

        let patched = std::fs::read_to_string(&path).unwrap();
        assert!(!patched.contains("src/Main.bas"));
        assert!(patched.contains("# My project"));
    }

    #[test]
    fn test_add_target() {
        let tmp = TempDir::new().unwrap();
        let path = manifest_fixture(&tmp);

        add_target(&path, "xlsm", Some("report"), None, true).unwrap();

        let manifest = crate::core::Manifest::load(tmp.path()).unwrap();
        assert_eq!(manifest.targets.len(), 1);
        assert_eq!(manifest.targets[0].name, "report");
        assert!(manifest.targets[0].blank);
    }
}
