//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use std::{fs, io, path::Path, path::PathBuf};
use tempfile::TempDir;

use cestories_core::codec::SchemaValidator;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

#[allow(dead_code)]
pub fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

#[allow(dead_code)]
pub fn schema() -> SchemaValidator {
    SchemaValidator::from_file(fixtures().join("CEEventsModal.xsd")).unwrap()
}

#[allow(dead_code)]
pub fn copy_dir_all(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> io::Result<()> {
    fs::create_dir_all(&dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let ty = entry.file_type()?;
        if ty.is_dir() {
            copy_dir_all(entry.path(), dst.as_ref().join(entry.file_name()))?;
        } else {
            fs::copy(entry.path(), dst.as_ref().join(entry.file_name()))?;
        }
    }
    Ok(())
}

/// Copies the `CaptiveTales` fixture module into `temp_dir` and returns its root.
///
/// The module holds `a.xml` ("Intro", triggering "Capture"), `b.xml` ("Capture", triggering the
/// undefined "Escape") and the malformed `c.xml`.
#[allow(dead_code)]
pub fn copy_fixture_module(temp_dir: &TempDir) -> PathBuf {
    let root = temp_dir.path().join("CaptiveTales");
    copy_dir_all(fixtures().join("CaptiveTales"), &root).unwrap();
    root
}

/// Serialized `<CEEvent>` with one option per trigger target.
#[allow(dead_code)]
pub fn event_xml(name: &str, triggers: &[&str]) -> String {
    let options: String = triggers
        .iter()
        .enumerate()
        .map(|(order, target)| {
            format!(
                "<Option><Order>{order}</Order><OptionText>To {target}</OptionText>\
                 <TriggerEventName>{target}</TriggerEventName></Option>"
            )
        })
        .collect();
    let options = if options.is_empty() {
        options
    } else {
        format!("<Options>{options}</Options>")
    };
    format!("<CEEvent><Name>{name}</Name>{options}</CEEvent>")
}

/// Writes a `<CEEvents>` file holding the given events into `dir`.
#[allow(dead_code)]
pub fn write_events(dir: &Path, file: &str, events: &[String]) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(file);
    fs::write(&path, format!("<CEEvents>{}</CEEvents>", events.concat())).unwrap();
    path
}
