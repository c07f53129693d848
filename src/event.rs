use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Stages of a load run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Validating and binding the event files of one batch.
    Ingest { files: usize },
    ScanImages,
    ResolveAncestry,
}

/// Progress notifications relayed to the optional callback of a load run.
///
/// The `Display` form is the status line shown to users, e.g. `processing a.xml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestEvent {
    PhaseStarted(Phase),
    /// A worker began processing this file.
    FileStarted(PathBuf),
    /// The coordinator merged this file's result. `ok` is false for bad files.
    FileFinished {
        path: PathBuf,
        events: usize,
        ok: bool,
    },
    PhaseFinished(Phase),
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Ingest { files } => write!(f, "loading {files} event files"),
            Phase::ScanImages => write!(f, "scanning images"),
            Phase::ResolveAncestry => write!(f, "resolving ancestry"),
        }
    }
}

impl Display for IngestEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestEvent::PhaseStarted(phase) => write!(f, "{phase}"),
            IngestEvent::FileStarted(path) => write!(f, "processing {}", file_name(path)),
            IngestEvent::FileFinished {
                path,
                events,
                ok: true,
            } => write!(f, "loaded {} ({events} events)", file_name(path)),
            IngestEvent::FileFinished { path, ok: false, .. } => {
                write!(f, "rejected {}", file_name(path))
            }
            IngestEvent::PhaseFinished(phase) => write!(f, "done {phase}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lines() {
        assert_eq!(
            IngestEvent::FileStarted(PathBuf::from("/mods/Foo/Events/a.xml")).to_string(),
            "processing a.xml"
        );
        assert_eq!(
            IngestEvent::FileFinished {
                path: PathBuf::from("c.xml"),
                events: 0,
                ok: false
            }
            .to_string(),
            "rejected c.xml"
        );
        assert_eq!(
            IngestEvent::PhaseStarted(Phase::Ingest { files: 3 }).to_string(),
            "loading 3 event files"
        );
    }
}
