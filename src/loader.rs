//! A complete load run over a list of modules.
//!
//! [`ModuleLoader::load`] resets the session, ingests the modules one at a time in priority
//! order, scans their background images and finally resolves ancestry. Ingesting module by module
//! makes overrides deterministic: an event defined by two modules always ends up with the
//! definition of the module listed later, whatever order the workers finish in.

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    codec::{
        ingest::{notify, reborrow},
        AncestryResolver, BatchIngestor, Bind, EventBinder, ProgressCallback, SchemaValidator,
    },
    config::Settings,
    error::CeError,
    event::{IngestEvent, Phase},
    eventbase::IngestionSession,
    paths::ModulePath,
};

/// Counts describing the outcome of a load run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub modules: Vec<PathBuf>,
    pub files: usize,
    pub events: usize,
    pub bad_files: usize,
    pub ancestry_errors: usize,
    pub overrides: usize,
    pub images: usize,
}

impl LoadReport {
    /// True when every file was valid and every trigger name resolved.
    pub fn is_clean(&self) -> bool {
        self.bad_files == 0 && self.ancestry_errors == 0
    }
}

pub struct ModuleLoader<B: Bind = EventBinder> {
    schema: SchemaValidator,
    binder: B,
    workers: Option<usize>,
    poll_interval: Option<Duration>,
}

impl ModuleLoader<EventBinder> {
    pub fn new(schema: SchemaValidator) -> Self {
        ModuleLoader::with_binder(schema, EventBinder)
    }

    /// Loads the configured schema and worker count.
    pub fn from_settings(settings: &Settings) -> Result<Self, CeError> {
        let schema = SchemaValidator::from_file(settings.schema_path()?)?;
        let mut loader = ModuleLoader::new(schema);
        loader.workers = settings.workers;
        Ok(loader)
    }
}

impl<B: Bind> ModuleLoader<B> {
    pub fn with_binder(schema: SchemaValidator, binder: B) -> Self {
        ModuleLoader {
            schema,
            binder,
            workers: None,
            poll_interval: None,
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn schema(&self) -> &SchemaValidator {
        &self.schema
    }

    fn ingestor(&self) -> BatchIngestor<'_> {
        let mut ingestor = BatchIngestor::new(&self.schema, &self.binder);
        if let Some(workers) = self.workers {
            ingestor = ingestor.workers(workers);
        }
        if let Some(interval) = self.poll_interval {
            ingestor = ingestor.poll_interval(interval);
        }
        ingestor
    }

    /// Resets `session` and runs every stage over `modules`.
    pub fn load(
        &self,
        modules: &[ModulePath],
        session: &mut IngestionSession,
        mut progress: ProgressCallback<'_>,
    ) -> Result<LoadReport, CeError> {
        session.reset();
        let (files, bad_files) = self.ingest_modules(modules, session, reborrow(&mut progress))?;
        let images = self.scan_images(modules, session, reborrow(&mut progress))?;
        let ancestry_errors = self.resolve(session, reborrow(&mut progress));

        let report = LoadReport {
            modules: modules.iter().map(|m| m.root().to_path_buf()).collect(),
            files,
            events: session.registry.len(),
            bad_files,
            ancestry_errors,
            overrides: session.registry.overrides().len(),
            images,
        };
        tracing::info!(
            "Loaded {} events from {} files ({} bad files, {} unresolved references)",
            report.events,
            report.files,
            report.bad_files,
            report.ancestry_errors
        );
        Ok(report)
    }

    /// One ingest call per module, in the given order, into the same session. Returns the number
    /// of files seen and the number rejected.
    pub fn ingest_modules(
        &self,
        modules: &[ModulePath],
        session: &mut IngestionSession,
        mut progress: ProgressCallback<'_>,
    ) -> Result<(usize, usize), CeError> {
        let ingestor = self.ingestor();
        let mut files = 0;
        let mut bad_files = 0;
        for module in modules {
            let events_files = module.events_files()?;
            tracing::info!(
                "Module '{}': {} event files",
                module.name(),
                events_files.len()
            );
            files += events_files.len();
            bad_files += ingestor.ingest(&events_files, session, reborrow(&mut progress))?;
        }
        Ok((files, bad_files))
    }

    pub fn scan_images(
        &self,
        modules: &[ModulePath],
        session: &mut IngestionSession,
        mut progress: ProgressCallback<'_>,
    ) -> Result<usize, CeError> {
        notify(&mut progress, IngestEvent::PhaseStarted(Phase::ScanImages));
        let mut images = 0;
        for module in modules {
            images += session.images.scan_module(module)?;
        }
        notify(&mut progress, IngestEvent::PhaseFinished(Phase::ScanImages));
        Ok(images)
    }

    pub fn resolve(
        &self,
        session: &mut IngestionSession,
        mut progress: ProgressCallback<'_>,
    ) -> usize {
        notify(&mut progress, IngestEvent::PhaseStarted(Phase::ResolveAncestry));
        let missing = AncestryResolver.resolve(session);
        notify(&mut progress, IngestEvent::PhaseFinished(Phase::ResolveAncestry));
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::{event_xml, events_document, fixture_schema, init_logging};
    use std::{fs, path::Path};
    use tempfile::tempdir;

    fn module(root: &Path, files: &[(&str, String)]) -> ModulePath {
        fs::create_dir_all(root.join("Events")).unwrap();
        for (name, text) in files {
            fs::write(root.join("Events").join(name), text).unwrap();
        }
        ModulePath::open(root).unwrap()
    }

    #[test]
    fn later_module_wins_overrides() {
        init_logging();
        let dir = tempdir().unwrap();
        let base = module(
            &dir.path().join("Base"),
            &[
                ("a.xml", events_document(&[event_xml("Intro", &["Capture"])])),
                ("b.xml", events_document(&[event_xml("Capture", &[])])),
            ],
        );
        let addon = module(
            &dir.path().join("Addon"),
            &[("z.xml", events_document(&[event_xml("Intro", &[])]))],
        );

        let loader = ModuleLoader::new(fixture_schema()).workers(4);
        let mut session = IngestionSession::new();
        for _ in 0..3 {
            let report = loader
                .load(&[base.clone(), addon.clone()], &mut session, None)
                .unwrap();
            assert_eq!(report.files, 3);
            assert_eq!(report.events, 2);
            assert_eq!(report.overrides, 1);
            assert!(report.is_clean());
            let intro = session.registry.get("Intro").unwrap();
            assert!(intro.xml_file.as_deref().unwrap().ends_with("Addon/Events/z.xml"));
            assert!(!session.ancestry.get("Intro").unwrap().is_graphable());
        }
    }

    #[test]
    fn phases_are_reported_in_order() {
        let dir = tempdir().unwrap();
        let only = module(
            &dir.path().join("Only"),
            &[("a.xml", events_document(&[event_xml("Intro", &[])]))],
        );
        fs::create_dir_all(dir.path().join("Only/Images")).unwrap();
        fs::write(dir.path().join("Only/Images/Intro_bg.png"), b"").unwrap();

        let loader = ModuleLoader::new(fixture_schema());
        let mut session = IngestionSession::new();
        let mut phases = Vec::new();
        let mut callback = |event: &IngestEvent| match event {
            IngestEvent::PhaseStarted(_) | IngestEvent::PhaseFinished(_) => {
                phases.push(event.to_string())
            }
            _ => {}
        };
        let report = loader.load(&[only], &mut session, Some(&mut callback)).unwrap();
        assert_eq!(report.images, 1);
        assert!(session.images.get("Intro_bg").is_some());
        assert_eq!(
            phases,
            [
                "loading 1 event files",
                "done loading 1 event files",
                "scanning images",
                "done scanning images",
                "resolving ancestry",
                "done resolving ancestry",
            ]
        );
    }

    #[test]
    fn from_settings_requires_a_schema() {
        let settings = Settings::default();
        assert!(matches!(
            ModuleLoader::from_settings(&settings),
            Err(CeError::NotFound(_))
        ));
    }
}
