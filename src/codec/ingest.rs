//! Parallel validation and binding of event files into an [`IngestionSession`].
//!
//! Workers never touch the session. The batch is cut into chunks that run as tasks on a rayon
//! pool; each task validates and binds its files on its own and sends the finished results back
//! over a bounded channel. The calling thread is the only writer of the registry, the skill
//! index and the bad xml collection.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use once_cell::sync::OnceCell;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::{
    codec::{
        binder::{Bind, EventBinder},
        diagnostic::BadXml,
        schema::SchemaValidator,
        skills::{SkillIndexExtractor, SkillRecord},
    },
    error::CeError,
    event::{IngestEvent, Phase},
    eventbase::IngestionSession,
    properties::Event,
};

/// Optional progress sink. Called on the thread that invoked [`BatchIngestor::ingest`].
pub type ProgressCallback<'p> = Option<&'p mut dyn FnMut(&IngestEvent)>;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Everything one file contributed, computed without access to shared state.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<FileContents, CeError>,
}

#[derive(Debug, Default)]
pub struct FileContents {
    pub events: Vec<Event>,
    pub skills: Vec<SkillRecord>,
}

enum WorkerMessage {
    Started(PathBuf),
    Finished(FileOutcome),
    Panicked { path: PathBuf, message: String },
}

/// Fans event files out to a pool of worker threads and merges their results.
///
/// Workers are threads of one process: validation and binding run truly in parallel, so there
/// is no need for separate worker processes.
///
/// ```rust,no_run
/// use cestories_core::{
///     codec::{BatchIngestor, EventBinder, SchemaValidator},
///     eventbase::IngestionSession,
/// };
/// # fn main() -> Result<(), cestories_core::CeError> {
/// let schema = SchemaValidator::from_file("CEEventsModal.xsd")?;
/// let mut session = IngestionSession::new();
/// let files = vec!["Events/a.xml".into(), "Events/b.xml".into()];
/// let bad = BatchIngestor::new(&schema, &EventBinder).ingest(&files, &mut session, None)?;
/// println!("{bad} bad files, {} events", session.registry.len());
/// # Ok(())
/// # }
/// ```
pub struct BatchIngestor<'a> {
    schema: &'a SchemaValidator,
    binder: &'a dyn Bind,
    extractor: SkillIndexExtractor,
    workers: usize,
    poll_interval: Duration,
    pool: OnceCell<ThreadPool>,
}

impl<'a> BatchIngestor<'a> {
    pub fn new(schema: &'a SchemaValidator, binder: &'a dyn Bind) -> Self {
        BatchIngestor {
            schema,
            binder,
            extractor: SkillIndexExtractor,
            workers: rayon::current_num_threads(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            pool: OnceCell::new(),
        }
    }

    /// Ingestor using the stock [`EventBinder`].
    pub fn with_event_binder(schema: &'a SchemaValidator) -> Self {
        BatchIngestor::new(schema, &EventBinder)
    }

    /// Number of worker threads. Zero is treated as one.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self.pool = OnceCell::new();
        self
    }

    /// How long the coordinator waits for a message while files are still waiting for a worker.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// Validates and binds `files`, merging results into `session` as they arrive.
    ///
    /// Returns the number of files that failed; each of them has an entry in
    /// `session.bad_xml`. Events of every good file are in the registry whatever happened to the
    /// others. The session is never cleared here, so consecutive calls accumulate.
    ///
    /// Only a broken worker pool (it could not be built, a worker panicked or went away before
    /// reporting all of its files) produces an `Err`.
    pub fn ingest(
        &self,
        files: &[PathBuf],
        session: &mut IngestionSession,
        mut progress: ProgressCallback<'_>,
    ) -> Result<usize, CeError> {
        let phase = Phase::Ingest { files: files.len() };
        notify(&mut progress, IngestEvent::PhaseStarted(phase.clone()));
        if files.is_empty() {
            notify(&mut progress, IngestEvent::PhaseFinished(phase));
            return Ok(0);
        }

        let pool = self.pool()?;
        let workers = self.workers.min(files.len());
        let chunk_size = (files.len() / workers).max(1);
        tracing::debug!(
            "[BatchIngestor::ingest] {} files, {} workers, chunks of {}",
            files.len(),
            workers,
            chunk_size
        );

        let (tx, rx) = crossbeam_channel::bounded::<WorkerMessage>(workers * 2);
        let errors = pool.in_place_scope(|scope| {
            for chunk in files.chunks(chunk_size) {
                let tx = tx.clone();
                scope.spawn(move |_| self.work(chunk, tx));
            }
            drop(tx);
            self.collect(rx, files.len(), session, &mut progress)
        })?;
        notify(&mut progress, IngestEvent::PhaseFinished(phase));

        tracing::info!(
            "[BatchIngestor::ingest] {} files processed, {} rejected",
            files.len(),
            errors
        );
        Ok(errors)
    }

    /// Validates and binds a single file on the current thread.
    pub fn process_file(&self, path: &Path) -> FileOutcome {
        let result = self.read_file(path);
        if let Err(e) = &result {
            tracing::debug!("[BatchIngestor::process_file] {:?}: {}", path, e);
        }
        FileOutcome {
            path: path.to_path_buf(),
            result,
        }
    }

    fn pool(&self) -> Result<&ThreadPool, CeError> {
        self.pool.get_or_try_init(|| {
            ThreadPoolBuilder::new()
                .num_threads(self.workers)
                .thread_name(|id| format!("ce-ingest-{id}"))
                .build()
                .map_err(|e| {
                    CeError::IngestionInfrastructure(format!(
                        "unable to start ingestion workers: {e}"
                    ))
                })
        })
    }

    fn read_file(&self, path: &Path) -> Result<FileContents, CeError> {
        let document = self.schema.validate_and_bind(path)?;
        let mut contents = FileContents::default();
        for bound in document {
            let (element, xml_source) = bound.into_parts();
            let mut event = self.binder.bind(&element)?;
            event.set_provenance(xml_source, path.to_path_buf());
            contents
                .skills
                .extend(self.extractor.extract(&event, &event.name)?);
            contents.events.push(event);
        }
        Ok(contents)
    }

    // A panic stays inside the task; the coordinator turns the report into an error.
    fn work(&self, chunk: &[PathBuf], tx: Sender<WorkerMessage>) {
        for path in chunk {
            if tx.send(WorkerMessage::Started(path.clone())).is_err() {
                return;
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.process_file(path)));
            let message = match outcome {
                Ok(outcome) => WorkerMessage::Finished(outcome),
                Err(payload) => WorkerMessage::Panicked {
                    path: path.clone(),
                    message: panic_message(payload.as_ref()),
                },
            };
            let stop = matches!(message, WorkerMessage::Panicked { .. });
            if tx.send(message).is_err() || stop {
                return;
            }
        }
    }

    /// Coordinator loop. Polls while some files have not been picked up yet so start
    /// notifications are relayed promptly, then blocks until every file has reported.
    fn collect(
        &self,
        rx: Receiver<WorkerMessage>,
        expected: usize,
        session: &mut IngestionSession,
        progress: &mut ProgressCallback<'_>,
    ) -> Result<usize, CeError> {
        let disconnected = |finished: usize| {
            CeError::IngestionInfrastructure(format!(
                "ingestion workers stopped after {finished} of {expected} files"
            ))
        };
        let mut started = 0;
        let mut finished = 0;
        let mut errors = 0;
        while finished < expected {
            let message = if started == expected {
                rx.recv().map_err(|_| disconnected(finished))?
            } else {
                match rx.recv_timeout(self.poll_interval) {
                    Ok(message) => message,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => return Err(disconnected(finished)),
                }
            };
            match message {
                WorkerMessage::Started(path) => {
                    started += 1;
                    notify(progress, IngestEvent::FileStarted(path));
                }
                WorkerMessage::Finished(outcome) => {
                    finished += 1;
                    if !merge(outcome, session, progress) {
                        errors += 1;
                    }
                }
                WorkerMessage::Panicked { path, message } => {
                    tracing::error!("[BatchIngestor::collect] worker panicked on {:?}", path);
                    return Err(CeError::IngestionInfrastructure(format!(
                        "ingestion worker panicked on {}: {message}",
                        path.display()
                    )));
                }
            }
        }
        Ok(errors)
    }
}

/// Applies one file's outcome to the session. Returns false for a rejected file.
pub fn merge(
    outcome: FileOutcome,
    session: &mut IngestionSession,
    progress: &mut ProgressCallback<'_>,
) -> bool {
    let FileOutcome { path, result } = outcome;
    match result {
        Ok(contents) => {
            let events = contents.events.len();
            for event in contents.events {
                session.registry.insert(event);
            }
            for record in &contents.skills {
                session.skills.record(record);
            }
            tracing::debug!("[merge] {:?}: {} events", path, events);
            notify(
                progress,
                IngestEvent::FileFinished {
                    path,
                    events,
                    ok: true,
                },
            );
            true
        }
        Err(error) => {
            session.bad_xml.push(BadXml::from_error(&path, &error));
            notify(
                progress,
                IngestEvent::FileFinished {
                    path,
                    events: 0,
                    ok: false,
                },
            );
            false
        }
    }
}

/// Shortens the callback borrow so it can be handed to several calls in turn.
pub(crate) fn reborrow<'b>(progress: &'b mut ProgressCallback<'_>) -> ProgressCallback<'b> {
    match progress {
        Some(callback) => Some(&mut **callback),
        None => None,
    }
}

pub(crate) fn notify(progress: &mut ProgressCallback<'_>, event: IngestEvent) {
    if let Some(callback) = progress {
        callback(&event);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
