//! Turning event files into events.
//!
//! ## Key Components
//!
//! - [`SchemaValidator`] - Loads an XSD and validates documents against it, producing owned
//!   object trees ([`BoundDocument`]) that keep each top-level element's source text
//! - [`Bind`] trait / [`EventBinder`] - Maps one object tree onto an [`Event`](crate::properties::Event)
//! - [`SkillIndexExtractor`] - Collects the skill and trait ids an event refers to
//! - [`BatchIngestor`] - Runs the three above over many files on a worker pool and merges the
//!   results into an [`IngestionSession`](crate::eventbase::IngestionSession)
//! - [`AncestryResolver`] - Links events to the events their options trigger
//! - [`diagnostic`] - Bad files, dangling trigger names and registry overrides
//!
//! ## Two Passes
//!
//! Events routinely trigger events defined later in the same file, in another file or in
//! another module. Ingestion therefore never looks names up; it only fills the registry.
//! Resolution runs once everything is loaded, so only names missing from the complete registry
//! are reported as [`EventAncestryError`]s.
//!
//! ```rust,no_run
//! use cestories_core::{
//!     codec::{AncestryResolver, BatchIngestor, SchemaValidator},
//!     eventbase::IngestionSession,
//! };
//! # fn main() -> Result<(), cestories_core::CeError> {
//! let schema = SchemaValidator::from_file("CEEventsModal.xsd")?;
//! let mut session = IngestionSession::new();
//! let files = vec!["Events/a.xml".into()];
//! BatchIngestor::with_event_binder(&schema).ingest(&files, &mut session, None)?;
//! let dangling = AncestryResolver.resolve(&mut session);
//! # Ok(())
//! # }
//! ```

pub mod binder;
pub mod diagnostic;
pub mod element;
pub mod ingest;
pub mod resolver;
pub mod schema;
pub mod skills;

pub use binder::{Bind, EventBinder};
pub use diagnostic::{BadXml, EventAncestryError, Override};
pub use element::{BoundDocument, BoundElement, RawElement};
pub use ingest::{BatchIngestor, FileContents, FileOutcome, ProgressCallback};
pub use resolver::AncestryResolver;
pub use schema::SchemaValidator;
pub use skills::{SkillIndexExtractor, SkillRecord, SkillSource};
