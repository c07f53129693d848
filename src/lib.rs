//! # cestories-core
//!
//! A Rust library for loading Captivity Events content packs: schema validation of event XML
//! files, binding into typed events, a skill/trait reverse index and the trigger graph between
//! events.
//!
//! ## Overview
//!
//! A content pack (a "module") ships XML files under `Events/`, each holding a list of
//! `CEEvent` elements. Events reference each other by name through the `TriggerEventName`
//! fields of their options, and reference game skills and traits through requirement and
//! progression fields. cestories-core validates every file against the pack's XSD, turns every
//! event into an [`Event`](properties::Event), and then links events by name once all of them
//! are known.
//!
//! ### Key Features
//!
//! - **Schema validation**: XSD subset loader and validator with line-accurate messages
//! - **Error tolerance**: bad files are collected and reported, the rest of the batch loads
//! - **Parallel ingestion**: a worker pool validates and binds files, one thread merges results
//! - **Two-pass linking**: forward references across files and modules resolve normally
//! - **Deterministic overrides**: modules load in priority order, later modules win
//!
//! ## Architecture
//!
//! - **[`codec`]**: validation, binding, skill extraction, batch ingestion, ancestry resolution
//! - **[`eventbase`]**: the containers a load run fills (`EventRegistry`, `SkillSearchIndex`,
//!   `BadXmlCollection`, `Ancestry`) and the `IngestionSession` owning them
//! - **[`properties`]**: the event data model
//! - **[`event`]**: progress notifications
//! - **[`paths`]**: module directory validation
//! - **[`config`]**: persisted settings
//! - **[`loader`]**: a complete load run over configured modules
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cestories_core::{
//!     codec::SchemaValidator, eventbase::IngestionSession, loader::ModuleLoader,
//!     paths::ModulePath,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let schema = SchemaValidator::from_file("zCaptivityEvents/ModuleLoader/CEEventsModal.xsd")?;
//!     let modules = vec![ModulePath::open("Modules/zCaptivityEvents")?];
//!
//!     let mut session = IngestionSession::new();
//!     let report = ModuleLoader::new(schema).load(&modules, &mut session, None)?;
//!
//!     for bad in session.bad_xml.iter() {
//!         println!("{bad}");
//!     }
//!     for missing in &session.ancestry_errors {
//!         println!("{missing}");
//!     }
//!     println!("{} events", report.events);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **default**: the library
//! - **bin**: the `cestories` command line tool

pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod eventbase;
pub mod loader;
pub mod paths;
pub mod properties;
#[cfg(test)]
mod tests;

pub use error::*;
