//! In-memory stores filled by a load run.
//!
//! # Module Organization
//!
//! - [`registry`]: events keyed by name, with override tracking
//! - [`index`]: skill/trait reverse index and the background image index
//! - [`bad_xml`]: files rejected during ingestion
//! - [`graph`]: the parent/child trigger graph between events
//! - [`session`]: the context object owning all of the above
//!
//! ```rust
//! use cestories_core::eventbase::{IngestionSession, EventRegistry, SkillSearchIndex};
//! ```

pub mod bad_xml;
pub mod graph;
pub mod index;
pub mod registry;
pub mod session;


pub use bad_xml::BadXmlCollection;
pub use graph::{Ancestry, AncestryNode, Neighbourhood, NodeRole};
pub use index::{ImageIndex, SkillSearchIndex};
pub use registry::EventRegistry;
pub use session::IngestionSession;
