//! svnsift-core library.
//!
//! Filters a Subversion dump stream down to a subset of paths while keeping
//! the result loadable: copy sources, parent directories, terminal deletes
//! and merge-info references of everything kept are kept as well.
//!
//! The work happens in two passes over a seekable input:
//!
//! 1. [`engine::Model::scan`] reads every record header, builds the
//!    path-history tree and the per-event dependency graph.
//! 2. [`rewrite::rewrite`] replays the input and writes only the wanted
//!    records, with paths, revision numbers, copy sources, merge-info and
//!    length headers corrected.
//!
//! [`filter::filter_stream`] ties the two together.
//!
//! # Conventions
//!
//! - **Errors**: module-level `thiserror` enums, wrapped by [`SiftError`].
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`, `trace!`).

pub mod config;
pub mod dump;
pub mod engine;
pub mod error;
pub mod filter;
pub mod history;
pub mod mergeinfo;
pub mod rewrite;
pub mod strip;
pub mod timing;

pub use config::{FilterConfig, FilterOptions, Selection};
pub use engine::Model;
pub use error::{ErrorCode, SiftError};
pub use filter::{FilterReport, filter_dump, filter_stream};
