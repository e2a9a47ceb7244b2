//! # rrdsrv Core Library
//!
//! Query sanitization and path confinement for the rrdsrv export proxy.
//! This crate is the only place where an attacker-controlled query string
//! is transformed into arguments for the external `rrdtool` invocation;
//! everything around it (HTTP routing, process execution, response
//! formatting) is thin glue living in the service crate.
//!
//! ## Pipeline
//!
//! raw query → [`token::tokenize`] → [`clause::classify`] per token →
//! for `DEF` clauses: [`clause::extract_path_field`] →
//! [`confine::RrdRoot::confine`] → [`clause::rewrite_path_field`] →
//! accumulate into the sanitized argument list.
//!
//! The central invariant: no argument in the output can name a file outside
//! the configured root, regardless of how the original reference was
//! nested, escaped, or symlinked.

pub mod clause;
pub mod confine;
pub mod error;
pub mod sanitize;
pub mod token;

// Re-export commonly used types
pub use clause::ClauseKind;
pub use confine::{ConfinedPath, RrdRoot, MAX_PATH_LENGTH};
pub use error::{SanitizeError, SanitizeResult};
pub use sanitize::sanitize_xport;
pub use token::{tokenize, Token};

/// Version information for rrdsrv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default maximum accepted length for a raw query, in bytes
pub const MAX_QUERY_LENGTH: usize = 4096;
