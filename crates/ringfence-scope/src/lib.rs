//! ringfence scope model
//!
//! Decides which files a workflow phase may touch.
//!
//! # Core Concepts
//!
//! - [`ScopePath`]: Textually normalised, segment-based path
//! - [`PathMatcher`]: Multi-level matching between two path representations
//! - [`MentionScanner`]: Finds references to known files in free text
//! - [`ScopePolicy`]: Immutable allow-set built from target paths
//!
//! # Example
//!
//! ```rust
//! use ringfence_scope::ScopePolicy;
//!
//! let policy = ScopePolicy::build("/repo", &["/repo/src/model/Order.java"]);
//! assert!(policy.is_allowed("/repo/src/model/NewDto.java"));
//! assert!(!policy.is_allowed("/repo/src/controller/Other.java"));
//! ```

pub mod matcher;
pub mod mention;
pub mod path;
pub mod policy;

pub use matcher::{MatchLevel, PathMatcher};
pub use mention::{Mention, MentionScanner};
pub use path::{PathError, ScopePath};
pub use policy::{absolute_root, Admission, ScopeEntry, ScopePolicy};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
