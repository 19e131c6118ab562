//! Tool manifests, relevance filtering and name-based dispatch for toolflow.

mod bm25;
mod dispatch;
mod handler;
mod manifest;
mod normalize;
mod remote;
mod validate;

pub use bm25::{Bm25Filter, FilterOptions, ScoredTool};
pub use dispatch::{ToolDispatcher, ToolOutcome};
pub use handler::{CustomTools, FnHandler, handler_fn};
pub use manifest::{Manifest, ManifestBuilder};
pub use normalize::normalize_result;
pub use remote::remote_descriptors;
pub use validate::validate_arguments;
