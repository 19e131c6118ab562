//! Shared types, seams and error hierarchy for toolflow.

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;
pub mod util;

pub use error::{ApiError, ConfigError, ToolError, ToolflowError};
pub use event::{Phase, StreamEvent};
pub use message::*;
pub use provider::{ChatTurn, ChunkStream, Provider, ProviderChunk};
pub use tool::*;
