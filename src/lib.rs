#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

mod cache;
mod cell;
mod error;
mod inspector;
mod memoize;
mod node;
mod revision;
mod tracer;
mod tracker;
mod update;
mod value;

pub use cache::{Cache, CacheBuilder, CacheId};
pub use cell::{create_tag, Cell, Equality, Tag};
pub use error::{MemoError, TypeMismatch};
pub use inspector::{EventCollector, FlowEvent};
pub use memoize::{memoize, Memoize, MemoizeBuilder, Memoized};
pub use node::{Field, Tracked, LENGTH};
pub use revision::{current_revision, Revision};
#[cfg(feature = "tracing")]
pub use tracer::TracingTracer;
pub use tracer::{ExecutionResult, NoopTracer, SpanId, Tracer, TracerCacheKey};
pub use tracker::{is_tracking, untracked};
pub use value::{Key, Record, Value, ValueKind};
