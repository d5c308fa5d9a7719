//! Drawsync Core Library
//!
//! Mirrors drawings between chart sessions running in the same process.

pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod normalize;
pub mod registry;
pub mod runtime;
pub mod snapshot;

pub use config::{Mode, ObjectType, SyncConfig, YAxisType};
pub use engine::{
    ApplyReport, BroadcastOutcome, SessionStats, SuppressReason, SyncBatch, SyncSession,
};
pub use error::{ConfigError, HostError, SyncError};
pub use host::{ChangeKind, Chart, ChartIdentity, ChartListener, ChartObject, MemoryChart};
pub use normalize::{VerticalMap, VisibleRange, map_absolute, map_delta};
pub use registry::{Registry, SessionRegistry};
pub use runtime::{ChannelDispatcher, ChartLoop, Dispatcher, LoopHandle};
pub use snapshot::{Drawing, ObjectKind, ObjectProperties, Snapshot};
