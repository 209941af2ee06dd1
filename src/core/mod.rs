pub mod controller;
pub mod engine;
pub mod keys;
pub mod progress;
pub mod walker;

pub use controller::{ControllerState, SyncController};
pub use engine::{SyncEngine, SyncOutcome, SyncReport};
pub use keys::{object_key, relative_path_for_key};
pub use progress::{
    EventChannel, NoopSink, ProgressFn, ProgressSink, ProgressUpdate, StatusFn, StatusSink,
    SyncEvent,
};
pub use walker::{LocalEntry, LocalTree};
