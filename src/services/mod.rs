//! Services shared by the dispatch and lifecycle layers

pub mod artifacts;
pub mod status;

pub use artifacts::{ArtifactStore, ArtifactUrl};
pub use status::{
    ChannelStatusSink, NoOpStatusSink, RecordingStatusSink, StatusEvent, StatusSink,
    StatusUpdate, TracingStatusSink,
};
