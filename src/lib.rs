#![forbid(unsafe_code)]

pub mod blob;
pub mod dom;
pub mod error;
pub mod flows;
pub mod kv;
pub mod locator;
pub mod messages;
pub mod model;
pub mod overlay;
pub mod playback;
pub mod recorder;
pub mod router;
pub mod screenshot;
pub mod session;
pub mod transport;
pub mod wire;

pub use error::{Result, StepcastError};
pub use flows::FlowStore;
pub use model::{Flow, FlowId, RecordingSession, RecordingStatus, SessionState, Step, StepId, StepType, TabId};
pub use playback::PlaybackEngine;
pub use recorder::Recorder;
pub use router::Router;
pub use session::SessionManager;
pub use transport::Transport;
