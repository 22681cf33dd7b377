use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Maximum length of a flow name.
pub const MAX_NAME_LEN: usize = 100;
/// Maximum length of a step explanation.
pub const MAX_EXPLANATION_LEN: usize = 200;
/// Maximum length of a flow description.
pub const MAX_DESCRIPTION_LEN: usize = 500;
/// Maximum number of tags on a flow.
pub const MAX_TAGS: usize = 10;

/// Unique identifier for a flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowId(pub Uuid);

impl FlowId {
    /// Generates a fresh flow identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the raw UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for FlowId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a step within a flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepId(pub Uuid);

impl StepId {
    /// Generates a fresh step identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the raw UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for StepId {
    fn default() -> Self {
        Self::new()
    }
}

/// Browser tab that owns a recording session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabId(pub u32);

impl TabId {
    /// Returns the raw tab number.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

/// Kind of recorded action, stored lowercase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Click,
    Navigation,
    Input,
    Visibility,
    Manual,
}

/// Optional per-step metadata bag.
///
/// `screenshot_indexed_db = true` means the full-resolution image was
/// relocated to the blob store under `{flow_id}_{step_id}` and
/// `screenshot_full` is absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    /// Capture time in unix milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Inline thumbnail reference (data URL), present whenever capture succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_thumb: Option<String>,
    /// Inline full-resolution reference; absent when relocated to the blob store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_full: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub screenshot_indexed_db: bool,
    /// Hex SHA-256 of the full-resolution JPEG.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_digest: Option<String>,
}

/// One atomic recorded action or annotation.
///
/// Capturing agents emit steps with `order = 0`; the session manager is the
/// single authority that assigns the real order on acceptance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: StepId,
    #[serde(rename = "type")]
    pub step_type: StepType,
    /// Page URL at capture time; must be well-formed http/https.
    pub url: String,
    /// Human-readable description, 1 to 200 characters.
    pub explanation: String,
    pub order: u32,
    /// Durable element identifier produced by the locator, when the step has a target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default)]
    pub meta: StepMeta,
}

impl Step {
    /// Builds an unordered step; the session manager assigns the final order.
    pub fn new(step_type: StepType, url: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            id: StepId::new(),
            step_type,
            url: url.into(),
            explanation: explanation.into(),
            order: 0,
            selector: None,
            meta: StepMeta::default(),
        }
    }
}

/// Optional flow metadata.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// A named, ordered collection of steps forming a replayable walkthrough.
///
/// Invariant: `steps` are ordered by `order` and order values are dense,
/// zero-based and unique within a flow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    pub id: FlowId,
    pub name: String,
    pub created_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<OffsetDateTime>,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub meta: FlowMeta,
}

impl Flow {
    /// Assembles a flow from finalized steps, keeping their assigned order.
    pub fn from_steps(id: FlowId, name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            id,
            name: name.into(),
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
            steps,
            meta: FlowMeta::default(),
        }
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

/// Recording session state machine:
/// `idle --start--> recording --pause--> paused --resume--> recording`,
/// `recording|paused --stop--> idle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Recording,
    Paused,
}

/// Transient-but-persisted state of an in-progress recording.
///
/// The `flow_id` is assigned at start and becomes the final flow's id, so
/// oversized screenshots captured mid-session are already keyed correctly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSession {
    pub flow_id: FlowId,
    pub state: SessionState,
    pub steps: Vec<Step>,
    pub current_step_index: u32,
    pub start_time: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<TabId>,
}

impl RecordingSession {
    /// Creates a fresh session in the recording state, pinned to `tab_id`.
    pub fn new(tab_id: Option<TabId>) -> Self {
        Self {
            flow_id: FlowId::new(),
            state: SessionState::Recording,
            steps: Vec::new(),
            current_step_index: 0,
            start_time: OffsetDateTime::now_utc(),
            tab_id,
        }
    }

    /// True while the session exists as recording or paused.
    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Recording | SessionState::Paused)
    }

    /// True only when new steps may be appended.
    pub fn accepts_steps(&self) -> bool {
        self.state == SessionState::Recording
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

/// Snapshot answer to a recording-state query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStatus {
    pub is_recording: bool,
    pub step_count: usize,
    pub state: SessionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<TabId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<FlowId>,
}

impl RecordingStatus {
    /// Status reported when no session exists anywhere.
    pub fn idle() -> Self {
        Self {
            is_recording: false,
            step_count: 0,
            state: SessionState::Idle,
            tab_id: None,
            flow_id: None,
        }
    }

    /// Status snapshot of a live session.
    pub fn of(session: &RecordingSession) -> Self {
        Self {
            is_recording: session.is_active(),
            step_count: session.step_count(),
            state: session.state,
            tab_id: session.tab_id,
            flow_id: Some(session.flow_id),
        }
    }
}

/// Current unix time in milliseconds, used for step capture timestamps.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
