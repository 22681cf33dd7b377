use crate::error::{transport_error, Result};
use crate::model::{Flow, FlowId, RecordingStatus, Step, StepId, TabId};
use serde::{Deserialize, Serialize};

/// Request kinds crossing the page-agent/privileged-process boundary.
///
/// One variant per message kind, each with its own required-field set, so
/// the dispatcher gets compile-time exhaustiveness instead of dynamic
/// dispatch on a type string.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Request {
    StartRecording {
        #[serde(default)]
        tab_id: Option<TabId>,
    },
    StopRecording,
    PauseRecording,
    ResumeRecording,
    AddStep {
        step: Step,
    },
    AddManualStep {
        explanation: String,
        #[serde(default)]
        url: Option<String>,
    },
    UndoLastStep,
    GetRecordingState,
    CaptureScreenshot {
        tab_id: TabId,
    },
    SaveScreenshot {
        flow_id: FlowId,
        step_id: StepId,
        /// Base64-encoded image payload.
        blob: String,
    },
    DeleteScreenshots {
        flow_id: FlowId,
    },
    GetFlows,
    GetFlow {
        flow_id: FlowId,
    },
    SaveFlow {
        flow: Flow,
    },
    DeleteFlow {
        flow_id: FlowId,
    },
    ExportFlow {
        flow_id: FlowId,
    },
    ImportFlow {
        payload: serde_json::Value,
    },
}

/// Response payloads, mirroring the request kinds that produce them.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Response {
    State {
        status: RecordingStatus,
    },
    Steps {
        steps: Vec<Step>,
        #[serde(default)]
        flow_id: Option<FlowId>,
    },
    Order {
        order: u32,
    },
    Captured {
        /// Base64-encoded raw capture; the page agent post-processes it
        /// locally since only it has pixel-manipulation APIs.
        data: String,
    },
    Flows {
        flows: Vec<Flow>,
    },
    Flow {
        #[serde(default)]
        flow: Option<Flow>,
    },
    Deleted {
        deleted: bool,
    },
    Exported {
        payload: serde_json::Value,
    },
    Ack,
}

/// Uniform cross-process result. Handler failures are folded in here rather
/// than thrown, so a failed operation stays distinguishable from a
/// disconnected peer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Response>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    pub fn ok(data: Response) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Unwraps the payload, turning a soft failure into a transport-layer
    /// error the caller can match on.
    pub fn into_result(self) -> Result<Response> {
        if self.success {
            self.data
                .ok_or_else(|| transport_error("envelope succeeded without data"))
        } else {
            Err(transport_error(
                self.error.unwrap_or_else(|| "unknown failure".to_owned()),
            ))
        }
    }
}
