use crate::blob::{flow_prefix, screenshot_key, BlobStore};
use crate::error::{invalid_argument, Result};
use crate::flows::FlowStore;
use crate::messages::{Envelope, Request, Response};
use crate::model::{Step, StepType, TabId, MAX_EXPLANATION_LEN};
use crate::screenshot::CaptureBackend;
use crate::session::SessionManager;
use base64::Engine;
use std::sync::Arc;
use tracing::debug;

/// Best-effort notifications from the privileged process to the page agent.
///
/// Failures mean the agent is not loaded yet (or already gone); the session
/// outlives them and the agent catches up through `GET_RECORDING_STATE` on
/// its next load.
pub trait RecorderNotifier: Send + Sync + 'static {
    fn recording_started(&self, tab_id: Option<TabId>) -> Result<()>;
    fn recording_paused(&self) -> Result<()>;
    fn recording_resumed(&self) -> Result<()>;
    fn recording_stopped(&self) -> Result<()>;
}

/// Message dispatcher of the privileged process.
///
/// Owns the injected collaborators and maps every request kind onto them in
/// one exhaustive match. Handler errors never cross the boundary as panics
/// or thrown exceptions; they come back as `success:false` envelopes.
pub struct Router {
    sessions: Arc<SessionManager>,
    flows: Arc<FlowStore>,
    blobs: Arc<dyn BlobStore>,
    capture: Arc<dyn CaptureBackend>,
    notifier: Option<Arc<dyn RecorderNotifier>>,
}

impl Router {
    pub fn new(
        sessions: Arc<SessionManager>,
        flows: Arc<FlowStore>,
        blobs: Arc<dyn BlobStore>,
        capture: Arc<dyn CaptureBackend>,
    ) -> Self {
        Self {
            sessions,
            flows,
            blobs,
            capture,
            notifier: None,
        }
    }

    /// Attaches a page-agent notifier for lifecycle forwarding.
    pub fn with_notifier(mut self, notifier: Arc<dyn RecorderNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn flows(&self) -> &Arc<FlowStore> {
        &self.flows
    }

    /// Handles one request, folding any failure into the envelope.
    pub fn handle(&self, request: Request) -> Envelope {
        match self.dispatch(request) {
            Ok(response) => Envelope::ok(response),
            Err(err) => {
                debug!(%err, "request failed");
                Envelope::fail(err.to_string())
            }
        }
    }

    fn dispatch(&self, request: Request) -> Result<Response> {
        match request {
            Request::StartRecording { tab_id } => {
                let status = self.sessions.start_recording(tab_id)?;
                self.notify(|notifier| notifier.recording_started(status.tab_id));
                Ok(Response::State { status })
            }
            Request::StopRecording => {
                // Non-blocking: a vanished page agent must not block stop.
                self.notify(|notifier| notifier.recording_stopped());
                let flow_id = self.sessions.status()?.flow_id;
                let steps = self.sessions.stop_recording()?;
                Ok(Response::Steps { steps, flow_id })
            }
            Request::PauseRecording => {
                let status = self.sessions.pause_recording()?;
                self.notify(|notifier| notifier.recording_paused());
                Ok(Response::State { status })
            }
            Request::ResumeRecording => {
                let status = self.sessions.resume_recording()?;
                self.notify(|notifier| notifier.recording_resumed());
                Ok(Response::State { status })
            }
            Request::AddStep { step } => {
                let order = self.sessions.add_step(step)?;
                Ok(Response::Order { order })
            }
            Request::AddManualStep { explanation, url } => {
                let explanation = explanation.trim().to_owned();
                if explanation.is_empty() || explanation.chars().count() > MAX_EXPLANATION_LEN {
                    return Err(invalid_argument(format!(
                        "manual step explanation must be 1 to {MAX_EXPLANATION_LEN} characters"
                    )));
                }
                let url = url.unwrap_or_else(|| "https://unknown.invalid/".to_owned());
                let step = Step::new(StepType::Manual, url, explanation);
                let order = self.sessions.add_step(step)?;
                Ok(Response::Order { order })
            }
            Request::UndoLastStep => {
                self.sessions.undo_last_step()?;
                Ok(Response::Ack)
            }
            Request::GetRecordingState => {
                let status = self.sessions.status()?;
                Ok(Response::State { status })
            }
            Request::CaptureScreenshot { tab_id } => {
                let raw = self.capture.capture(tab_id)?;
                Ok(Response::Captured {
                    data: base64::engine::general_purpose::STANDARD.encode(raw),
                })
            }
            Request::SaveScreenshot {
                flow_id,
                step_id,
                blob,
            } => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(blob.as_bytes())
                    .map_err(|err| invalid_argument(format!("malformed blob payload: {err}")))?;
                self.blobs.put(&screenshot_key(&flow_id, &step_id), bytes)?;
                Ok(Response::Ack)
            }
            Request::DeleteScreenshots { flow_id } => {
                self.blobs.delete_prefix(&flow_prefix(&flow_id))?;
                Ok(Response::Ack)
            }
            Request::GetFlows => Ok(Response::Flows {
                flows: self.flows.get_all_flows()?,
            }),
            Request::GetFlow { flow_id } => Ok(Response::Flow {
                flow: self.flows.get_flow_by_id(&flow_id)?,
            }),
            Request::SaveFlow { flow } => Ok(Response::Flow {
                flow: Some(self.flows.save_flow(flow)?),
            }),
            Request::DeleteFlow { flow_id } => Ok(Response::Deleted {
                deleted: self.flows.delete_flow(&flow_id)?,
            }),
            Request::ExportFlow { flow_id } => Ok(Response::Exported {
                payload: self.flows.export_flow(&flow_id)?,
            }),
            Request::ImportFlow { payload } => Ok(Response::Flow {
                flow: Some(self.flows.import_flow(payload)?),
            }),
        }
    }

    fn notify(&self, call: impl Fn(&dyn RecorderNotifier) -> Result<()>) {
        if let Some(notifier) = &self.notifier {
            if let Err(err) = call(notifier.as_ref()) {
                debug!(%err, "page agent notification failed, session kept");
            }
        }
    }
}
