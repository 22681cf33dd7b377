use crate::dom::{Document, NodeId};
use crate::error::{invalid_argument, Result};
use crate::locator::{element_text, generate_selector, tag_name, truncate_chars};
use crate::messages::{Request, Response};
use crate::model::{
    now_millis, FlowId, SessionState, Step, StepId, StepType, TabId, MAX_EXPLANATION_LEN,
};
use crate::screenshot::{FullImage, ScreenshotPipeline};
use crate::transport::Transport;
use base64::Engine;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-page capturing agent.
///
/// Translates qualifying DOM events into step records while a recording
/// session is active, and re-attaches itself after a same-tab navigation by
/// asking the session manager for the current state on page load. The agent
/// never owns the step list; it only sends intents.
pub struct Recorder {
    transport: Arc<dyn Transport>,
    pipeline: ScreenshotPipeline,
    attached: bool,
    paused: bool,
    tab_id: Option<TabId>,
    flow_id: Option<FlowId>,
}

impl Recorder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            pipeline: ScreenshotPipeline::default(),
            attached: false,
            paused: false,
            tab_id: None,
            flow_id: None,
        }
    }

    pub fn with_pipeline(mut self, pipeline: ScreenshotPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Attaches capture listeners, remembering `tab_id` for privileged
    /// screenshot requests.
    pub async fn start(&mut self, tab_id: TabId) {
        self.attached = true;
        self.paused = false;
        self.tab_id = Some(tab_id);
        self.refresh_session_info().await;
    }

    /// Page-load hook: queries the session manager and re-attaches when a
    /// recording is in progress for this tab. This is what makes recording
    /// survive a same-tab navigation.
    pub async fn sync_with_session(&mut self) {
        let status = match self.transport.request(Request::GetRecordingState).await {
            Ok(envelope) => match envelope.into_result() {
                Ok(Response::State { status }) => status,
                _ => return,
            },
            Err(err) => {
                debug!(%err, "state query failed, staying detached");
                return;
            }
        };

        let tab_matches = match (self.tab_id, status.tab_id) {
            (Some(own), Some(owner)) => own == owner,
            _ => true,
        };
        if status.is_recording && tab_matches {
            self.attached = true;
            self.paused = status.state == SessionState::Paused;
            self.flow_id = status.flow_id;
            if self.tab_id.is_none() {
                self.tab_id = status.tab_id;
            }
        } else {
            self.detach();
        }
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Detaches all listeners and reports nothing: step authority lives with
    /// the session manager.
    pub fn stop(&mut self) {
        self.detach();
    }

    /// Unload-safe cleanup; idempotent.
    pub fn detach(&mut self) {
        self.attached = false;
        self.paused = false;
    }

    /// Capturing-phase click handler.
    ///
    /// Returns the id of the recorded step, or `None` when the click was
    /// filtered (detached, paused, overlay-owned, or a password field).
    pub async fn handle_click(&mut self, doc: &Document, node: NodeId) -> Result<Option<StepId>> {
        if !self.attached || self.paused {
            return Ok(None);
        }
        if doc.is_overlay(node) {
            return Ok(None);
        }
        if doc.is_password_input(node) {
            debug!("ignoring click on password input");
            return Ok(None);
        }

        let mut step = Step::new(
            StepType::Click,
            doc.url(),
            synthesize_click_explanation(doc, node),
        );
        step.selector = Some(generate_selector(doc, node).selector);
        step.meta.element_text = element_text(doc, node);
        step.meta.node_type = Some(tag_name(doc, node));
        step.meta.timestamp = Some(now_millis());

        // Capture failure must never block the step itself.
        if let Err(err) = self.attach_screenshot(&mut step).await {
            warn!(%err, "screenshot capture failed, recording step without it");
        }

        self.submit(step).await
    }

    /// Records a page transition as a navigation step.
    pub async fn record_navigation(&mut self, url: &str) -> Result<Option<StepId>> {
        if !self.attached || self.paused {
            return Ok(None);
        }
        let mut step = Step::new(
            StepType::Navigation,
            url,
            truncate_chars(&format!("Navigate to {url}"), MAX_EXPLANATION_LEN),
        );
        step.meta.timestamp = Some(now_millis());
        self.submit(step).await
    }

    /// Sends a manual annotation for the current page.
    ///
    /// The explanation is validated synchronously before any I/O.
    pub async fn add_manual_step(&mut self, url: &str, explanation: &str) -> Result<()> {
        let explanation = explanation.trim();
        if explanation.is_empty() || explanation.chars().count() > MAX_EXPLANATION_LEN {
            return Err(invalid_argument(format!(
                "manual step explanation must be 1 to {MAX_EXPLANATION_LEN} characters"
            )));
        }
        let envelope = self
            .transport
            .request(Request::AddManualStep {
                explanation: explanation.to_owned(),
                url: Some(url.to_owned()),
            })
            .await?;
        envelope.into_result().map(|_| ())
    }

    async fn submit(&mut self, step: Step) -> Result<Option<StepId>> {
        let step_id = step.id;
        let envelope = self.transport.request(Request::AddStep { step }).await?;
        if envelope.success {
            Ok(Some(step_id))
        } else {
            // Expected race: the session ended while this page still had
            // listeners attached.
            debug!(error = ?envelope.error, "step rejected by session manager");
            Ok(None)
        }
    }

    async fn attach_screenshot(&mut self, step: &mut Step) -> Result<()> {
        let Some(tab_id) = self.tab_id else {
            return Ok(());
        };

        let envelope = self
            .transport
            .request(Request::CaptureScreenshot { tab_id })
            .await?;
        let Response::Captured { data } = envelope.into_result()? else {
            return Ok(());
        };
        let raw = base64::engine::general_purpose::STANDARD
            .decode(data.as_bytes())
            .map_err(|err| invalid_argument(format!("malformed capture payload: {err}")))?;

        let processed = self.pipeline.process(&raw)?;
        step.meta.screenshot_thumb = Some(processed.thumb);
        step.meta.screenshot_digest = Some(processed.digest);
        match processed.full {
            FullImage::Inline(reference) => {
                step.meta.screenshot_full = Some(reference);
            }
            FullImage::Oversize(bytes) => {
                if self.flow_id.is_none() {
                    self.refresh_session_info().await;
                }
                let Some(flow_id) = self.flow_id else {
                    return Ok(());
                };
                self.transport
                    .request(Request::SaveScreenshot {
                        flow_id,
                        step_id: step.id,
                        blob: base64::engine::general_purpose::STANDARD.encode(bytes),
                    })
                    .await?
                    .into_result()?;
                step.meta.screenshot_full = None;
                step.meta.screenshot_indexed_db = true;
            }
        }
        Ok(())
    }

    async fn refresh_session_info(&mut self) {
        if let Ok(envelope) = self.transport.request(Request::GetRecordingState).await {
            if let Ok(Response::State { status }) = envelope.into_result() {
                self.flow_id = status.flow_id;
            }
        }
    }
}

/// Derives a human-readable explanation from the clicked element: button or
/// link text, input placeholder or type, then the bare tag.
pub fn synthesize_click_explanation(doc: &Document, node: NodeId) -> String {
    let tag = doc.tag(node);
    let explanation = match tag {
        "button" | "a" => match element_text(doc, node) {
            Some(text) => format!("Click {text}"),
            None => format!("Click the {tag} element"),
        },
        "input" => {
            let label = doc
                .attribute(node, "placeholder")
                .or_else(|| doc.attribute(node, "type"))
                .unwrap_or("text");
            format!("Click the {label} field")
        }
        _ => match element_text(doc, node) {
            Some(text) => format!("Click {text}"),
            None => format!("Click the {tag} element"),
        },
    };
    truncate_chars(&explanation, MAX_EXPLANATION_LEN)
}
