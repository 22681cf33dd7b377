use crate::blob::{flow_prefix, screenshot_key, BlobStore};
use crate::error::{invalid_argument, not_found, Result};
use crate::kv::KvStore;
use crate::model::{
    Flow, FlowId, StepId, MAX_DESCRIPTION_LEN, MAX_EXPLANATION_LEN, MAX_NAME_LEN, MAX_TAGS,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, warn};
use url::Url;

/// Logical key the flow collection is persisted under.
const FLOWS_KEY: &str = "flows";

/// Persisted layout of the flow collection.
#[derive(Debug, Default, Serialize, Deserialize)]
struct FlowsDoc {
    flows: Vec<Flow>,
}

/// Self-contained export payload: the flow plus any full-resolution
/// screenshots that were relocated to the blob store, keyed by step id.
#[derive(Debug, Serialize, Deserialize)]
struct FlowExport {
    flow: Flow,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    screenshots: HashMap<StepId, String>,
}

/// Validated flow persistence over the key-value collaborator.
///
/// Flows mutate only by full replacement; there are no partial step edits.
/// Deleting a flow cascades into the blob store, and the two operations are
/// deliberately independent: a blob failure after the flow record is gone is
/// logged, never rolled back.
pub struct FlowStore {
    kv: Arc<dyn KvStore>,
    blobs: Arc<dyn BlobStore>,
}

impl FlowStore {
    pub fn new(kv: Arc<dyn KvStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { kv, blobs }
    }

    pub fn get_all_flows(&self) -> Result<Vec<Flow>> {
        Ok(self.load()?.flows)
    }

    pub fn get_flow_by_id(&self, id: &FlowId) -> Result<Option<Flow>> {
        Ok(self.load()?.flows.into_iter().find(|flow| flow.id == *id))
    }

    /// Validates, sanitizes and persists `flow`, replacing any flow with the
    /// same id. Stamps `updated_at`. Malformed flows are rejected before
    /// anything is written.
    pub fn save_flow(&self, mut flow: Flow) -> Result<Flow> {
        sanitize_flow(&mut flow);
        validate_flow(&flow)?;
        flow.updated_at = Some(OffsetDateTime::now_utc());

        let mut doc = self.load()?;
        match doc.flows.iter_mut().find(|existing| existing.id == flow.id) {
            Some(slot) => *slot = flow.clone(),
            None => doc.flows.push(flow.clone()),
        }
        self.store(&doc)?;
        Ok(flow)
    }

    /// Removes a flow and cascade-deletes its blob-store screenshots.
    pub fn delete_flow(&self, id: &FlowId) -> Result<bool> {
        let mut doc = self.load()?;
        let before = doc.flows.len();
        doc.flows.retain(|flow| flow.id != *id);
        if doc.flows.len() == before {
            debug!(flow_id = %id.0, "delete ignored, flow not found");
            return Ok(false);
        }
        self.store(&doc)?;

        // Second half of a two-key operation; tolerated if it fails.
        if let Err(err) = self.blobs.delete_prefix(&flow_prefix(id)) {
            warn!(flow_id = %id.0, %err, "flow deleted but blob cleanup failed");
        }
        Ok(true)
    }

    /// Exports a flow as a self-contained JSON value, embedding any
    /// blob-relocated screenshots as base64.
    pub fn export_flow(&self, id: &FlowId) -> Result<serde_json::Value> {
        let flow = self
            .get_flow_by_id(id)?
            .ok_or_else(|| not_found(format!("flow {}", id.0)))?;

        let mut screenshots = HashMap::new();
        for step in &flow.steps {
            if step.meta.screenshot_indexed_db {
                if let Some(bytes) = self.blobs.get(&screenshot_key(&flow.id, &step.id))? {
                    screenshots.insert(
                        step.id,
                        base64::engine::general_purpose::STANDARD.encode(bytes),
                    );
                }
            }
        }
        Ok(serde_json::to_value(FlowExport { flow, screenshots })?)
    }

    /// Imports an exported payload (or a bare flow object), regenerating the
    /// flow id and `created_at` so it cannot collide with an existing flow.
    /// Embedded screenshots are re-homed under the new id.
    pub fn import_flow(&self, payload: serde_json::Value) -> Result<Flow> {
        let export: FlowExport = match serde_json::from_value(payload.clone()) {
            Ok(export) => export,
            Err(_) => FlowExport {
                flow: serde_json::from_value(payload)
                    .map_err(|err| invalid_argument(format!("malformed flow payload: {err}")))?,
                screenshots: HashMap::new(),
            },
        };

        let mut flow = export.flow;
        flow.id = FlowId::new();
        flow.created_at = OffsetDateTime::now_utc();
        flow.updated_at = None;

        let saved = self.save_flow(flow)?;
        for (step_id, encoded) in export.screenshots {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded.as_bytes())
                .map_err(|err| invalid_argument(format!("malformed screenshot data: {err}")))?;
            self.blobs.put(&screenshot_key(&saved.id, &step_id), bytes)?;
        }
        Ok(saved)
    }

    fn load(&self) -> Result<FlowsDoc> {
        match self.kv.get(FLOWS_KEY)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(FlowsDoc::default()),
        }
    }

    fn store(&self, doc: &FlowsDoc) -> Result<()> {
        self.kv.set(FLOWS_KEY, serde_json::to_value(doc)?)
    }
}

/// In-place cleanup before validation: trims strings, drops empty tags and
/// restores the dense zero-based step order.
pub fn sanitize_flow(flow: &mut Flow) {
    flow.name = flow.name.trim().to_owned();
    if let Some(description) = flow.meta.description.take() {
        let trimmed = description.trim().to_owned();
        if !trimmed.is_empty() {
            flow.meta.description = Some(trimmed);
        }
    }
    if let Some(tags) = flow.meta.tags.take() {
        let cleaned: Vec<String> = tags
            .into_iter()
            .map(|tag| tag.trim().to_owned())
            .filter(|tag| !tag.is_empty())
            .collect();
        if !cleaned.is_empty() {
            flow.meta.tags = Some(cleaned);
        }
    }

    flow.steps.sort_by_key(|step| step.order);
    for (index, step) in flow.steps.iter_mut().enumerate() {
        step.order = index as u32;
        step.explanation = step.explanation.trim().to_owned();
    }
}

/// Structural validation enforced before any write.
pub fn validate_flow(flow: &Flow) -> Result<()> {
    if flow.name.is_empty() || flow.name.chars().count() > MAX_NAME_LEN {
        return Err(invalid_argument(format!(
            "flow name must be 1 to {MAX_NAME_LEN} characters"
        )));
    }
    if let Some(description) = &flow.meta.description {
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(invalid_argument(format!(
                "description exceeds {MAX_DESCRIPTION_LEN} characters"
            )));
        }
    }
    if let Some(tags) = &flow.meta.tags {
        if tags.len() > MAX_TAGS {
            return Err(invalid_argument(format!("at most {MAX_TAGS} tags allowed")));
        }
    }
    for step in &flow.steps {
        if step.explanation.is_empty() || step.explanation.chars().count() > MAX_EXPLANATION_LEN {
            return Err(invalid_argument(format!(
                "step explanation must be 1 to {MAX_EXPLANATION_LEN} characters"
            )));
        }
        validate_step_url(&step.url)?;
    }
    Ok(())
}

/// Step URLs must be well-formed http or https.
pub fn validate_step_url(raw: &str) -> Result<()> {
    let parsed =
        Url::parse(raw).map_err(|err| invalid_argument(format!("invalid step url: {err}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid_argument(format!(
            "step url scheme must be http or https, got {other}"
        ))),
    }
}
