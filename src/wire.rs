//! Mapping to the optional team-sync REST contract.
//!
//! The remote API speaks an uppercase step-type enum and its own envelope
//! shapes; this module translates losslessly in both directions. No HTTP
//! client lives in the core.

use crate::model::{Flow, Step, StepType};
use serde::{Deserialize, Serialize};

/// Wire form of [`StepType`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApiStepType {
    Click,
    Navigation,
    Input,
    Visibility,
    Manual,
}

impl From<StepType> for ApiStepType {
    fn from(value: StepType) -> Self {
        match value {
            StepType::Click => Self::Click,
            StepType::Navigation => Self::Navigation,
            StepType::Input => Self::Input,
            StepType::Visibility => Self::Visibility,
            StepType::Manual => Self::Manual,
        }
    }
}

impl From<ApiStepType> for StepType {
    fn from(value: ApiStepType) -> Self {
        match value {
            ApiStepType::Click => Self::Click,
            ApiStepType::Navigation => Self::Navigation,
            ApiStepType::Input => Self::Input,
            ApiStepType::Visibility => Self::Visibility,
            ApiStepType::Manual => Self::Manual,
        }
    }
}

/// One step as `POST /flows` expects it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStepPayload {
    #[serde(rename = "type")]
    pub step_type: ApiStepType,
    pub url: String,
    pub explanation: String,
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl From<&Step> for ApiStepPayload {
    fn from(step: &Step) -> Self {
        Self {
            step_type: step.step_type.into(),
            url: step.url.clone(),
            explanation: step.explanation.clone(),
            order: step.order,
            meta: serde_json::to_value(&step.meta)
                .ok()
                .filter(|value| value != &serde_json::json!({})),
        }
    }
}

/// Request body for `POST /flows`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFlowRequest {
    pub name: String,
    pub steps: Vec<ApiStepPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl ApiFlowRequest {
    pub fn from_flow(flow: &Flow) -> Self {
        Self {
            name: flow.name.clone(),
            steps: flow.steps.iter().map(ApiStepPayload::from).collect(),
            meta: serde_json::to_value(&flow.meta)
                .ok()
                .filter(|value| value != &serde_json::json!({})),
        }
    }
}

/// Server-assigned ids and screenshot URLs in the 201 response.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStepResponse {
    pub id: String,
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_url: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFlowResponse {
    pub id: String,
    pub name: String,
    pub steps: Vec<ApiStepResponse>,
}

/// Structured error envelope returned with 400/401.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiErrorEnvelope {
    pub error: ApiError,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub code: String,
    pub message: String,
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_TYPES: [StepType; 5] = [
        StepType::Click,
        StepType::Navigation,
        StepType::Input,
        StepType::Visibility,
        StepType::Manual,
    ];

    #[test]
    fn step_type_mapping_is_lossless_both_ways() {
        for original in ALL_TYPES {
            let wire: ApiStepType = original.into();
            let back: StepType = wire.into();
            assert_eq!(original, back);
        }
    }

    #[test]
    fn wire_enum_serializes_uppercase() {
        let json = serde_json::to_value(ApiStepType::Navigation).expect("serialize");
        assert_eq!(json, "NAVIGATION");
        let parsed: ApiStepType = serde_json::from_value(json).expect("deserialize");
        assert_eq!(parsed, ApiStepType::Navigation);
    }

    #[test]
    fn error_envelope_uses_status_code_key() {
        let envelope = ApiErrorEnvelope {
            error: ApiError {
                code: "UNAUTHORIZED".to_owned(),
                message: "token expired".to_owned(),
                status_code: 401,
                details: None,
            },
        };
        let json = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(json["error"]["statusCode"], 401);
    }
}
