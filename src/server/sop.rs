//! SOP document handlers: generate, improve, analyze, summarize.
//!
//! Each handler composes its prompts, then routes through the fallback
//! completion path so a throttled or broken backend never blocks document
//! work while another one is available.

use super::api::{error_response, gateway_error_response};
use super::AppState;
use crate::providers::{ChatMessage, CompletionResult, GatewayError, GenerationOptions};
use crate::sop::{self, ImproveFocus, OperationProfile};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub complexity: Option<String>,
    #[serde(default)]
    pub additional_context: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentBody {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub focus: Option<ImproveFocus>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

fn profile_options(profile: OperationProfile) -> GenerationOptions {
    GenerationOptions {
        temperature: Some(profile.temperature),
        max_tokens: Some(profile.max_tokens),
        ..GenerationOptions::default()
    }
}

async fn run_operation(
    state: &AppState,
    provider: Option<&str>,
    model: Option<&str>,
    user_prompt: String,
    profile: OperationProfile,
) -> Result<CompletionResult, GatewayError> {
    let messages = [
        ChatMessage::system(sop::SYSTEM_PROMPT),
        ChatMessage::user(user_prompt),
    ];
    state
        .gateway
        .complete_with_fallback(provider, model, &messages, &profile_options(profile))
        .await
}

/// POST /api/sop/generate — create a new SOP from a topic description.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(body): Json<GenerateBody>,
) -> impl IntoResponse {
    let Some(topic) = body.topic.as_deref().filter(|topic| !topic.trim().is_empty()) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "topic is required",
            "invalid_request_error",
        )
        .into_response();
    };

    let prompt = sop::generate_prompt(
        topic,
        body.department.as_deref(),
        body.complexity.as_deref(),
        body.additional_context.as_deref(),
    );

    match run_operation(
        &state,
        body.provider.as_deref(),
        body.model.as_deref(),
        prompt,
        sop::GENERATE_PROFILE,
    )
    .await
    {
        Ok(result) => Json(json!({
            "success": true,
            "sop": result.content,
            "metadata": {
                "topic": topic,
                "department": body.department,
                "complexity": body.complexity,
                "provider": result.backend,
                "model": result.model,
            },
        }))
        .into_response(),
        Err(error) => gateway_error_response(&error).into_response(),
    }
}

/// POST /api/sop/improve — rewrite an SOP, returning the improved document
/// and the model's change feedback separately when it can be split out.
pub async fn handle_improve(
    State(state): State<AppState>,
    Json(body): Json<DocumentBody>,
) -> impl IntoResponse {
    let Some(text) = body.text.as_deref().filter(|text| !text.trim().is_empty()) else {
        return missing_text_response();
    };

    let focus = body.focus.unwrap_or_default();
    match run_operation(
        &state,
        body.provider.as_deref(),
        body.model.as_deref(),
        sop::improve_prompt(text, focus),
        sop::IMPROVE_PROFILE,
    )
    .await
    {
        Ok(result) => {
            let (document, feedback) = sop::split_improved_document(&result.content);
            Json(json!({
                "success": true,
                "improved_sop": document,
                "feedback": feedback,
                "original_length": text.len(),
                "improved_length": document.len(),
                "provider": result.backend,
                "model": result.model,
            }))
            .into_response()
        }
        Err(error) => gateway_error_response(&error).into_response(),
    }
}

/// POST /api/sop/analyze — quality assessment of an existing SOP.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(body): Json<DocumentBody>,
) -> impl IntoResponse {
    let Some(text) = body.text.as_deref().filter(|text| !text.trim().is_empty()) else {
        return missing_text_response();
    };

    match run_operation(
        &state,
        body.provider.as_deref(),
        body.model.as_deref(),
        sop::analyze_prompt(text),
        sop::ANALYZE_PROFILE,
    )
    .await
    {
        Ok(result) => Json(json!({
            "success": true,
            "analysis": result.content,
            "provider": result.backend,
            "model": result.model,
        }))
        .into_response(),
        Err(error) => gateway_error_response(&error).into_response(),
    }
}

/// POST /api/sop/summarize — executive summary of an existing SOP.
pub async fn handle_summarize(
    State(state): State<AppState>,
    Json(body): Json<DocumentBody>,
) -> impl IntoResponse {
    let Some(text) = body.text.as_deref().filter(|text| !text.trim().is_empty()) else {
        return missing_text_response();
    };

    match run_operation(
        &state,
        body.provider.as_deref(),
        body.model.as_deref(),
        sop::summarize_prompt(text),
        sop::SUMMARIZE_PROFILE,
    )
    .await
    {
        Ok(result) => Json(json!({
            "success": true,
            "summary": result.content,
            "provider": result.backend,
            "model": result.model,
        }))
        .into_response(),
        Err(error) => gateway_error_response(&error).into_response(),
    }
}

fn missing_text_response() -> axum::response::Response {
    error_response(
        StatusCode::BAD_REQUEST,
        "SOP text is required",
        "invalid_request_error",
    )
    .into_response()
}
