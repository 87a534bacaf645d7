//! Gateway REST handlers: completion, provider listing, models, health.

use super::AppState;
use crate::providers::{catalog, health, ChatMessage, GatewayError, GenerationOptions};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteBody {
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<MessageBody>,
    #[serde(default)]
    pub options: GenerationOptions,
}

pub(crate) fn error_response(
    status: StatusCode,
    message: impl Into<String>,
    kind: &str,
) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({
            "error": {
                "message": message.into(),
                "type": kind,
            }
        })),
    )
}

/// Map a gateway failure onto an HTTP status and error envelope. The
/// per-backend details inside aggregate errors stay server-side in logs;
/// the caller gets one human-readable message.
pub(crate) fn gateway_error_response(error: &GatewayError) -> (StatusCode, Json<Value>) {
    match error {
        GatewayError::NotConfigured(_) => {
            error_response(StatusCode::BAD_REQUEST, error.to_string(), "configuration_error")
        }
        GatewayError::Backend { .. } => {
            error_response(StatusCode::BAD_GATEWAY, error.to_string(), "backend_error")
        }
        GatewayError::Exhausted { .. } => error_response(
            StatusCode::BAD_GATEWAY,
            error.to_string(),
            "all_backends_failed",
        ),
    }
}

fn validate_messages(
    messages: &[MessageBody],
) -> Result<Vec<ChatMessage>, (StatusCode, Json<Value>)> {
    if messages.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "messages must not be empty",
            "invalid_request_error",
        ));
    }

    let mut converted = Vec::with_capacity(messages.len());
    let mut system_seen = false;

    for message in messages {
        match message.role.as_str() {
            "system" => {
                if system_seen {
                    return Err(error_response(
                        StatusCode::BAD_REQUEST,
                        "at most one system message is allowed",
                        "invalid_request_error",
                    ));
                }
                system_seen = true;
            }
            "user" | "assistant" => {}
            other => {
                return Err(error_response(
                    StatusCode::BAD_REQUEST,
                    format!("unsupported message role \"{other}\""),
                    "invalid_request_error",
                ));
            }
        }
        converted.push(ChatMessage {
            role: message.role.clone(),
            content: message.content.clone(),
        });
    }

    Ok(converted)
}

fn completion_response(result: &crate::providers::CompletionResult) -> Json<Value> {
    Json(json!({
        "id": Uuid::new_v4().to_string(),
        "content": result.content,
        "model": result.model,
        "backend": result.backend,
        "usage": result.usage,
    }))
}

/// POST /api/complete — completion on one specific backend.
pub async fn handle_complete(
    State(state): State<AppState>,
    Json(body): Json<CompleteBody>,
) -> impl IntoResponse {
    let messages = match validate_messages(&body.messages) {
        Ok(messages) => messages,
        Err(rejection) => return rejection.into_response(),
    };

    let backend = body
        .backend
        .as_deref()
        .filter(|backend| !backend.is_empty())
        .unwrap_or_else(|| state.gateway.default_backend());

    match state
        .gateway
        .complete_on(backend, body.model.as_deref(), &messages, &body.options)
        .await
    {
        Ok(result) => completion_response(&result).into_response(),
        Err(error) => gateway_error_response(&error).into_response(),
    }
}

/// POST /api/complete-with-fallback — completion on the best available
/// backend, failing over across the fallback chain.
pub async fn handle_complete_with_fallback(
    State(state): State<AppState>,
    Json(body): Json<CompleteBody>,
) -> impl IntoResponse {
    let messages = match validate_messages(&body.messages) {
        Ok(messages) => messages,
        Err(rejection) => return rejection.into_response(),
    };

    match state
        .gateway
        .complete_with_fallback(
            body.backend.as_deref(),
            body.model.as_deref(),
            &messages,
            &body.options,
        )
        .await
    {
        Ok(result) => completion_response(&result).into_response(),
        Err(error) => gateway_error_response(&error).into_response(),
    }
}

/// GET /api/providers — configured backends with models and protocol tags.
pub async fn handle_providers(State(state): State<AppState>) -> impl IntoResponse {
    let providers = state.gateway.registry().available_backends();
    Json(json!({
        "providers": providers,
        "active_count": providers.len(),
    }))
}

/// GET /api/models — full catalog joined with availability, partitioned
/// for UI consumption.
pub async fn handle_models(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.gateway.registry();
    let partition = catalog::partition_models(|id| registry.contains(id));
    let total_models: usize = catalog::all()
        .iter()
        .map(|descriptor| descriptor.models.len())
        .sum();

    let free = catalog::free_models(|id| registry.contains(id));
    let quick_select = json!({
        "recommended_free": free.first(),
        "fastest": free
            .iter()
            .find(|model| model.speed == catalog::SpeedClass::UltraFast)
            .or_else(|| free.first()),
        "highest_quality": free
            .iter()
            .find(|model| model.quality == catalog::QualityClass::High)
            .or_else(|| free.first()),
    });

    Json(json!({
        "success": true,
        "summary": {
            "total_providers": catalog::all().len(),
            "configured_providers": registry.len(),
            "total_models": total_models,
            "available_free_models": partition.free.len(),
            "available_paid_models": partition.paid.len(),
        },
        "providers": registry.all_backends_info(),
        "models": partition,
        "quick_select": quick_select,
    }))
}

/// GET /api/health — probe every configured backend.
pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(health::probe_all(&state.gateway).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(role: &str) -> MessageBody {
        MessageBody {
            role: role.to_string(),
            content: "x".to_string(),
        }
    }

    #[test]
    fn empty_messages_are_rejected() {
        let error = validate_messages(&[]).unwrap_err();
        assert_eq!(error.0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn valid_roles_pass_through_in_order() {
        let converted =
            validate_messages(&[message("system"), message("user"), message("assistant")])
                .unwrap();
        let roles: Vec<&str> = converted.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant"]);
    }

    #[test]
    fn duplicate_system_messages_are_rejected() {
        let error = validate_messages(&[message("system"), message("system")]).unwrap_err();
        assert_eq!(error.0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unknown_roles_are_rejected() {
        let error = validate_messages(&[message("tool")]).unwrap_err();
        assert_eq!(error.0, StatusCode::BAD_REQUEST);
        let body = serde_json::to_string(&error.1 .0).unwrap();
        assert!(body.contains("tool"));
    }
}
