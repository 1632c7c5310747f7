pub mod pipeline;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use doorbot_core::hotscore::{engagement_from_messages, hot_score, score_label, HotScoreInput};
use doorbot_core::secrets::mask_secret;
use doorbot_line::ReplySender;
use doorbot_reply::ReplyGenerator;
use doorbot_store::{CredentialResolver, SqliteStore};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub store: SqliteStore,
    pub credentials: Arc<CredentialResolver>,
    pub sender: Arc<dyn ReplySender>,
    pub generator: Arc<ReplyGenerator>,
    /// Externally reachable base URL, rendered into tenant webhook URLs.
    pub public_url: String,
}

pub struct Gateway {
    state: AppState,
    bind: String,
    port: u16,
}

impl Gateway {
    pub fn new(state: AppState, bind: String, port: u16) -> Self {
        Self { state, bind, port }
    }

    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .route("/webhooks/line/:tenant_id", get(webhook_status))
            .route("/webhooks/line/:tenant_id", post(webhook_deliver))
            .route(
                "/api/tenants/:tenant_id/line-settings",
                get(get_line_settings),
            )
            // The dashboard historically used POST here; accept both.
            .route(
                "/api/tenants/:tenant_id/line-settings",
                put(put_line_settings).post(put_line_settings),
            )
            .route(
                "/api/tenants/:tenant_id/conversations",
                get(list_conversations),
            )
            .route("/api/tenants/:tenant_id/line-users", get(list_line_users))
            .with_state(state)
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        let app = Self::router(self.state.clone());
        let addr: SocketAddr = format!("{}:{}", self.bind, self.port).parse()?;
        info!("Gateway listening on {}", addr);
        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}

fn tenant_webhook_url(state: &AppState, tenant_id: &str) -> String {
    format!(
        "{}/webhooks/line/{}",
        state.public_url.trim_end_matches('/'),
        tenant_id
    )
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// Manual-verification endpoint; not part of the delivery protocol.
async fn webhook_status(Path(tenant_id): Path<String>) -> Json<Value> {
    Json(json!({
        "message": "LINE Webhook Endpoint",
        "tenantId": tenant_id,
        "status": "active",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// POST /webhooks/line/:tenant_id, the webhook delivery entry point.
///
/// Always answers 200 "OK": the platform disables (and retry-storms)
/// webhooks that return non-2xx, so every internal failure is logged
/// and swallowed here, never surfaced.
async fn webhook_deliver(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    match pipeline::process_delivery(&state, &tenant_id, &headers, &body).await {
        Ok(report) => {
            info!(
                tenant_id = %tenant_id,
                events = report.events,
                replied = report.replied,
                "webhook delivery processed"
            );
        }
        Err(skip) => {
            warn!(tenant_id = %tenant_id, reason = %skip, "webhook delivery skipped");
        }
    }
    (StatusCode::OK, "OK")
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveLineSettingsRequest {
    channel_secret: String,
    access_token: String,
}

async fn get_line_settings(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let settings = state
        .store
        .line_settings(&tenant_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let channel_secret = settings.channel_secret.filter(|s| !s.is_empty());
    let access_token = settings.access_token.filter(|s| !s.is_empty());
    let configured = channel_secret.is_some() && access_token.is_some();

    Ok(Json(json!({
        "tenantId": tenant_id,
        "configured": configured,
        "channelSecret": channel_secret.map(|s| mask_secret(&s)),
        "accessToken": access_token.map(|s| mask_secret(&s)),
        "webhookUrl": tenant_webhook_url(&state, &tenant_id),
    })))
}

async fn put_line_settings(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    Json(req): Json<SaveLineSettingsRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if req.channel_secret.is_empty() || req.access_token.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "channelSecret and accessToken are required" })),
        ));
    }

    let updated = state
        .store
        .save_line_settings(&tenant_id, &req.channel_secret, &req.access_token)
        .await
        .map_err(|e| {
            warn!(tenant_id = %tenant_id, error = %e, "failed to save LINE settings");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to save LINE settings" })),
            )
        })?;

    if !updated {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Tenant not found" })),
        ));
    }

    // Cached credentials are stale once settings change.
    state.credentials.invalidate(&tenant_id).await;

    Ok(Json(json!({
        "success": true,
        "message": "LINE settings saved successfully",
        "webhookUrl": tenant_webhook_url(&state, &tenant_id),
    })))
}

#[derive(Deserialize)]
struct PageQuery {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

async fn list_conversations(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, StatusCode> {
    let limit = query.limit.clamp(1, 200);
    let offset = query.offset.max(0);
    let conversations = state
        .store
        .conversation_history(&tenant_id, limit, offset)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(
        json!({ "tenantId": tenant_id, "conversations": conversations }),
    ))
}

/// User listing for the dashboard, each row annotated with the lead's
/// hot score so the sales side can sort by it. Response times and
/// property views are not tracked yet; those factors score zero.
async fn list_line_users(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, StatusCode> {
    let limit = query.limit.clamp(1, 200);
    let offset = query.offset.max(0);
    let users = state
        .store
        .line_users(&tenant_id, limit, offset)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let now = Utc::now();
    let mut items = Vec::with_capacity(users.len());
    for user in users {
        let messages = state
            .store
            .conversation_count(&tenant_id, &user.line_user_id)
            .await
            .unwrap_or(0);
        let budget_man_yen = state
            .store
            .customer_by_line_user(&tenant_id, &user.line_user_id)
            .await
            .ok()
            .flatten()
            .and_then(|c| c.budget_min)
            .map(|yen| yen / 10_000);

        let score = hot_score(
            &HotScoreInput {
                last_activity: user.last_interaction_at,
                response_time_minutes: None,
                engagement: engagement_from_messages(messages),
                budget_man_yen,
                property_views: 0,
                follow_up_count: 0,
            },
            now,
        );

        let mut item =
            serde_json::to_value(&user).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        item["hot_score"] = json!(score);
        item["hot_label"] = json!(score_label(score));
        items.push(item);
    }

    Ok(Json(json!({ "tenantId": tenant_id, "users": items })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::{test_state, SECRET};
    use doorbot_line::sign_body;

    #[tokio::test]
    async fn webhook_get_reports_status() {
        let Json(value) = webhook_status(Path("t1".to_string())).await;
        assert_eq!(value["tenantId"], "t1");
        assert_eq!(value["status"], "active");
        assert_eq!(value["message"], "LINE Webhook Endpoint");
        assert!(value["timestamp"].is_string());
    }

    #[tokio::test]
    async fn settings_roundtrip_returns_masked_preview() {
        let (state, _sender) = test_state().await;

        let Json(settings) = get_line_settings(State(state.clone()), Path("t1".to_string()))
            .await
            .unwrap();
        assert_eq!(settings["configured"], true);
        let masked = settings["channelSecret"].as_str().unwrap();
        assert!(masked.contains("****"));
        assert_ne!(masked, SECRET);
        assert_eq!(
            settings["webhookUrl"],
            "http://localhost:8080/webhooks/line/t1"
        );
    }

    #[tokio::test]
    async fn multibyte_secrets_preview_safely() {
        let (state, _sender) = test_state().await;
        put_line_settings(
            State(state.clone()),
            Path("t1".to_string()),
            Json(SaveLineSettingsRequest {
                channel_secret: "日本語シークレット".to_string(),
                access_token: "トークン値あいうえお".to_string(),
            }),
        )
        .await
        .unwrap();

        let Json(settings) = get_line_settings(State(state), Path("t1".to_string()))
            .await
            .unwrap();
        let masked = settings["channelSecret"].as_str().unwrap();
        assert!(masked.contains("****"));
        assert!(!masked.contains("シーク"));
    }

    #[tokio::test]
    async fn line_user_listing_annotates_hot_score() {
        let (state, _sender) = test_state().await;
        let body =
            r#"{"events":[{"type":"message","replyToken":"tok","source":{"userId":"U1"},"message":{"type":"text","text":"こんにちは"}}]}"#.as_bytes().to_vec();
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-line-signature",
            sign_body(&body, SECRET).parse().unwrap(),
        );
        webhook_deliver(
            State(state.clone()),
            Path("t1".to_string()),
            headers,
            Bytes::from(body),
        )
        .await;

        let Json(listing) = list_line_users(
            State(state),
            Path("t1".to_string()),
            Query(PageQuery {
                limit: 10,
                offset: 0,
            }),
        )
        .await
        .unwrap();
        let users = listing["users"].as_array().unwrap();
        assert_eq!(users.len(), 1);
        // One fresh message: recency band 25, every other factor zero.
        assert_eq!(users[0]["hot_score"], 25);
        assert_eq!(users[0]["hot_label"], "コールド");
        assert_eq!(users[0]["line_user_id"], "U1");
    }

    #[tokio::test]
    async fn settings_update_invalidates_cached_credentials() {
        let (state, _sender) = test_state().await;

        // Warm the cache.
        state.credentials.resolve("t1").await.unwrap();

        put_line_settings(
            State(state.clone()),
            Path("t1".to_string()),
            Json(SaveLineSettingsRequest {
                channel_secret: "new-secret".to_string(),
                access_token: "new-token".to_string(),
            }),
        )
        .await
        .unwrap();

        let fresh = state.credentials.resolve("t1").await.unwrap();
        assert_eq!(fresh.channel_secret, "new-secret");
    }

    #[tokio::test]
    async fn settings_update_rejects_unknown_tenant_and_blank_values() {
        let (state, _sender) = test_state().await;

        let err = put_line_settings(
            State(state.clone()),
            Path("ghost".to_string()),
            Json(SaveLineSettingsRequest {
                channel_secret: "s".to_string(),
                access_token: "t".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);

        let err = put_line_settings(
            State(state),
            Path("t1".to_string()),
            Json(SaveLineSettingsRequest {
                channel_secret: String::new(),
                access_token: "t".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn conversation_read_api_reflects_pipeline_writes() {
        let (state, _sender) = test_state().await;
        let body =
            r#"{"events":[{"type":"message","replyToken":"tok","source":{"userId":"U1"},"message":{"type":"text","text":"こんにちは"}}]}"#.as_bytes().to_vec();
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-line-signature",
            sign_body(&body, SECRET).parse().unwrap(),
        );
        webhook_deliver(
            State(state.clone()),
            Path("t1".to_string()),
            headers,
            Bytes::from(body),
        )
        .await;

        let Json(listing) = list_conversations(
            State(state),
            Path("t1".to_string()),
            Query(PageQuery {
                limit: 10,
                offset: 0,
            }),
        )
        .await
        .unwrap();
        let conversations = listing["conversations"].as_array().unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0]["user_message"], "こんにちは");
    }
}
