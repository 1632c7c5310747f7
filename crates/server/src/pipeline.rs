use crate::AppState;
use axum::http::HeaderMap;
use doorbot_core::error::DeliverySkip;
use doorbot_core::event::{parse_events, InboundEvent};
use doorbot_core::types::{ChatTurn, ConversationEntry, LineCredentials};
use doorbot_line::verify_signature;
use doorbot_reply::search::{match_properties, mentions_property_search, PropertyQuery};
use doorbot_reply::{keyword::welcome_message, ReplyContext};
use doorbot_store::CredentialError;
use tracing::{error, info, warn};

pub const SIGNATURE_HEADER: &str = "x-line-signature";

#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub events: usize,
    pub replied: usize,
}

/// Process one webhook delivery end to end.
///
/// Order matters: credentials resolve first (no secret means nothing can
/// be verified, fail closed), then the raw-body signature check, then
/// parsing. Events run sequentially in array order; a failure inside one
/// event never stops the rest of the batch.
pub async fn process_delivery(
    state: &AppState,
    tenant_id: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<DeliveryReport, DeliverySkip> {
    let credentials = state
        .credentials
        .resolve(tenant_id)
        .await
        .map_err(|e| match e {
            CredentialError::TenantNotFound => DeliverySkip::TenantNotFound,
            CredentialError::Missing => DeliverySkip::CredentialsMissing,
            CredentialError::Store(e) => {
                error!(tenant_id, error = %e, "credential lookup failed");
                DeliverySkip::CredentialLookupFailed
            }
        })?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !verify_signature(body, signature, &credentials.channel_secret) {
        warn!(tenant_id, "signature verification failed, dropping delivery");
        return Err(DeliverySkip::SignatureInvalid);
    }

    let events = parse_events(body).map_err(|e| {
        warn!(tenant_id, error = %e, "unparseable webhook payload");
        DeliverySkip::PayloadMalformed
    })?;

    let mut report = DeliveryReport {
        events: events.len(),
        replied: 0,
    };

    for event in events {
        match event {
            InboundEvent::Text {
                user_id,
                text,
                reply_token,
            } => {
                if handle_text_event(state, tenant_id, &credentials, user_id, &text, reply_token)
                    .await
                {
                    report.replied += 1;
                }
            }
            InboundEvent::Follow {
                user_id,
                reply_token,
            } => {
                handle_follow_event(state, tenant_id, &credentials, user_id, reply_token).await;
            }
            InboundEvent::Unsupported {
                event_type,
                message_type,
            } => {
                info!(tenant_id, event_type, ?message_type, "event acknowledged without reply");
            }
        }
    }

    Ok(report)
}

/// Text message flow: generate the reply, persist best-effort, send once.
/// Returns whether a reply actually went out.
async fn handle_text_event(
    state: &AppState,
    tenant_id: &str,
    credentials: &LineCredentials,
    user_id: Option<String>,
    text: &str,
    reply_token: Option<String>,
) -> bool {
    let ctx = build_reply_context(state, tenant_id, user_id.as_deref()).await;
    let reply = state.generator.generate(&ctx, text).await;

    if state.generator.wants_context() && mentions_property_search(text) {
        run_property_search(state, tenant_id, &ctx).await;
    }

    // Persistence is best-effort: a storage hiccup must not cost the
    // customer their reply.
    if let Some(user_id) = user_id.as_deref() {
        if let Err(e) = state.store.upsert_line_user(tenant_id, user_id, None).await {
            warn!(tenant_id, user_id, error = %e, "failed to upsert LINE user");
        }
        let entry = ConversationEntry::text(tenant_id, user_id, text, &reply);
        if let Err(e) = state.store.record_conversation(&entry).await {
            warn!(tenant_id, user_id, error = %e, "failed to record conversation");
        }
    }

    match reply_token {
        Some(token) => {
            // The token is single-use with a short TTL, so no retries.
            match state
                .sender
                .reply(&credentials.access_token, &token, &reply)
                .await
            {
                Ok(()) => true,
                Err(e) => {
                    error!(tenant_id, error = %e, "LINE reply failed");
                    false
                }
            }
        }
        None => {
            info!(tenant_id, "no reply token on text event, reply not sent");
            false
        }
    }
}

/// Follow flow: register the user and send the welcome text, via the
/// reply token when present, push otherwise.
async fn handle_follow_event(
    state: &AppState,
    tenant_id: &str,
    credentials: &LineCredentials,
    user_id: Option<String>,
    reply_token: Option<String>,
) {
    if let Some(user_id) = user_id.as_deref() {
        if let Err(e) = state.store.upsert_line_user(tenant_id, user_id, None).await {
            warn!(tenant_id, user_id, error = %e, "failed to upsert followed user");
        }
    }

    let tenant_name = state
        .store
        .tenant_name(tenant_id)
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| tenant_id.to_string());
    let welcome = welcome_message(&tenant_name);

    let result = match (reply_token, user_id) {
        (Some(token), _) => {
            state
                .sender
                .reply(&credentials.access_token, &token, &welcome)
                .await
        }
        (None, Some(user_id)) => {
            state
                .sender
                .push(&credentials.access_token, &user_id, &welcome)
                .await
        }
        (None, None) => return,
    };

    if let Err(e) = result {
        error!(tenant_id, error = %e, "welcome message failed");
    }
}

/// Assemble prompt context best-effort. Any lookup that fails leaves its
/// slot empty; the generator degrades gracefully on missing pieces.
async fn build_reply_context(
    state: &AppState,
    tenant_id: &str,
    user_id: Option<&str>,
) -> ReplyContext {
    let tenant_name = state
        .store
        .tenant_name(tenant_id)
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| tenant_id.to_string());

    let mut ctx = ReplyContext::bare(tenant_name);
    if !state.generator.wants_context() {
        return ctx;
    }

    if let Some(user_id) = user_id {
        match state.store.customer_by_line_user(tenant_id, user_id).await {
            Ok(customer) => ctx.customer = customer,
            Err(e) => warn!(tenant_id, user_id, error = %e, "customer lookup failed"),
        }

        match state.store.recent_exchanges(tenant_id, user_id, 5).await {
            Ok(exchanges) => {
                // Rows come newest first; the prompt wants oldest first.
                for (user_message, bot_reply) in exchanges.into_iter().rev() {
                    ctx.history.push(ChatTurn::user(user_message));
                    if let Some(reply) = bot_reply {
                        ctx.history.push(ChatTurn::assistant(reply));
                    }
                }
            }
            Err(e) => warn!(tenant_id, user_id, error = %e, "history lookup failed"),
        }
    }

    match state.store.properties(tenant_id).await {
        Ok(properties) => {
            ctx.property_count = properties.iter().filter(|p| p.status == "available").count();
        }
        Err(e) => warn!(tenant_id, error = %e, "property count lookup failed"),
    }

    ctx
}

/// Property-search sub-flow, logged for follow-up by the tenant's agents.
/// Purely additive; it never changes the reply already generated.
async fn run_property_search(state: &AppState, tenant_id: &str, ctx: &ReplyContext) {
    let properties = match state.store.properties(tenant_id).await {
        Ok(properties) => properties,
        Err(e) => {
            warn!(tenant_id, error = %e, "property search skipped");
            return;
        }
    };

    let query = match &ctx.customer {
        Some(customer) => PropertyQuery {
            budget_max: customer.budget_max,
            floor_plan: customer.desired_floor_plan.clone(),
        },
        None => PropertyQuery::default(),
    };

    let matched = match_properties(&properties, &query);
    info!(tenant_id, matched = matched.len(), "property search completed");
}
