use crate::keyword::keyword_reply;
use crate::{CompletionError, CompletionOptions, CompletionProvider};
use doorbot_core::types::{ChatTurn, CustomerProfile};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

/// Maximum number of prior conversation turns included in the prompt.
const MAX_HISTORY_TURNS: usize = 5;

/// Returned when the completion collaborator came back empty.
const APOLOGY_WAIT: &str = "申し訳ございません。少々お待ちください。";
/// Returned when the completion collaborator errored or timed out.
const APOLOGY_FAILURE: &str =
    "申し訳ございません。現在システムに問題が発生しております。しばらく後に再度お試しください。";

/// Everything the generator may draw on for one reply. Built best-effort
/// by the caller; missing pieces degrade the prompt, never the pipeline.
#[derive(Debug, Clone)]
pub struct ReplyContext {
    pub tenant_name: String,
    pub customer: Option<CustomerProfile>,
    /// Prior turns, oldest first.
    pub history: Vec<ChatTurn>,
    pub property_count: usize,
}

impl ReplyContext {
    pub fn bare(tenant_name: impl Into<String>) -> Self {
        Self {
            tenant_name: tenant_name.into(),
            customer: None,
            history: Vec::new(),
            property_count: 0,
        }
    }
}

/// Produces the reply text for an inbound message. Total function: every
/// input yields a non-empty string, and no strategy failure escapes.
pub enum ReplyGenerator {
    Keyword,
    Completion {
        provider: Arc<dyn CompletionProvider>,
        options: CompletionOptions,
        call_timeout: Duration,
    },
}

impl ReplyGenerator {
    /// Whether this generator consults conversation history and customer
    /// facts; the keyword strategy needs neither.
    pub fn wants_context(&self) -> bool {
        matches!(self, ReplyGenerator::Completion { .. })
    }

    pub async fn generate(&self, ctx: &ReplyContext, user_message: &str) -> String {
        match self {
            ReplyGenerator::Keyword => keyword_reply(&ctx.tenant_name, user_message),
            ReplyGenerator::Completion {
                provider,
                options,
                call_timeout,
            } => {
                let system_prompt = build_system_prompt(ctx);
                let mut turns: Vec<ChatTurn> = if ctx.history.len() > MAX_HISTORY_TURNS {
                    ctx.history[ctx.history.len() - MAX_HISTORY_TURNS..].to_vec()
                } else {
                    ctx.history.clone()
                };
                turns.push(ChatTurn::user(user_message));

                match timeout(*call_timeout, provider.complete(&system_prompt, &turns, options))
                    .await
                {
                    Ok(Ok(text)) => {
                        let text = text.trim().to_string();
                        if text.is_empty() {
                            APOLOGY_WAIT.to_string()
                        } else {
                            text
                        }
                    }
                    Ok(Err(CompletionError::Empty)) => {
                        warn!("completion returned empty reply, using wait apology");
                        APOLOGY_WAIT.to_string()
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, "completion failed, using fallback apology");
                        APOLOGY_FAILURE.to_string()
                    }
                    Err(_) => {
                        warn!(timeout_secs = call_timeout.as_secs(), "completion timed out");
                        APOLOGY_FAILURE.to_string()
                    }
                }
            }
        }
    }
}

fn build_system_prompt(ctx: &ReplyContext) -> String {
    let customer = ctx.customer.clone().unwrap_or_default();
    let unset = "未設定".to_string();

    let budget = match (customer.budget_min, customer.budget_max) {
        (Some(min), Some(max)) => format!("{}円〜{}円", min, max),
        _ => unset.clone(),
    };

    format!(
        "あなたは不動産仲介会社「{tenant}」のAI営業担当です。以下の指針に従って顧客対応を行ってください：\n\n\
         ## 基本方針\n\
         - 親しみやすく、丁寧な敬語で対応\n\
         - 24時間即レス対応を心がける\n\
         - 物件紹介・内見予約・資料請求に積極的に誘導\n\
         - 具体的な数字と詳細な情報を提供\n\
         - 200文字以内で簡潔に回答\n\n\
         ## 顧客情報\n\
         - 名前: {name}\n\
         - 予算: {budget}\n\
         - 希望エリア: {area}\n\
         - 間取り: {plan}\n\
         - ステータス: {status}\n\n\
         ## 利用可能な物件数: {count}件\n\n\
         返信は親しみやすく、行動を促すような内容にしてください。\n\
         物件検索の際は、条件を詳しく聞き出してからおすすめ物件を提案してください。",
        tenant = ctx.tenant_name,
        name = customer.name.unwrap_or_else(|| unset.clone()),
        budget = budget,
        area = customer.desired_area.unwrap_or_else(|| unset.clone()),
        plan = customer.desired_floor_plan.unwrap_or_else(|| unset.clone()),
        status = customer.status.unwrap_or(unset),
        count = ctx.property_count,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FailingProvider;

    #[async_trait]
    impl CompletionProvider for FailingProvider {
        async fn complete(
            &self,
            _system_prompt: &str,
            _turns: &[ChatTurn],
            _options: &CompletionOptions,
        ) -> Result<String, CompletionError> {
            Err(CompletionError::Network("connection refused".to_string()))
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl CompletionProvider for SlowProvider {
        async fn complete(
            &self,
            _system_prompt: &str,
            _turns: &[ChatTurn],
            _options: &CompletionOptions,
        ) -> Result<String, CompletionError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".to_string())
        }
    }

    struct EchoProvider;

    #[async_trait]
    impl CompletionProvider for EchoProvider {
        async fn complete(
            &self,
            _system_prompt: &str,
            turns: &[ChatTurn],
            _options: &CompletionOptions,
        ) -> Result<String, CompletionError> {
            Ok(format!("{}:{}", turns.len(), turns.last().unwrap().content))
        }
    }

    fn completion_generator(provider: Arc<dyn CompletionProvider>) -> ReplyGenerator {
        ReplyGenerator::Completion {
            provider,
            options: CompletionOptions::default(),
            call_timeout: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn keyword_strategy_handles_any_input() {
        let gen = ReplyGenerator::Keyword;
        let ctx = ReplyContext::bare("Acme Estate");
        for input in ["", "こんにちは", &"あ".repeat(10_000), "\u{fffd}\u{0000}"] {
            let reply = gen.generate(&ctx, input).await;
            assert!(!reply.is_empty());
        }
    }

    #[tokio::test]
    async fn provider_failure_degrades_to_apology() {
        let gen = completion_generator(Arc::new(FailingProvider));
        let reply = gen.generate(&ReplyContext::bare("Acme"), "物件ありますか").await;
        assert_eq!(reply, APOLOGY_FAILURE);
    }

    #[tokio::test]
    async fn provider_timeout_degrades_to_apology() {
        let gen = completion_generator(Arc::new(SlowProvider));
        let reply = gen.generate(&ReplyContext::bare("Acme"), "hi").await;
        assert_eq!(reply, APOLOGY_FAILURE);
    }

    #[tokio::test]
    async fn history_window_keeps_last_five_turns() {
        let gen = completion_generator(Arc::new(EchoProvider));
        let mut ctx = ReplyContext::bare("Acme");
        for i in 0..20 {
            ctx.history.push(ChatTurn::user(format!("q{}", i)));
            ctx.history.push(ChatTurn::assistant(format!("a{}", i)));
        }
        // Five windowed turns plus the appended current message.
        let reply = gen.generate(&ctx, "current").await;
        assert_eq!(reply, "6:current");
    }

    #[tokio::test]
    async fn system_prompt_embeds_customer_facts() {
        let mut ctx = ReplyContext::bare("Acme Estate");
        ctx.customer = Some(CustomerProfile {
            name: Some("田中太郎".to_string()),
            budget_min: Some(80_000),
            budget_max: Some(120_000),
            desired_area: Some("新宿区".to_string()),
            desired_floor_plan: Some("1K".to_string()),
            status: Some("active".to_string()),
        });
        ctx.property_count = 12;
        let prompt = build_system_prompt(&ctx);
        assert!(prompt.contains("田中太郎"));
        assert!(prompt.contains("80000円〜120000円"));
        assert!(prompt.contains("新宿区"));
        assert!(prompt.contains("12件"));
        assert!(prompt.contains("Acme Estate"));
    }
}
