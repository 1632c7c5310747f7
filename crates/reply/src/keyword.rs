/// Deterministic keyword rules: ordered substring checks, first match wins,
/// templated echo when nothing matches. No external calls, so this strategy
/// carries zero latency risk and always produces a non-empty reply.
pub fn keyword_reply(tenant_name: &str, text: &str) -> String {
    if text.contains("こんにちは") || text.to_lowercase().contains("hello") {
        format!(
            "こんにちは！{}の不動産アシスタントです。何かお手伝いできることはありますか？🏠",
            tenant_name
        )
    } else if text.contains("物件") || text.contains("賃貸") {
        "お探しの物件について詳しく教えてください。予算や希望エリアなどがあれば、最適な物件をご提案いたします！"
            .to_string()
    } else if text.contains("ありがとう") {
        "どういたしまして！他にもご質問があればお気軽にどうぞ😊".to_string()
    } else {
        format!(
            "メッセージを受信しました：「{}」\n\n{}の不動産アシスタントです。物件に関するご質問をお気軽にどうぞ！",
            text, tenant_name
        )
    }
}

/// Welcome text sent when a user first follows the account.
pub fn welcome_message(tenant_name: &str) -> String {
    format!(
        "🏠 {}へようこそ！\n\n不動産に関するご質問やお部屋探しのご相談を24時間お受けしております。\n\n例えば...\n・「3万円以下の1K物件を探しています」\n・「駅近の物件はありますか？」\n・「内見の予約をしたいです」\n\nお気軽にメッセージをお送りください！",
        tenant_name
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_matches_greeting_template() {
        let reply = keyword_reply("Acme Estate", "こんにちは");
        assert!(reply.starts_with("こんにちは！"));
        assert!(reply.contains("Acme Estate"));
    }

    #[test]
    fn english_hello_matches_greeting_template() {
        let reply = keyword_reply("Acme Estate", "Hello there");
        assert!(reply.starts_with("こんにちは！"));
    }

    #[test]
    fn property_inquiry_matches_inquiry_template_not_fallback() {
        let reply = keyword_reply("Acme Estate", "物件を探しています");
        assert!(reply.contains("お探しの物件について"));
        assert!(!reply.contains("メッセージを受信しました"));
    }

    #[test]
    fn thanks_matches_thanks_template() {
        let reply = keyword_reply("Acme Estate", "ありがとうございます");
        assert!(reply.contains("どういたしまして"));
    }

    #[test]
    fn first_match_wins_over_later_rules() {
        // Contains both the greeting and the thanks keyword; greeting is
        // the earlier rule.
        let reply = keyword_reply("Acme Estate", "こんにちは、ありがとう");
        assert!(reply.starts_with("こんにちは！"));
    }

    #[test]
    fn fallback_echoes_received_text() {
        let reply = keyword_reply("Acme Estate", "営業時間は？");
        assert!(reply.contains("「営業時間は？」"));
    }

    #[test]
    fn fallback_is_non_empty_even_for_empty_input() {
        assert!(!keyword_reply("Acme Estate", "").is_empty());
    }
}
