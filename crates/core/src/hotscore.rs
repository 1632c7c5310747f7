use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Weighted engagement score for a customer, 0–100. Purely a ranking
/// heuristic for the sales side; never used for correctness-critical logic.
#[derive(Debug, Clone)]
pub struct HotScoreInput {
    pub last_activity: DateTime<Utc>,
    /// Average response time in minutes; None when not tracked, which
    /// scores the factor zero.
    pub response_time_minutes: Option<i64>,
    pub engagement: EngagementLevel,
    /// Lower bound of the stated budget, in units of 10,000 yen.
    pub budget_man_yen: Option<i64>,
    pub property_views: u32,
    pub follow_up_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementLevel {
    Low,
    Medium,
    High,
}

pub fn hot_score(input: &HotScoreInput, now: DateTime<Utc>) -> u8 {
    let total = recent_activity_score(input.last_activity, now)
        + response_speed_score(input.response_time_minutes)
        + engagement_score(input.engagement)
        + budget_score(input.budget_man_yen)
        + (input.property_views * 5).min(25)
        + (input.follow_up_count * 3).min(15);
    total.min(100) as u8
}

fn recent_activity_score(last_activity: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let hours = (now - last_activity).num_hours();
    match hours {
        h if h <= 1 => 25,
        h if h <= 6 => 20,
        h if h <= 24 => 15,
        h if h <= 72 => 10,
        h if h <= 168 => 5,
        _ => 0,
    }
}

fn response_speed_score(minutes: Option<i64>) -> u32 {
    match minutes {
        Some(m) if m <= 5 => 20,
        Some(m) if m <= 15 => 15,
        Some(m) if m <= 60 => 10,
        Some(m) if m <= 120 => 5,
        _ => 0,
    }
}

/// Map a user's message volume onto an engagement band, for callers that
/// only have the conversation log to go on.
pub fn engagement_from_messages(count: i64) -> EngagementLevel {
    match count {
        c if c >= 10 => EngagementLevel::High,
        c if c >= 3 => EngagementLevel::Medium,
        _ => EngagementLevel::Low,
    }
}

fn engagement_score(level: EngagementLevel) -> u32 {
    match level {
        EngagementLevel::High => 20,
        EngagementLevel::Medium => 10,
        EngagementLevel::Low => 0,
    }
}

fn budget_score(budget_man_yen: Option<i64>) -> u32 {
    match budget_man_yen {
        None => 0,
        Some(b) if b >= 15 => 15,
        Some(b) if b >= 12 => 12,
        Some(b) if b >= 10 => 10,
        Some(b) if b >= 8 => 8,
        Some(_) => 5,
    }
}

pub fn score_label(score: u8) -> &'static str {
    match score {
        80..=u8::MAX => "ホット",
        60..=79 => "ウォーム",
        40..=59 => "ミディアム",
        _ => "コールド",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn base_input(now: DateTime<Utc>) -> HotScoreInput {
        HotScoreInput {
            last_activity: now - Duration::hours(2),
            response_time_minutes: Some(5),
            engagement: EngagementLevel::High,
            budget_man_yen: Some(10),
            property_views: 8,
            follow_up_count: 3,
        }
    }

    #[test]
    fn active_responsive_customer_scores_hot() {
        let now = Utc::now();
        // 20 + 20 + 20 + 10 + 25 + 9 = 104, clamped (views capped at 25)
        let score = hot_score(&base_input(now), now);
        assert_eq!(score, 100);
        assert_eq!(score_label(score), "ホット");
    }

    #[test]
    fn stale_customer_scores_cold() {
        let now = Utc::now();
        let input = HotScoreInput {
            last_activity: now - Duration::days(30),
            response_time_minutes: Some(240),
            engagement: EngagementLevel::Low,
            budget_man_yen: None,
            property_views: 0,
            follow_up_count: 0,
        };
        let score = hot_score(&input, now);
        assert_eq!(score, 0);
        assert_eq!(score_label(score), "コールド");
    }

    #[test]
    fn factor_caps_hold() {
        let now = Utc::now();
        let mut input = base_input(now);
        input.property_views = 1000;
        input.follow_up_count = 1000;
        // 20 + 20 + 20 + 10 + 25 + 15 = 110, clamped
        assert_eq!(hot_score(&input, now), 100);
    }

    #[test]
    fn budget_bands_match_tiers() {
        assert_eq!(budget_score(Some(16)), 15);
        assert_eq!(budget_score(Some(12)), 12);
        assert_eq!(budget_score(Some(10)), 10);
        assert_eq!(budget_score(Some(8)), 8);
        assert_eq!(budget_score(Some(3)), 5);
        assert_eq!(budget_score(None), 0);
    }

    #[test]
    fn untracked_response_time_scores_zero() {
        let now = Utc::now();
        let mut input = base_input(now);
        input.response_time_minutes = None;
        // 20 + 0 + 20 + 10 + 25 + 9 = 84 (base case minus the speed factor)
        assert_eq!(hot_score(&input, now), 84);
    }

    #[test]
    fn engagement_bands_from_message_counts() {
        assert_eq!(engagement_from_messages(0), EngagementLevel::Low);
        assert_eq!(engagement_from_messages(2), EngagementLevel::Low);
        assert_eq!(engagement_from_messages(3), EngagementLevel::Medium);
        assert_eq!(engagement_from_messages(10), EngagementLevel::High);
    }

    #[test]
    fn label_bands() {
        assert_eq!(score_label(85), "ホット");
        assert_eq!(score_label(65), "ウォーム");
        assert_eq!(score_label(45), "ミディアム");
        assert_eq!(score_label(10), "コールド");
    }
}
