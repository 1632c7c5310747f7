use doorbot_core::types::PropertySummary;

/// Substrings that mark a message as a property-search request.
const SEARCH_KEYWORDS: &[&str] = &[
    "物件",
    "部屋",
    "探し",
    "検索",
    "紹介",
    "おすすめ",
    "1K",
    "1DK",
    "1LDK",
    "2K",
    "2DK",
    "2LDK",
    "駅近",
    "築浅",
    "ペット可",
    "バストイレ別",
];

const MAX_RECOMMENDATIONS: usize = 5;

pub fn mentions_property_search(text: &str) -> bool {
    SEARCH_KEYWORDS.iter().any(|keyword| text.contains(keyword))
}

#[derive(Debug, Clone, Default)]
pub struct PropertyQuery {
    pub budget_max: Option<i64>,
    pub floor_plan: Option<String>,
}

/// Filter the tenant inventory down to available listings matching the
/// customer's budget and floor plan, capped at five recommendations.
pub fn match_properties<'a>(
    properties: &'a [PropertySummary],
    query: &PropertyQuery,
) -> Vec<&'a PropertySummary> {
    properties
        .iter()
        .filter(|p| p.status == "available")
        .filter(|p| match (query.budget_max, p.rent_price) {
            (Some(budget), Some(rent)) => rent <= budget,
            _ => true,
        })
        .filter(|p| match (&query.floor_plan, &p.floor_plan) {
            (Some(wanted), Some(plan)) => plan.contains(wanted.as_str()),
            (Some(_), None) => false,
            (None, _) => true,
        })
        .take(MAX_RECOMMENDATIONS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn property(id: &str, rent: Option<i64>, plan: Option<&str>, status: &str) -> PropertySummary {
        PropertySummary {
            id: id.to_string(),
            title: format!("Property {}", id),
            rent_price: rent,
            floor_plan: plan.map(|s| s.to_string()),
            station: None,
            walking_minutes: None,
            status: status.to_string(),
        }
    }

    #[test]
    fn detects_search_keywords() {
        assert!(mentions_property_search("1Kの部屋を探しています"));
        assert!(mentions_property_search("おすすめはありますか"));
        assert!(!mentions_property_search("こんにちは"));
    }

    #[test]
    fn filters_by_budget_floor_plan_and_availability() {
        let props = vec![
            property("a", Some(70_000), Some("1K"), "available"),
            property("b", Some(120_000), Some("1K"), "available"),
            property("c", Some(60_000), Some("2LDK"), "available"),
            property("d", Some(50_000), Some("1K"), "rented"),
        ];
        let query = PropertyQuery {
            budget_max: Some(80_000),
            floor_plan: Some("1K".to_string()),
        };
        let matched = match_properties(&props, &query);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, "a");
    }

    #[test]
    fn unknown_rent_passes_budget_filter() {
        let props = vec![property("a", None, None, "available")];
        let query = PropertyQuery {
            budget_max: Some(50_000),
            floor_plan: None,
        };
        assert_eq!(match_properties(&props, &query).len(), 1);
    }

    #[test]
    fn caps_recommendations_at_five() {
        let props: Vec<_> = (0..10)
            .map(|i| property(&i.to_string(), Some(60_000), None, "available"))
            .collect();
        assert_eq!(match_properties(&props, &PropertyQuery::default()).len(), 5);
    }
}
