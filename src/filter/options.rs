/// Filter option sets served by `GET /api/options`.
///
/// Every category is optional on the wire. A missing or `null` category
/// deserializes to an empty list so a partial payload still populates the
/// categories it does carry.
use serde::{Deserialize, Deserializer, Serialize};

/// Available values for every filter category, plus the dates that have data.
///
/// Immutable once fetched; a refresh replaces the whole value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub agents: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub bidding_methods: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub targetings: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub resources: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub materials: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub benefits: Vec<String>,
    /// ISO `YYYY-MM-DD` dates, in whatever order the server sent them.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub dates: Vec<String>,
}

impl FilterOptions {
    /// Earliest and latest available date, or `None` when there are no dates.
    ///
    /// ISO dates order lexicographically, so this is min/max rather than
    /// first/last of the server's list.
    pub fn date_range(&self) -> Option<(&str, &str)> {
        let min = self.dates.iter().filter(|d| !d.is_empty()).min()?;
        let max = self.dates.iter().filter(|d| !d.is_empty()).max()?;
        Some((min.as_str(), max.as_str()))
    }

    /// True when no category carries any value.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
            && self.bidding_methods.is_empty()
            && self.targetings.is_empty()
            && self.resources.is_empty()
            && self.materials.is_empty()
            && self.benefits.is_empty()
            && self.dates.is_empty()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Option<Vec<Option<String>>> = Option::deserialize(deserializer)?;
    Ok(values.unwrap_or_default().into_iter().flatten().collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_range_uses_min_and_max_not_first_and_last() {
        let options = FilterOptions {
            dates: vec![
                "2024-01-01".to_string(),
                "2024-01-15".to_string(),
                "2024-01-10".to_string(),
            ],
            ..Default::default()
        };
        assert_eq!(options.date_range(), Some(("2024-01-01", "2024-01-15")));
    }

    #[test]
    fn date_range_is_none_without_dates() {
        assert_eq!(FilterOptions::default().date_range(), None);
    }

    #[test]
    fn missing_and_null_categories_deserialize_empty() {
        let json = r#"{ "agents": ["奇异果", "哇棒"], "targetings": null }"#;
        let options: FilterOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.agents, vec!["奇异果", "哇棒"]);
        assert!(options.targetings.is_empty());
        assert!(options.dates.is_empty());
        assert!(!options.is_empty());
    }

    #[test]
    fn null_entries_inside_a_category_are_dropped() {
        let json = r#"{ "resources": ["feed", null, "search"] }"#;
        let options: FilterOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.resources, vec!["feed", "search"]);
    }
}
