/// Filter selection and its wire serialization.
///
/// [`FilterState`] is the single source of truth for what the user has
/// selected: a date range, five single-select filters and a multi-select
/// targeting list. [`FilterState::to_query_params`] turns it into the exact
/// parameter set the statistics endpoint expects:
///
/// | Parameter        | Unset value | Encoding                    |
/// |------------------|-------------|-----------------------------|
/// | `date_from`      | `""`        | ISO date                    |
/// | `date_to`        | `""`        | ISO date                    |
/// | `agent`          | `"all"`     | selected value              |
/// | `bidding_method` | `"all"`     | selected value              |
/// | `targeting`      | `""`        | comma-joined, in order      |
/// | `resource`       | `"all"`     | selected value              |
/// | `material`       | `"all"`     | selected value              |
/// | `benefit`        | `"all"`     | selected value              |
pub mod options;

use std::fmt;
use std::str::FromStr;

use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

pub use options::FilterOptions;

/// Sentinel value meaning "no restriction" for a single-select filter.
pub const ALL: &str = "all";

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

/// A single-valued filter field, named by its query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    DateFrom,
    DateTo,
    Agent,
    BiddingMethod,
    Resource,
    Material,
    Benefit,
}

impl FilterField {
    pub const ALL_FIELDS: [FilterField; 7] = [
        Self::DateFrom,
        Self::DateTo,
        Self::Agent,
        Self::BiddingMethod,
        Self::Resource,
        Self::Material,
        Self::Benefit,
    ];

    /// Query parameter name.
    pub fn param_name(self) -> &'static str {
        match self {
            Self::DateFrom => "date_from",
            Self::DateTo => "date_to",
            Self::Agent => "agent",
            Self::BiddingMethod => "bidding_method",
            Self::Resource => "resource",
            Self::Material => "material",
            Self::Benefit => "benefit",
        }
    }

    /// Whether the field is a date bound rather than a category filter.
    pub fn is_date(self) -> bool {
        matches!(self, Self::DateFrom | Self::DateTo)
    }

    /// The option category a category filter must be a member of.
    fn category<'a>(self, options: &'a FilterOptions) -> Option<&'a [String]> {
        match self {
            Self::DateFrom | Self::DateTo => None,
            Self::Agent => Some(&options.agents),
            Self::BiddingMethod => Some(&options.bidding_methods),
            Self::Resource => Some(&options.resources),
            Self::Material => Some(&options.materials),
            Self::Benefit => Some(&options.benefits),
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.param_name())
    }
}

impl FromStr for FilterField {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL_FIELDS
            .into_iter()
            .find(|field| field.param_name() == s)
            .ok_or_else(|| FilterError::UnknownField(s.to_string()))
    }
}

/// Errors raised when mutating a [`FilterState`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("unknown filter field '{0}'")]
    UnknownField(String),
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// The user's current filter selection.
///
/// Created once per session with every filter unset and mutated in place by
/// user actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    date_from: Option<String>,
    date_to: Option<String>,
    agent: Option<String>,
    bidding_method: Option<String>,
    resource: Option<String>,
    material: Option<String>,
    benefit: Option<String>,
    targeting: Vec<String>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt a freshly fetched option set.
    ///
    /// Sets the date range to the span of available dates (when there are
    /// any) and drops targeting selections the new options no longer offer.
    /// Single-select filters are left alone.
    pub fn initialize_from_options(&mut self, options: &FilterOptions) {
        if let Some((first, last)) = options.date_range() {
            self.date_from = Some(first.to_string());
            self.date_to = Some(last.to_string());
        }
        self.targeting
            .retain(|value| options.targetings.iter().any(|t| t == value));
    }

    /// Set a single-select field by its parameter name.
    ///
    /// Unknown names are rejected and leave the state untouched.
    pub fn update(&mut self, field: &str, value: &str) -> Result<(), FilterError> {
        let field = field.parse::<FilterField>()?;
        self.update_field(field, value);
        Ok(())
    }

    /// Set a single-select field. An empty value clears it.
    pub fn update_field(&mut self, field: FilterField, value: &str) {
        let value = value.trim();
        let value = (!value.is_empty()).then(|| value.to_string());
        *self.slot_mut(field) = value;
    }

    /// Current value of a field, `None` when unset.
    pub fn get(&self, field: FilterField) -> Option<&str> {
        self.slot(field).as_deref()
    }

    /// Replace the targeting selection wholesale.
    ///
    /// Duplicates are dropped keeping the first occurrence, so display order
    /// follows the caller's order.
    pub fn set_targeting<I, S>(&mut self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targeting.clear();
        for value in values {
            let value = value.into();
            if !value.is_empty() && !self.targeting.contains(&value) {
                self.targeting.push(value);
            }
        }
    }

    pub fn clear_targeting(&mut self) {
        self.targeting.clear();
    }

    pub fn targeting(&self) -> &[String] {
        &self.targeting
    }

    /// Reset every filter except the date range.
    pub fn reset_filters(&mut self) {
        for field in FilterField::ALL_FIELDS {
            if !field.is_date() {
                *self.slot_mut(field) = None;
            }
        }
        self.targeting.clear();
    }

    /// Category filters whose selected value is not offered by `options`.
    pub fn violations(&self, options: &FilterOptions) -> Vec<FilterField> {
        FilterField::ALL_FIELDS
            .into_iter()
            .filter(|&field| {
                let (Some(value), Some(category)) = (self.get(field), field.category(options))
                else {
                    return false;
                };
                value != ALL && !category.iter().any(|c| c == value)
            })
            .collect()
    }

    /// Serialize to the statistics endpoint's query parameters.
    pub fn to_query_params(&self) -> QueryParams {
        let scalar = |field: FilterField| self.get(field).unwrap_or(ALL).to_string();
        let date = |field: FilterField| self.get(field).unwrap_or_default().to_string();

        QueryParams(vec![
            ("date_from", date(FilterField::DateFrom)),
            ("date_to", date(FilterField::DateTo)),
            ("agent", scalar(FilterField::Agent)),
            ("bidding_method", scalar(FilterField::BiddingMethod)),
            ("targeting", self.targeting.join(",")),
            ("resource", scalar(FilterField::Resource)),
            ("material", scalar(FilterField::Material)),
            ("benefit", scalar(FilterField::Benefit)),
        ])
    }

    fn slot(&self, field: FilterField) -> &Option<String> {
        match field {
            FilterField::DateFrom => &self.date_from,
            FilterField::DateTo => &self.date_to,
            FilterField::Agent => &self.agent,
            FilterField::BiddingMethod => &self.bidding_method,
            FilterField::Resource => &self.resource,
            FilterField::Material => &self.material,
            FilterField::Benefit => &self.benefit,
        }
    }

    fn slot_mut(&mut self, field: FilterField) -> &mut Option<String> {
        match field {
            FilterField::DateFrom => &mut self.date_from,
            FilterField::DateTo => &mut self.date_to,
            FilterField::Agent => &mut self.agent,
            FilterField::BiddingMethod => &mut self.bidding_method,
            FilterField::Resource => &mut self.resource,
            FilterField::Material => &mut self.material,
            FilterField::Benefit => &mut self.benefit,
        }
    }
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Ordered `name → value` pairs sent to `GET /api/statistics`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams(Vec<(&'static str, String)>);

impl QueryParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(key, value)| (*key, value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for QueryParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
