use crate::schema::{ConfidenceLevel, Province};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One passage returned by the retrieval search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_source_type")]
    pub source_type: String,
    /// Similarity score in `[0, 1]`.
    pub score: f64,
}

fn default_source_type() -> String {
    "canada.ca".to_string()
}

impl SearchResult {
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>, score: f64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            url: None,
            source_type: default_source_type(),
            score,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentType {
    Employed,
    SelfEmployed,
    Retired,
    Student,
    Unemployed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MaritalStatus {
    Single,
    Married,
    CommonLaw,
    Separated,
    Divorced,
    Widowed,
}

impl MaritalStatus {
    pub fn has_spouse(&self) -> bool {
        matches!(self, MaritalStatus::Married | MaritalStatus::CommonLaw)
    }
}

/// Flattened taxpayer attributes used to bias retrieval and prompt content.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct UserProfile {
    #[serde(default)]
    pub employment_type: Option<EmploymentType>,
    #[serde(default)]
    pub marital_status: Option<MaritalStatus>,
    #[serde(default)]
    pub province: Option<Province>,
    #[serde(default)]
    pub has_children: bool,
    #[serde(default)]
    pub has_rrsp: bool,
    #[serde(default)]
    pub has_tfsa: bool,
    #[serde(default)]
    pub is_first_time_home_buyer: bool,
    #[serde(default)]
    pub has_rental_income: bool,
    #[serde(default)]
    pub has_investments: bool,
    #[serde(default)]
    pub has_disability: bool,
    #[serde(default)]
    pub is_newcomer: bool,
}

impl UserProfile {
    pub fn is_self_employed(&self) -> bool {
        self.employment_type == Some(EmploymentType::SelfEmployed)
    }

    pub fn has_spouse(&self) -> bool {
        self.marital_status.is_some_and(|m| m.has_spouse())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceResult {
    pub level: ConfidenceLevel,
    /// Highest raw retrieval score, zero with no results.
    pub rag_score: f64,
    pub average_score: f64,
    pub profile_relevance: f64,
    pub strong_matches: usize,
    pub reasoning: String,
}

/// Switches that drive prompt assembly for one answer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseStrategy {
    pub use_rag_context: bool,
    pub use_general_knowledge: bool,
    pub requires_disclaimer: bool,
    pub personalize: bool,
    pub recommend_professional: bool,
}
