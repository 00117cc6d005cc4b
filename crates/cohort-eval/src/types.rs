//! Requirement and evaluation data types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Requirements
// ─────────────────────────────────────────────────────────────────────────────

/// Inclusive age range constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeRange {
    /// Minimum age, inclusive.
    pub min: u32,
    /// Maximum age, inclusive.
    pub max: u32,
}

/// Household income constraint, open on either end.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeRange {
    /// Minimum income, inclusive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<u64>,
    /// Maximum income, inclusive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
}

/// What the user asked for, derived per-turn from recent user text.
/// Never persisted independently of the session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortRequirements {
    /// Desired cohort size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_size: Option<u64>,
    /// Hard lower bound on cohort size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u64>,
    /// Hard upper bound on cohort size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
    /// Required age range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_range: Option<AgeRange>,
    /// Expected gender categories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genders: Option<Vec<String>>,
    /// Expected location categories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<String>>,
    /// Income constraint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub income_range: Option<IncomeRange>,
    /// Free-text description of the ask.
    pub description: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Cohort data
// ─────────────────────────────────────────────────────────────────────────────

/// A demographic breakdown: dimension name to bucket-label counts.
/// `BTreeMap` keeps iteration order stable so evaluation is repeatable.
pub type Breakdown = BTreeMap<String, BTreeMap<String, u64>>;

/// A sized query result to be evaluated. Transient, produced per tool call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortData {
    /// Cohort size (row count).
    pub size: u64,
    /// The query text that produced it.
    pub sql: String,
    /// Demographic breakdown maps, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Breakdown>,
    /// Size of the full addressable population, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_population: Option<u64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Evaluation output
// ─────────────────────────────────────────────────────────────────────────────

/// Issue severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks the cohort from being usable as-is.
    Critical,
    /// Likely to undermine campaign results.
    High,
    /// Worth reviewing.
    Medium,
}

/// Score for one evaluation dimension.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionScore {
    /// Score, 0 to 100.
    pub score: f64,
    /// Weight in the final quality score.
    pub weight: f64,
    /// Explanatory text for this score.
    pub explanation: String,
}

/// A flagged problem with the evaluated cohort.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationIssue {
    /// How bad it is.
    pub severity: Severity,
    /// Dimension key the issue concerns.
    pub dimension: String,
    /// What went wrong.
    pub message: String,
    /// How to address it.
    pub suggestion: String,
}

/// Full evaluation output. Computed fresh per evaluated query; never
/// mutated after construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    /// Weighted overall score, 0 to 100.
    pub quality_score: u32,
    /// Whether the score clears the pass threshold.
    pub passed: bool,
    /// Per-dimension scores, keyed `sizeMatch`, `diversity`, `requirementFit`.
    pub dimensions: BTreeMap<String, DimensionScore>,
    /// Flagged problems.
    pub issues: Vec<EvaluationIssue>,
    /// Free-text guidance, independent of issues.
    pub suggestions: Vec<String>,
    /// One-line summary.
    pub summary: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requirements_default_is_empty() {
        let req = CohortRequirements::default();
        assert!(req.target_size.is_none());
        assert!(req.age_range.is_none());
        assert!(req.description.is_empty());
    }

    #[test]
    fn requirements_skip_absent_fields() {
        let req = CohortRequirements {
            target_size: Some(500_000),
            description: "500k shoppers".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["targetSize"], 500_000);
        assert!(json.get("minSize").is_none());
        assert!(json.get("ageRange").is_none());
    }

    #[test]
    fn cohort_data_serde_roundtrip() {
        let mut gender = BTreeMap::new();
        let _ = gender.insert("female".to_owned(), 60_000u64);
        let _ = gender.insert("male".to_owned(), 40_000u64);
        let mut breakdown = Breakdown::new();
        let _ = breakdown.insert("gender".to_owned(), gender);

        let cohort = CohortData {
            size: 100_000,
            sql: "SELECT COUNT(*) FROM shoppers".into(),
            breakdown: Some(breakdown),
            total_population: Some(2_000_000),
        };
        let json = serde_json::to_string(&cohort).unwrap();
        let back: CohortData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cohort);
    }

    #[test]
    fn severity_serde() {
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            "\"critical\""
        );
        assert_eq!(serde_json::to_string(&Severity::High).unwrap(), "\"high\"");
    }
}
