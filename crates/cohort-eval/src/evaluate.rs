//! Cohort quality evaluation.
//!
//! `evaluate(cohort, requirements)` is a pure function of its inputs.
//! The score bands and penalty constants are empirically chosen and kept
//! for compatibility; nothing in the engine's control flow depends on
//! exact values, only on the shape of the result.

use std::collections::BTreeMap;

use crate::types::{
    CohortData, CohortRequirements, DimensionScore, EvaluationIssue, EvaluationResult, Severity,
};

/// Minimum quality score considered passing.
pub const PASS_THRESHOLD: u32 = 70;

const SIZE_WEIGHT: f64 = 0.4;
const DIVERSITY_WEIGHT: f64 = 0.2;
const FIT_WEIGHT: f64 = 0.4;

const SIZE_DIMENSION: &str = "sizeMatch";
const DIVERSITY_DIMENSION: &str = "diversity";
const FIT_DIMENSION: &str = "requirementFit";

/// Score a query result against the inferred requirements.
#[must_use]
pub fn evaluate(cohort: &CohortData, requirements: &CohortRequirements) -> EvaluationResult {
    let (size_score, size_explanation) = score_size(cohort, requirements);
    let (diversity_score, diversity_explanation) = score_diversity(cohort);
    let (fit_score, fit_explanation) = score_requirement_fit(cohort, requirements);

    let weighted =
        size_score * SIZE_WEIGHT + diversity_score * DIVERSITY_WEIGHT + fit_score * FIT_WEIGHT;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let quality_score = weighted.round().clamp(0.0, 100.0) as u32;
    let passed = quality_score >= PASS_THRESHOLD;

    let mut dimensions = BTreeMap::new();
    let _ = dimensions.insert(
        SIZE_DIMENSION.to_owned(),
        DimensionScore {
            score: size_score,
            weight: SIZE_WEIGHT,
            explanation: size_explanation,
        },
    );
    let _ = dimensions.insert(
        DIVERSITY_DIMENSION.to_owned(),
        DimensionScore {
            score: diversity_score,
            weight: DIVERSITY_WEIGHT,
            explanation: diversity_explanation,
        },
    );
    let _ = dimensions.insert(
        FIT_DIMENSION.to_owned(),
        DimensionScore {
            score: fit_score,
            weight: FIT_WEIGHT,
            explanation: fit_explanation,
        },
    );

    let issues = collect_issues(size_score, diversity_score, fit_score);
    let suggestions = collect_suggestions(cohort, requirements);

    let summary = format!(
        "Quality score {quality_score}/100 ({}): size {size_score:.0}, diversity {diversity_score:.0}, requirement fit {fit_score:.0}",
        if passed { "passed" } else { "failed" },
    );

    EvaluationResult {
        quality_score,
        passed,
        dimensions,
        issues,
        suggestions,
        summary,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dimension scoring
// ─────────────────────────────────────────────────────────────────────────────

#[allow(clippy::cast_precision_loss)]
fn score_size(cohort: &CohortData, requirements: &CohortRequirements) -> (f64, String) {
    let size = cohort.size;

    let mut score: f64;
    let explanation;
    if let Some(target) = requirements.target_size.filter(|t| *t > 0) {
        let deviation = (size as f64 - target as f64).abs() / target as f64;
        score = if deviation <= 0.05 {
            100.0
        } else if deviation <= 0.15 {
            85.0
        } else if deviation <= 0.30 {
            65.0
        } else {
            40.0
        };
        explanation = format!(
            "cohort size {size} deviates {:.1}% from target {target}",
            deviation * 100.0
        );
    } else if size == 0 {
        score = 0.0;
        explanation = "cohort is empty".to_owned();
    } else if size < 1_000 || size > 50_000_000 {
        score = 50.0;
        explanation = format!("cohort size {size} is outside the plausible range");
    } else {
        score = 100.0;
        explanation = format!("cohort size {size} is plausible (no explicit target)");
    }

    let below_min = requirements.min_size.is_some_and(|min| size < min);
    let above_max = requirements.max_size.is_some_and(|max| size > max);
    if below_min || above_max {
        score = score.min(30.0);
        let bound = if below_min { "minimum" } else { "maximum" };
        return (score, format!("{explanation}; violates the {bound} size bound"));
    }

    (score, explanation)
}

fn score_diversity(cohort: &CohortData) -> (f64, String) {
    let Some(breakdown) = cohort.breakdown.as_ref().filter(|b| !b.is_empty()) else {
        return (100.0, "no demographic breakdown supplied".to_owned());
    };

    let mut total = 0.0;
    let mut count = 0usize;
    for buckets in breakdown.values() {
        total += normalized_entropy(buckets) * 100.0;
        count += 1;
    }
    #[allow(clippy::cast_precision_loss)]
    let score = total / count as f64;
    (
        score,
        format!("average normalized entropy across {count} dimension(s)"),
    )
}

/// Shannon entropy of the bucket distribution, normalized by the maximum
/// possible entropy for that many buckets. 0 for degenerate distributions.
#[allow(clippy::cast_precision_loss)]
fn normalized_entropy(buckets: &BTreeMap<String, u64>) -> f64 {
    if buckets.len() <= 1 {
        return 0.0;
    }
    let total: u64 = buckets.values().sum();
    if total == 0 {
        return 0.0;
    }
    let mut entropy = 0.0;
    for &count in buckets.values() {
        if count == 0 {
            continue;
        }
        let p = count as f64 / total as f64;
        entropy -= p * p.log2();
    }
    entropy / (buckets.len() as f64).log2()
}

fn score_requirement_fit(cohort: &CohortData, requirements: &CohortRequirements) -> (f64, String) {
    let mut score = 100.0f64;
    let mut notes: Vec<String> = Vec::new();

    let breakdown = cohort.breakdown.as_ref();

    if let (Some(range), Some(ages)) = (
        requirements.age_range,
        breakdown.and_then(|b| b.get("age")),
    ) {
        let out_of_range = ages.iter().any(|(label, &count)| {
            count > 0
                && parse_age_bucket(label)
                    .is_some_and(|(lo, hi)| hi.is_some_and(|h| h < range.min) || lo > range.max)
        });
        if out_of_range {
            score -= 20.0;
            notes.push("membership outside the required age range".to_owned());
        }
    }

    if let (Some(genders), Some(observed)) = (
        requirements.genders.as_ref(),
        breakdown.and_then(|b| b.get("gender")),
    ) {
        if has_unexpected_category(observed, genders) {
            score -= 15.0;
            notes.push("unexpected gender categories present".to_owned());
        }
    }

    if let (Some(locations), Some(observed)) = (
        requirements.locations.as_ref(),
        breakdown.and_then(|b| b.get("location")),
    ) {
        if has_unexpected_category(observed, locations) {
            score -= 15.0;
            notes.push("unexpected location categories present".to_owned());
        }
    }

    score = score.max(0.0);
    let explanation = if notes.is_empty() {
        "no demographic constraint violations detected".to_owned()
    } else {
        notes.join("; ")
    };
    (score, explanation)
}

fn has_unexpected_category(observed: &BTreeMap<String, u64>, expected: &[String]) -> bool {
    observed.iter().any(|(label, &count)| {
        count > 0 && !expected.iter().any(|e| e.eq_ignore_ascii_case(label))
    })
}

/// Parse an age bucket label into inclusive bounds. Recognizes `"18-24"`,
/// `"65+"`, and `"under 18"` shapes; anything else is ignored.
fn parse_age_bucket(label: &str) -> Option<(u32, Option<u32>)> {
    let label = label.trim();
    if let Some(rest) = label.strip_suffix('+') {
        return rest.trim().parse().ok().map(|lo| (lo, None));
    }
    if let Some(rest) = label
        .strip_prefix("under ")
        .or_else(|| label.strip_prefix('<'))
    {
        let bound: u32 = rest.trim().parse().ok()?;
        return Some((0, Some(bound.saturating_sub(1))));
    }
    let (lo, hi) = label.split_once('-')?;
    let lo: u32 = lo.trim().parse().ok()?;
    let hi: u32 = hi.trim().parse().ok()?;
    Some((lo, Some(hi)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Issues and suggestions
// ─────────────────────────────────────────────────────────────────────────────

fn collect_issues(size: f64, diversity: f64, fit: f64) -> Vec<EvaluationIssue> {
    let mut issues = Vec::new();

    if size < 50.0 {
        issues.push(EvaluationIssue {
            severity: Severity::Critical,
            dimension: SIZE_DIMENSION.to_owned(),
            message: "cohort size is far from what was asked for".to_owned(),
            suggestion: "adjust filters until the count approaches the requested size".to_owned(),
        });
    } else if size < 70.0 {
        issues.push(EvaluationIssue {
            severity: Severity::Medium,
            dimension: SIZE_DIMENSION.to_owned(),
            message: "cohort size misses the requested size".to_owned(),
            suggestion: "tune filters to move the count toward the target".to_owned(),
        });
    }

    if diversity < 50.0 {
        issues.push(EvaluationIssue {
            severity: Severity::Medium,
            dimension: DIVERSITY_DIMENSION.to_owned(),
            message: "cohort is concentrated in few demographic buckets".to_owned(),
            suggestion: "verify the concentration is intended and not a filter artifact"
                .to_owned(),
        });
    }

    if fit < 70.0 {
        issues.push(EvaluationIssue {
            severity: Severity::High,
            dimension: FIT_DIMENSION.to_owned(),
            message: "cohort includes members outside the stated demographic constraints"
                .to_owned(),
            suggestion: "add the missing demographic predicates to the query".to_owned(),
        });
    }

    issues
}

#[allow(clippy::cast_precision_loss)]
fn collect_suggestions(cohort: &CohortData, requirements: &CohortRequirements) -> Vec<String> {
    let mut suggestions = Vec::new();

    if let Some(target) = requirements.target_size.filter(|t| *t > 0) {
        let deviation = (cohort.size as f64 - target as f64) / target as f64;
        if deviation < -0.5 {
            suggestions.push(format!(
                "Cohort is {:.0}% below the target of {target}; relax filters to broaden the audience",
                -deviation * 100.0
            ));
        } else if deviation > 0.5 {
            suggestions.push(format!(
                "Cohort is {:.0}% above the target of {target}; add filters to narrow the audience",
                deviation * 100.0
            ));
        }
    }

    if cohort.size == 0 {
        suggestions.push(
            "The query matched no one; relax filters or verify table and column names".to_owned(),
        );
    }

    if let Some(population) = cohort.total_population.filter(|p| *p > 0) {
        if cohort.size as f64 > population as f64 * 0.6 {
            suggestions.push(format!(
                "Cohort covers most of the {population}-person population; consider whether broad targeting is intended"
            ));
        }
    }

    suggestions
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
