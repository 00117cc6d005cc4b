//! Requirement inference from user text.
//!
//! Derives [`CohortRequirements`] from the most recent user turns with
//! substring and pattern matching. This is deliberately shallow — the
//! model does the real interpretation; these inferred requirements only
//! feed the quality evaluator.

use regex::Regex;
use tracing::debug;

use crate::types::{AgeRange, CohortRequirements, IncomeRange};

// Compiled once per call. At the expected call rate (once per evaluated
// query) this is fine.
fn target_size_pattern() -> Regex {
    Regex::new(
        r"(?i)(?:around|about|approximately|roughly|audience\s+of|target(?:ing)?(?:\s+(?:size\s+)?(?:of|is))?)\s+\$?(\d[\d,]*(?:\.\d+)?)\s*(k|thousand|m|million)?\b",
    )
    .expect("valid regex")
}

fn min_size_pattern() -> Regex {
    Regex::new(r"(?i)(?:at\s+least|minimum\s+of|no\s+fewer\s+than)\s+(\d[\d,]*(?:\.\d+)?)\s*(k|thousand|m|million)?\b")
        .expect("valid regex")
}

fn max_size_pattern() -> Regex {
    Regex::new(
        r"(?i)(?:at\s+most|no\s+more\s+than|under|fewer\s+than|up\s+to|maximum\s+of)\s+(\d[\d,]*(?:\.\d+)?)\s*(k|thousand|m|million)?\b",
    )
    .expect("valid regex")
}

fn age_range_pattern() -> Regex {
    Regex::new(r"(?i)(?:aged?|ages)\s+(\d{1,2})\s*(?:-|–|to)\s*(\d{1,2})|(\d{1,2})\s*(?:-|–|to)\s*(\d{1,2})\s*(?:years?|yrs?)(?:\s+old)?")
        .expect("valid regex")
}

fn income_min_pattern() -> Regex {
    Regex::new(r"(?i)income\s+(?:over|above|of\s+at\s+least|greater\s+than)\s+\$?(\d[\d,]*(?:\.\d+)?)\s*(k|thousand|m|million)?\b")
        .expect("valid regex")
}

fn income_max_pattern() -> Regex {
    Regex::new(r"(?i)income\s+(?:under|below|less\s+than)\s+\$?(\d[\d,]*(?:\.\d+)?)\s*(k|thousand|m|million)?\b")
        .expect("valid regex")
}

// Capitalization is significant here, so no (?i).
fn location_pattern() -> Regex {
    Regex::new(r"\b(?:in|from|near|across)\s+(?:the\s+)?([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+){0,2})")
        .expect("valid regex")
}

/// Parse a number with an optional magnitude suffix (`k`, `m`, etc.).
fn parse_magnitude(number: &str, suffix: Option<&str>) -> Option<u64> {
    let base: f64 = number.replace(',', "").parse().ok()?;
    let factor = match suffix.map(str::to_ascii_lowercase).as_deref() {
        Some("k" | "thousand") => 1_000.0,
        Some("m" | "million") => 1_000_000.0,
        _ => 1.0,
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some((base * factor) as u64)
}

fn capture_size(re: &Regex, text: &str) -> Option<u64> {
    let caps = re.captures(text)?;
    let number = caps.get(1)?.as_str();
    let suffix = caps.get(2).map(|m| m.as_str());
    let value = parse_magnitude(number, suffix)?;
    // Bare small numbers ("under 35") are almost always ages, not sizes.
    if suffix.is_none() && value < 1_000 {
        return None;
    }
    Some(value)
}

fn capture_age_range(text: &str) -> Option<AgeRange> {
    let caps = age_range_pattern().captures(text)?;
    let (lo, hi) = match (caps.get(1), caps.get(2), caps.get(3), caps.get(4)) {
        (Some(lo), Some(hi), _, _) | (_, _, Some(lo), Some(hi)) => (lo, hi),
        _ => return None,
    };
    let min: u32 = lo.as_str().parse().ok()?;
    let max: u32 = hi.as_str().parse().ok()?;
    (min <= max).then_some(AgeRange { min, max })
}

fn capture_genders(text: &str) -> Option<Vec<String>> {
    let mut genders = Vec::new();
    if Regex::new(r"(?i)\b(women|female|females)\b")
        .expect("valid regex")
        .is_match(text)
    {
        genders.push("female".to_owned());
    }
    if Regex::new(r"(?i)\b(men|male|males)\b")
        .expect("valid regex")
        .is_match(text)
    {
        genders.push("male".to_owned());
    }
    (!genders.is_empty()).then_some(genders)
}

const LOCATION_STOPWORDS: &[&str] = &["I", "The", "My", "We", "It", "This", "That"];

fn capture_locations(text: &str) -> Option<Vec<String>> {
    let mut locations: Vec<String> = Vec::new();
    for caps in location_pattern().captures_iter(text) {
        if let Some(m) = caps.get(1) {
            let candidate = m.as_str();
            if LOCATION_STOPWORDS.contains(&candidate) {
                continue;
            }
            if !locations.iter().any(|l| l == candidate) {
                locations.push(candidate.to_owned());
            }
        }
    }
    (!locations.is_empty()).then_some(locations)
}

fn capture_income(text: &str) -> Option<IncomeRange> {
    let min = income_min_pattern()
        .captures(text)
        .and_then(|c| parse_magnitude(c.get(1)?.as_str(), c.get(2).map(|m| m.as_str())));
    let max = income_max_pattern()
        .captures(text)
        .and_then(|c| parse_magnitude(c.get(1)?.as_str(), c.get(2).map(|m| m.as_str())));
    (min.is_some() || max.is_some()).then_some(IncomeRange { min, max })
}

/// Infer cohort requirements from recent user text.
///
/// Best-effort and intentionally conservative: anything it cannot read
/// with confidence is simply absent from the result.
#[must_use]
pub fn infer_requirements(text: &str) -> CohortRequirements {
    let requirements = CohortRequirements {
        target_size: capture_size(&target_size_pattern(), text),
        min_size: capture_size(&min_size_pattern(), text),
        max_size: capture_size(&max_size_pattern(), text),
        age_range: capture_age_range(text),
        genders: capture_genders(text),
        locations: capture_locations(text),
        income_range: capture_income(text),
        description: text.trim().to_owned(),
    };
    debug!(
        target_size = ?requirements.target_size,
        has_age = requirements.age_range.is_some(),
        has_genders = requirements.genders.is_some(),
        "inferred cohort requirements"
    );
    requirements
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
