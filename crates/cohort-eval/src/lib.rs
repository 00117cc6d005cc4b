//! # cohort-eval
//!
//! Requirement inference and quality evaluation for audience cohorts.
//!
//! [`infer_requirements`](requirements::infer_requirements) derives
//! [`CohortRequirements`](types::CohortRequirements) from recent user text;
//! [`evaluate`](evaluate::evaluate) scores a query result against them.
//! Both are pure functions — identical inputs always produce identical
//! outputs.

pub mod evaluate;
pub mod requirements;
pub mod types;

pub use evaluate::evaluate;
pub use requirements::infer_requirements;
pub use types::{
    CohortData, CohortRequirements, DimensionScore, EvaluationIssue, EvaluationResult, Severity,
};
