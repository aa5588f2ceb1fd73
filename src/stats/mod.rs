//! Progress and assessment statistics for Bastion.
//!
//! Everything here is derived from learner records on demand. The attempt
//! log stays the source of truth; no stats are persisted.

pub mod achievements;
pub mod aggregate;
pub mod summary;

pub use achievements::{achievements, Achievement, AchievementKind, AchievementReport};
pub use aggregate::{
    all_assessment_stats, all_simulation_stats, assessment_stats, simulation_stats, AssessmentStats, SimulationStats,
};
pub use summary::{summarize, LearnerSummary};
