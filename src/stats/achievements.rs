//! Learner achievements.
//!
//! Each achievement is a counter against a target. Derived on demand from
//! the learner record; nothing is stored.

use serde::{Deserialize, Serialize};

use crate::core::catalog::Catalog;
use crate::core::completion;
use crate::core::records::LearnerRecord;
use crate::stats::summary::percent;

/// Modules needed for `first_module`.
pub const FIRST_MODULE_TARGET: u32 = 1;
/// Modules needed for `halfway`.
pub const HALFWAY_TARGET: u32 = 4;
/// Completed simulations needed for `simulation_master`.
pub const SIMULATION_MASTER_TARGET: u32 = 3;
/// A module completed in fewer minutes than this earns `speed_learner`.
pub const SPEED_LEARNER_MINUTES: u32 = 30;

/// Closed set of achievements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementKind {
    FirstModule,
    Halfway,
    PerfectScore,
    SimulationMaster,
    SpeedLearner,
}

impl AchievementKind {
    pub const ALL: [AchievementKind; 5] = [
        Self::FirstModule,
        Self::Halfway,
        Self::PerfectScore,
        Self::SimulationMaster,
        Self::SpeedLearner,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::FirstModule => "First Steps",
            Self::Halfway => "Halfway There",
            Self::PerfectScore => "Perfect Score",
            Self::SimulationMaster => "Simulation Master",
            Self::SpeedLearner => "Speed Learner",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::FirstModule => "Complete your first module",
            Self::Halfway => "Complete 50% of all modules",
            Self::PerfectScore => "Get 100% on any assessment",
            Self::SimulationMaster => "Complete all simulations",
            Self::SpeedLearner => "Complete a module in under 30 minutes",
        }
    }

    fn target(&self) -> u32 {
        match self {
            Self::FirstModule => FIRST_MODULE_TARGET,
            Self::Halfway => HALFWAY_TARGET,
            Self::SimulationMaster => SIMULATION_MASTER_TARGET,
            Self::PerfectScore | Self::SpeedLearner => 1,
        }
    }
}

/// Progress toward one achievement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Achievement {
    pub kind: AchievementKind,
    pub name: String,
    pub description: String,
    pub achieved: bool,
    pub progress: u32,
    pub target: u32,
}

/// All achievements for one learner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AchievementReport {
    pub achievements: Vec<Achievement>,
    pub achieved_count: usize,
    pub total: usize,
    pub achievement_percentage: f64,
}

pub fn achievements(record: &LearnerRecord, catalog: &Catalog, threshold: u32) -> AchievementReport {
    let completed: Vec<&str> = catalog
        .modules
        .iter()
        .filter(|m| completion::is_module_fully_completed(record, m, threshold))
        .map(|m| m.id.as_str())
        .collect();
    let completed_count = completed.len() as u32;

    let perfect = record
        .attempts
        .iter()
        .filter(|a| a.total > 0 && a.correct == a.total)
        .count() as u32;

    // A completed module without a mark has no recorded time.
    let fast = completed
        .iter()
        .filter(|id| {
            record
                .progress_for(id)
                .map_or(0, |p| p.time_spent_minutes)
                < SPEED_LEARNER_MINUTES
        })
        .count() as u32;

    let achievements: Vec<Achievement> = AchievementKind::ALL
        .iter()
        .map(|&kind| {
            let count = match kind {
                AchievementKind::FirstModule | AchievementKind::Halfway => completed_count,
                AchievementKind::PerfectScore => perfect,
                AchievementKind::SimulationMaster => record.completed_simulation_count() as u32,
                AchievementKind::SpeedLearner => fast,
            };
            let target = kind.target();
            Achievement {
                kind,
                name: kind.name().to_string(),
                description: kind.description().to_string(),
                achieved: count >= target,
                progress: match kind {
                    AchievementKind::FirstModule => count.min(target),
                    _ => count,
                },
                target,
            }
        })
        .collect();

    let achieved_count = achievements.iter().filter(|a| a.achieved).count();
    let total = achievements.len();

    AchievementReport {
        achievement_percentage: percent(achieved_count, total),
        achievements,
        achieved_count,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::tests::sample_catalog;
    use crate::core::model::ModuleProgress;
    use crate::core::records::tests::{kc_attempt, sim_attempt};
    use chrono::{Duration, Utc};

    fn find(report: &AchievementReport, kind: AchievementKind) -> &Achievement {
        report.achievements.iter().find(|a| a.kind == kind).unwrap()
    }

    #[test]
    fn test_fresh_learner_has_nothing() {
        let report = achievements(&LearnerRecord::new("u1", Utc::now()), &sample_catalog(), 80);

        assert_eq!(report.total, 5);
        assert_eq!(report.achieved_count, 0);
        assert_eq!(report.achievement_percentage, 0.0);
        assert!(report.achievements.iter().all(|a| a.progress == 0));
    }

    #[test]
    fn test_first_module_and_speed_learner() {
        let t0 = Utc::now();
        let mut record = LearnerRecord::new("u1", t0);
        record.append_attempt(kc_attempt("u1", "m1", 4, 5, t0));
        let mut mark = ModuleProgress::new("u1", "m1");
        mark.time_spent_minutes = 12;
        record.set_progress(mark);

        let report = achievements(&record, &sample_catalog(), 80);

        assert!(find(&report, AchievementKind::FirstModule).achieved);
        assert!(find(&report, AchievementKind::SpeedLearner).achieved);
        let halfway = find(&report, AchievementKind::Halfway);
        assert!(!halfway.achieved);
        assert_eq!((halfway.progress, halfway.target), (1, 4));
        assert!(!find(&report, AchievementKind::PerfectScore).achieved);
        assert_eq!(report.achievement_percentage, 40.0);
    }

    #[test]
    fn test_slow_module_is_not_speed_learner() {
        let t0 = Utc::now();
        let mut record = LearnerRecord::new("u1", t0);
        record.append_attempt(kc_attempt("u1", "m1", 5, 5, t0));
        let mut mark = ModuleProgress::new("u1", "m1");
        mark.time_spent_minutes = 30;
        record.set_progress(mark);

        let report = achievements(&record, &sample_catalog(), 80);

        assert!(!find(&report, AchievementKind::SpeedLearner).achieved);
        assert!(find(&report, AchievementKind::PerfectScore).achieved);
    }

    #[test]
    fn test_simulation_master_counts_completed_runs() {
        let t0 = Utc::now();
        let mut record = LearnerRecord::new("u1", t0);
        for i in 0..3 {
            record.append_simulation(sim_attempt("u1", "m2", true, t0 + Duration::minutes(i)));
        }
        record.append_simulation(sim_attempt("u1", "m2", false, t0));

        let report = achievements(&record, &sample_catalog(), 80);
        let master = find(&report, AchievementKind::SimulationMaster);
        assert!(master.achieved);
        assert_eq!(master.progress, 3);
    }
}
