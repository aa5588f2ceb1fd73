//! Retake policies.
//!
//! The final assessment allows `max_attempts` per cycle. Once a cycle is
//! exhausted, a new one opens `cooldown_hours` after its last attempt.
//! Knowledge checks have a flat per-module cap.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{FinalAssessmentConfig, KnowledgeCheckConfig};

/// Verdict on whether another attempt may start now.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetakeDecision {
    pub can_retake: bool,
    pub attempts_remaining: u32,
    pub reason: String,
    #[serde(default)]
    pub cooldown_reset: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_remaining_hours: Option<f64>,
}

impl RetakeDecision {
    fn allow(attempts_remaining: u32, reason: impl Into<String>) -> Self {
        Self {
            can_retake: true,
            attempts_remaining,
            reason: reason.into(),
            cooldown_reset: false,
            cooldown_remaining_hours: None,
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            can_retake: false,
            attempts_remaining: 0,
            reason: reason.into(),
            cooldown_reset: false,
            cooldown_remaining_hours: None,
        }
    }
}

/// Decide whether the final assessment may be attempted at `now`.
///
/// `count` is the number of attempts in the current cycle. With the cycle
/// exhausted and no timestamp to measure from, the answer is no.
pub fn can_retake_final(
    count: u32,
    last_attempt: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    policy: &FinalAssessmentConfig,
) -> RetakeDecision {
    let max = policy.max_attempts;
    let cooldown = policy.cooldown_hours;

    if count < max {
        return RetakeDecision::allow(max - count, format!("Attempt {} of {}", count + 1, max));
    }

    let Some(last) = last_attempt else {
        return RetakeDecision::deny(format!(
            "Maximum attempts reached. Wait {} hours to retry.",
            cooldown
        ));
    };

    let elapsed_hours = now.signed_duration_since(last).num_seconds() as f64 / 3600.0;
    if elapsed_hours >= f64::from(cooldown) {
        RetakeDecision {
            cooldown_reset: true,
            ..RetakeDecision::allow(max, format!("{}-hour cooldown period completed", cooldown))
        }
    } else {
        let remaining = f64::from(cooldown) - elapsed_hours;
        RetakeDecision {
            cooldown_remaining_hours: Some(remaining),
            ..RetakeDecision::deny(format!(
                "{}-hour cooldown period active. {:.1} hours remaining",
                cooldown, remaining
            ))
        }
    }
}

/// Attempts in the current cycle and the time of the latest one.
///
/// `times` must be sorted oldest first. A new cycle starts with the first
/// attempt made at least `cooldown_hours` after the previous attempt of an
/// exhausted cycle.
pub fn current_cycle(
    times: &[DateTime<Utc>],
    policy: &FinalAssessmentConfig,
) -> (u32, Option<DateTime<Utc>>) {
    let cooldown = Duration::hours(i64::from(policy.cooldown_hours));
    let mut count = 0u32;
    let mut last: Option<DateTime<Utc>> = None;

    for &at in times {
        if let Some(prev) = last {
            if count >= policy.max_attempts && at.signed_duration_since(prev) >= cooldown {
                count = 0;
            }
        }
        count += 1;
        last = Some(at);
    }

    (count, last)
}

/// Flat cap on knowledge check attempts for one module.
pub fn can_retake_knowledge_check(attempts: u32, policy: &KnowledgeCheckConfig) -> RetakeDecision {
    let max = policy.max_attempts;
    if attempts < max {
        RetakeDecision::allow(max - attempts, "Regular module retake policy")
    } else {
        RetakeDecision::deny(format!(
            "Maximum of {} knowledge check attempts reached",
            max
        ))
    }
}

/// Whether a learner may sit the final assessment at all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Eligibility {
    pub eligible: bool,
    pub reason: String,
}

/// Final assessment opens once every module is complete, and closes once passed.
pub fn final_eligibility(all_modules_completed: bool, final_passed: bool) -> Eligibility {
    if !all_modules_completed {
        Eligibility {
            eligible: false,
            reason: "You must complete all modules before taking the Final Assessment.".to_string(),
        }
    } else if final_passed {
        Eligibility {
            eligible: false,
            reason: "You have already passed the Final Assessment!".to_string(),
        }
    } else {
        Eligibility {
            eligible: true,
            reason: "All modules completed".to_string(),
        }
    }
}
