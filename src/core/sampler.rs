//! Question pool sampling, set rotation and attempt pinning.
//!
//! A served subset is pinned as an [`AttemptContext`] so the submission is
//! graded against exactly the questions the learner saw, in the same order.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::model::Question;

/// Key for a pinned question set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinKey {
    pub learner_id: String,
    /// `None` for the final assessment.
    pub module_id: Option<String>,
    pub attempt: u32,
}

impl PinKey {
    pub fn new(learner_id: impl Into<String>, module_id: Option<&str>, attempt: u32) -> Self {
        Self {
            learner_id: learner_id.into(),
            module_id: module_id.map(str::to_string),
            attempt,
        }
    }
}

impl fmt::Display for PinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            self.learner_id,
            self.module_id.as_deref().unwrap_or("final"),
            self.attempt
        )
    }
}

/// The question set served for one in-progress attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptContext {
    pub learner_id: String,
    pub module_id: Option<String>,
    pub attempt: u32,
    /// Question ids in served order.
    pub served_question_ids: Vec<String>,
    pub served_at: DateTime<Utc>,
}

impl AttemptContext {
    pub fn new(
        key: PinKey,
        questions: &[Question],
        served_at: DateTime<Utc>,
    ) -> Self {
        Self {
            learner_id: key.learner_id,
            module_id: key.module_id,
            attempt: key.attempt,
            served_question_ids: questions.iter().map(|q| q.id.clone()).collect(),
            served_at,
        }
    }

    pub fn key(&self) -> PinKey {
        PinKey {
            learner_id: self.learner_id.clone(),
            module_id: self.module_id.clone(),
            attempt: self.attempt,
        }
    }
}

/// 1-based rotation slot for `attempt` over `set_count` sets.
///
/// Attempt 1 uses slot 1, attempt `K + 1` wraps back to slot 1.
pub fn rotate_set(attempt: u32, set_count: u32) -> u32 {
    if set_count == 0 {
        return 1;
    }
    (attempt.max(1) - 1) % set_count + 1
}

/// Draw `min(len, desired)` distinct questions in random order.
pub fn sample<R: Rng + ?Sized>(bank: &[Question], desired: usize, rng: &mut R) -> Vec<Question> {
    let mut picked = bank.to_vec();
    picked.shuffle(rng);
    picked.truncate(desired);
    picked
}

/// Distinct question set labels in `bank`, ascending.
pub fn question_sets(bank: &[Question]) -> Vec<u32> {
    let mut sets: Vec<u32> = bank.iter().map(|q| q.question_set).collect();
    sets.sort_unstable();
    sets.dedup();
    sets
}

/// Rotate to this attempt's question set, then sample within it.
pub fn sample_for_attempt<R: Rng + ?Sized>(
    bank: &[Question],
    desired: usize,
    attempt: u32,
    rng: &mut R,
) -> Vec<Question> {
    let sets = question_sets(bank);
    if sets.len() <= 1 {
        return sample(bank, desired, rng);
    }

    let slot = rotate_set(attempt, sets.len() as u32) as usize;
    let label = sets[slot - 1];
    let segment: Vec<Question> = bank
        .iter()
        .filter(|q| q.question_set == label)
        .cloned()
        .collect();

    tracing::debug!(attempt, set = label, size = segment.len(), "rotated question set");
    sample(&segment, desired, rng)
}

/// Resolve pinned ids against the catalog, keeping served order.
///
/// Ids that no longer exist are dropped with a warning.
pub fn resolve_pinned(catalog: &[Question], context: &AttemptContext) -> Vec<Question> {
    context
        .served_question_ids
        .iter()
        .filter_map(|id| {
            let found = catalog.iter().find(|q| &q.id == id).cloned();
            if found.is_none() {
                tracing::warn!(question_id = %id, pin = %context.key(), "pinned question missing from bank");
            }
            found
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::OptionLetter;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn bank(n: usize) -> Vec<Question> {
        (1..=n)
            .map(|i| Question::new(format!("q{}", i), "prompt", OptionLetter::A).in_module("m1"))
            .collect()
    }

    fn rotated_bank(sets: u32, per_set: usize) -> Vec<Question> {
        (1..=sets)
            .flat_map(|s| {
                (1..=per_set).map(move |i| {
                    Question::new(format!("s{}q{}", s, i), "prompt", OptionLetter::A)
                        .in_module("m1")
                        .in_set(s)
                })
            })
            .collect()
    }

    fn ids(questions: &[Question]) -> Vec<String> {
        questions.iter().map(|q| q.id.clone()).collect()
    }

    #[test]
    fn test_small_bank_returns_all_questions() {
        let mut rng = StdRng::seed_from_u64(7);
        let questions = bank(3);

        let picked = sample(&questions, 5, &mut rng);

        assert_eq!(picked.len(), 3);
        let picked_ids: HashSet<_> = ids(&picked).into_iter().collect();
        let bank_ids: HashSet<_> = ids(&questions).into_iter().collect();
        assert_eq!(picked_ids, bank_ids);
    }

    #[test]
    fn test_large_bank_returns_distinct_subset() {
        let mut rng = StdRng::seed_from_u64(11);
        let questions = bank(20);

        let picked = sample(&questions, 5, &mut rng);

        assert_eq!(picked.len(), 5);
        let unique: HashSet<_> = ids(&picked).into_iter().collect();
        assert_eq!(unique.len(), 5);
        assert!(picked.iter().all(|q| questions.contains(q)));
    }

    #[test]
    fn test_sample_zero_is_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(sample(&bank(4), 0, &mut rng).is_empty());
        assert!(sample(&[], 5, &mut rng).is_empty());
    }

    #[test]
    fn test_resampling_varies_between_attempts() {
        let mut rng = StdRng::seed_from_u64(42);
        let questions = bank(30);

        let draws: HashSet<Vec<String>> = (0..10)
            .map(|_| ids(&sample(&questions, 5, &mut rng)))
            .collect();

        assert!(draws.len() > 1);
    }

    #[test]
    fn test_rotate_set_cycles() {
        assert_eq!(rotate_set(1, 3), 1);
        assert_eq!(rotate_set(2, 3), 2);
        assert_eq!(rotate_set(3, 3), 3);
        assert_eq!(rotate_set(4, 3), 1);
        assert_eq!(rotate_set(0, 3), 1);
        assert_eq!(rotate_set(5, 0), 1);
        assert_eq!(rotate_set(9, 1), 1);
    }

    #[test]
    fn test_sample_for_attempt_uses_rotated_set() {
        let mut rng = StdRng::seed_from_u64(3);
        let questions = rotated_bank(3, 6);

        for (attempt, set) in [(1, 1), (2, 2), (3, 3), (4, 1)] {
            let picked = sample_for_attempt(&questions, 5, attempt, &mut rng);
            assert_eq!(picked.len(), 5);
            assert!(
                picked.iter().all(|q| q.question_set == set),
                "attempt {} should draw from set {}",
                attempt,
                set
            );
        }
    }

    #[test]
    fn test_sample_for_attempt_single_set_uses_whole_bank() {
        let mut rng = StdRng::seed_from_u64(5);
        let questions = bank(8);

        let picked = sample_for_attempt(&questions, 10, 2, &mut rng);
        assert_eq!(picked.len(), 8);
    }

    #[test]
    fn test_question_sets_sorted_unique() {
        let mut questions = rotated_bank(2, 2);
        questions.push(Question::new("x", "p", OptionLetter::B).in_set(5));
        assert_eq!(question_sets(&questions), vec![1, 2, 5]);
    }

    #[test]
    fn test_resolve_pinned_keeps_served_order() {
        let questions = bank(6);
        let served = vec![questions[4].clone(), questions[0].clone(), questions[2].clone()];
        let context = AttemptContext::new(PinKey::new("u1", Some("m1"), 1), &served, Utc::now());

        let resolved = resolve_pinned(&questions, &context);
        assert_eq!(ids(&resolved), vec!["q5", "q1", "q3"]);
    }

    #[test]
    fn test_resolve_pinned_drops_missing_ids() {
        let questions = bank(3);
        let mut context =
            AttemptContext::new(PinKey::new("u1", Some("m1"), 1), &questions, Utc::now());
        context.served_question_ids.insert(1, "gone".to_string());

        let resolved = resolve_pinned(&questions, &context);
        assert_eq!(ids(&resolved), vec!["q1", "q2", "q3"]);
    }

    #[test]
    fn test_pin_key_display() {
        assert_eq!(PinKey::new("u1", Some("m2"), 3).to_string(), "u1.m2.3");
        assert_eq!(PinKey::new("u1", None, 1).to_string(), "u1.final.1");
    }

    #[test]
    fn test_context_key_round_trip() {
        let key = PinKey::new("u9", None, 2);
        let context = AttemptContext::new(key.clone(), &bank(2), Utc::now());
        assert_eq!(context.key(), key);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // Property: sample size is min(len, k)
            #[test]
            fn prop_sample_bound(len in 0usize..40, k in 0usize..50, seed in any::<u64>()) {
                let mut rng = StdRng::seed_from_u64(seed);
                let questions = bank(len);
                let picked = sample(&questions, k, &mut rng);
                prop_assert_eq!(picked.len(), len.min(k));

                let unique: HashSet<_> = ids(&picked).into_iter().collect();
                prop_assert_eq!(unique.len(), picked.len());
            }

            // Property: rotation slot is always within 1..=K
            #[test]
            fn prop_rotation_in_range(attempt in 0u32..1000, sets in 1u32..10) {
                let slot = rotate_set(attempt, sets);
                prop_assert!(slot >= 1 && slot <= sets);
                prop_assert_eq!(rotate_set(attempt.max(1) + sets, sets), slot);
            }

            // Property: resolving the same pin twice gives the same questions
            #[test]
            fn prop_pin_resolution_idempotent(len in 1usize..20, k in 1usize..10, seed in any::<u64>()) {
                let mut rng = StdRng::seed_from_u64(seed);
                let questions = bank(len);
                let served = sample(&questions, k, &mut rng);
                let context = AttemptContext::new(PinKey::new("u1", Some("m1"), 1), &served, Utc::now());

                let first = resolve_pinned(&questions, &context);
                let second = resolve_pinned(&questions, &context);
                prop_assert_eq!(&first, &second);
                prop_assert_eq!(ids(&first), ids(&served));
            }
        }
    }
}
