//! Satisfaction survey validation and eligibility.

use serde::{Deserialize, Serialize};

use crate::core::model::Difficulty;
use crate::core::retake::Eligibility;
use crate::error::{BastionError, Result};

/// Survey answers as submitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SurveyInput {
    pub rating: Option<u8>,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub module_id: Option<String>,
}

/// Check rating, feedback length and difficulty. Returns the rating.
pub fn validate(input: &SurveyInput, max_feedback_chars: u32) -> Result<u8> {
    let rating = input
        .rating
        .ok_or_else(|| BastionError::validation("rating is required"))?;
    if !(1..=5).contains(&rating) {
        return Err(BastionError::validation(format!(
            "rating must be between 1 and 5, got {}",
            rating
        )));
    }

    let chars = input.feedback.chars().count();
    if chars > max_feedback_chars as usize {
        return Err(BastionError::validation(format!(
            "feedback must be at most {} characters, got {}",
            max_feedback_chars, chars
        )));
    }

    Ok(rating)
}

/// The survey opens after the final assessment is passed, once.
pub fn survey_eligibility(final_passed: bool, survey_completed: bool) -> Eligibility {
    if !final_passed {
        Eligibility {
            eligible: false,
            reason: "You must pass the Final Assessment before taking the survey.".to_string(),
        }
    } else if survey_completed {
        Eligibility {
            eligible: false,
            reason: "You have already completed the survey.".to_string(),
        }
    } else {
        Eligibility {
            eligible: true,
            reason: "Final assessment passed".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(rating: Option<u8>, feedback: &str) -> SurveyInput {
        SurveyInput {
            rating,
            feedback: feedback.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_survey() {
        assert_eq!(validate(&input(Some(4), "Great course"), 1000).unwrap(), 4);
    }

    #[test]
    fn test_rating_required() {
        let err = validate(&input(None, ""), 1000).unwrap_err();
        assert_eq!(err.to_string(), "validation error: rating is required");
    }

    #[test]
    fn test_rating_out_of_range() {
        assert!(validate(&input(Some(0), ""), 1000).is_err());
        assert!(validate(&input(Some(6), ""), 1000).is_err());
        assert!(validate(&input(Some(1), ""), 1000).is_ok());
        assert!(validate(&input(Some(5), ""), 1000).is_ok());
    }

    #[test]
    fn test_feedback_length_counts_characters() {
        let exact = "é".repeat(10);
        assert!(validate(&input(Some(3), &exact), 10).is_ok());

        let over = "é".repeat(11);
        let err = validate(&input(Some(3), &over), 10).unwrap_err();
        assert!(err.to_string().contains("at most 10 characters"));
    }

    #[test]
    fn test_difficulty_parses_from_json() {
        let parsed: SurveyInput =
            serde_json::from_str(r#"{"rating": 5, "difficulty": "medium"}"#).unwrap();
        assert_eq!(parsed.difficulty, Some(Difficulty::Medium));

        let bad = serde_json::from_str::<SurveyInput>(r#"{"rating": 5, "difficulty": "brutal"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_survey_eligibility() {
        assert!(!survey_eligibility(false, false).eligible);
        assert!(survey_eligibility(true, false).eligible);

        let done = survey_eligibility(true, true);
        assert!(!done.eligible);
        assert!(done.reason.contains("already completed"));
    }
}
