//! Certificate eligibility gate: final assessment passed AND survey submitted.

use serde::{Deserialize, Serialize};

/// Outcome of the certificate gate. Always carries a reason.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CertDecision {
    pub can_generate: bool,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_requirement: Option<String>,
}

pub fn can_generate_certificate(final_passed: bool, survey_completed: bool) -> CertDecision {
    if !final_passed {
        return CertDecision {
            can_generate: false,
            reason: "Final assessment not passed".to_string(),
            missing_requirement: Some("final_assessment".to_string()),
        };
    }

    if !survey_completed {
        return CertDecision {
            can_generate: false,
            reason: "Satisfaction survey not completed".to_string(),
            missing_requirement: Some("survey".to_string()),
        };
    }

    CertDecision {
        can_generate: true,
        reason: "All requirements met".to_string(),
        missing_requirement: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_not_passed_denies() {
        let decision = can_generate_certificate(false, true);
        assert!(!decision.can_generate);
        assert_eq!(decision.reason, "Final assessment not passed");
        assert_eq!(decision.missing_requirement.as_deref(), Some("final_assessment"));
    }

    #[test]
    fn test_neither_reports_final_first() {
        let decision = can_generate_certificate(false, false);
        assert_eq!(decision.reason, "Final assessment not passed");
    }

    #[test]
    fn test_survey_missing_denies() {
        let decision = can_generate_certificate(true, false);
        assert!(!decision.can_generate);
        assert!(decision.reason.contains("survey"));
        assert_eq!(decision.missing_requirement.as_deref(), Some("survey"));
    }

    #[test]
    fn test_both_met_allows() {
        let decision = can_generate_certificate(true, true);
        assert!(decision.can_generate);
        assert_eq!(decision.reason, "All requirements met");
        assert!(decision.missing_requirement.is_none());
    }

    #[test]
    fn test_json_omits_missing_requirement_when_allowed() {
        let json = serde_json::to_string(&can_generate_certificate(true, true)).unwrap();
        assert!(!json.contains("missing_requirement"));
    }
}
