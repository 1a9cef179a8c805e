//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::dao::models::MatchType;

/// Rejects the test match type, which only exists as the arena's idle sentinel.
pub fn validate_schedulable_type(match_type: &MatchType) -> Result<(), ValidationError> {
    if *match_type == MatchType::Test {
        let mut err = ValidationError::new("match_type_test");
        err.message = Some("Test matches cannot be scheduled".into());
        return Err(err);
    }
    Ok(())
}
