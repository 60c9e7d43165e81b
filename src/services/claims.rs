use crate::api::error::AppError;

/// Claim lifecycle: pending -> approved | rejected, approved -> completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl ClaimStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }

    pub fn is_pending(self) -> bool {
        self == Self::Pending
    }

    /// Whether a reviewer may move a claim from `self` to `next`.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Rejected)
                | (Self::Approved, Self::Completed)
        )
    }
}

/// Parse a stored claim status, treating unknown strings as data corruption.
pub fn parse_stored_status(s: &str) -> Result<ClaimStatus, AppError> {
    ClaimStatus::parse(s)
        .ok_or_else(|| AppError::Internal(format!("invalid claim status in database: {s}")))
}

/// Guard for claimant-side mutation (edit message, delete): only the
/// claimant, and only while the claim is pending.
pub fn check_claimant_mutation(
    claim_status: ClaimStatus,
    claimant_id: &str,
    caller_id: &str,
) -> Result<(), AppError> {
    if claimant_id != caller_id {
        return Err(AppError::Forbidden(
            "Only the claimant can modify this claim".to_string(),
        ));
    }
    if !claim_status.is_pending() {
        return Err(AppError::BadRequest(
            "Claim can only be modified while pending".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        for s in ["pending", "approved", "rejected", "completed"] {
            assert_eq!(ClaimStatus::parse(s).unwrap().as_str(), s);
        }
        assert!(ClaimStatus::parse("cancelled").is_none());
    }

    #[test]
    fn review_transitions() {
        use ClaimStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Completed));

        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Completed.can_transition_to(Approved));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn claimant_mutation_guards() {
        assert!(check_claimant_mutation(ClaimStatus::Pending, "u1", "u1").is_ok());

        // Wrong user is forbidden even while pending.
        assert!(matches!(
            check_claimant_mutation(ClaimStatus::Pending, "u1", "u2"),
            Err(AppError::Forbidden(_))
        ));

        // Right user, settled claim: policy violation, not a crash.
        assert!(matches!(
            check_claimant_mutation(ClaimStatus::Approved, "u1", "u1"),
            Err(AppError::BadRequest(_))
        ));
    }
}
