//! Lifecycle of a single registration or login ceremony.
//!
//! ```text
//! Started -> ChallengeIssued -> ConsumedValid -> Completed
//!                           \-> ConsumedInvalid | Expired | Replayed -> Failed
//! ```
//!
//! `Completed` and `Failed` are terminal. Events arriving after a terminal
//! state are ignored, and an event that does not fit the current state fails
//! the ceremony.

use crate::domain::ChallengePurpose;
use crate::error::ChallengeRejection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeremonyState {
    Started,
    ChallengeIssued,
    ConsumedValid,
    ConsumedInvalid,
    Expired,
    Replayed,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeremonyEvent {
    /// The challenge was recorded and options handed out.
    ChallengeIssued,
    /// The challenge presented at finish was consumed successfully.
    ChallengeConsumed,
    /// The challenge presented at finish was refused.
    ChallengeRejected(ChallengeRejection),
    /// Signature, binding and persistence checks all passed.
    Verified,
    /// Any other failure.
    Rejected,
}

impl CeremonyState {
    // ---
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// The state after `event`.
    pub fn on(self, event: CeremonyEvent) -> Self {
        // ---
        use CeremonyEvent as E;

        if self.is_terminal() {
            return self;
        }

        match (self, event) {
            (Self::Started, E::ChallengeIssued) => Self::ChallengeIssued,
            (Self::ChallengeIssued, E::ChallengeConsumed) => Self::ConsumedValid,
            (Self::ChallengeIssued, E::ChallengeRejected(ChallengeRejection::Expired)) => {
                Self::Expired
            }
            (Self::ChallengeIssued, E::ChallengeRejected(ChallengeRejection::Replayed)) => {
                Self::Replayed
            }
            (Self::ChallengeIssued, E::ChallengeRejected(_)) => Self::ConsumedInvalid,
            (Self::ConsumedValid, E::Verified) => Self::Completed,
            _ => Self::Failed,
        }
    }
}

/// One ceremony instance, tracked for logging and metrics.
#[derive(Debug)]
pub struct Ceremony {
    // ---
    purpose: ChallengePurpose,
    state: CeremonyState,
}

impl Ceremony {
    // ---
    /// A ceremony at its start step.
    pub fn start(purpose: ChallengePurpose) -> Self {
        // ---
        Self {
            purpose,
            state: CeremonyState::Started,
        }
    }

    /// A ceremony picked up at its finish step; the challenge was issued by an
    /// earlier request.
    pub fn resume(purpose: ChallengePurpose) -> Self {
        // ---
        Self {
            purpose,
            state: CeremonyState::ChallengeIssued,
        }
    }

    pub fn purpose(&self) -> ChallengePurpose {
        self.purpose
    }

    pub fn state(&self) -> CeremonyState {
        self.state
    }

    pub fn advance(&mut self, event: CeremonyEvent) -> CeremonyState {
        // ---
        let next = self.state.on(event);
        if next != self.state {
            tracing::trace!(
                "{} ceremony: {:?} -> {:?}",
                self.purpose.as_str(),
                self.state,
                next
            );
        }
        self.state = next;
        next
    }

    /// Drives any non-terminal state to its terminal outcome.
    pub fn settle(&mut self, succeeded: bool) -> CeremonyState {
        // ---
        let event = if succeeded {
            CeremonyEvent::Verified
        } else {
            CeremonyEvent::Rejected
        };
        self.advance(event)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use CeremonyEvent as E;
    use CeremonyState as S;

    #[test]
    fn happy_path_reaches_completed() {
        // ---
        let mut c = Ceremony::start(ChallengePurpose::Registration);
        assert_eq!(c.advance(E::ChallengeIssued), S::ChallengeIssued);
        assert_eq!(c.advance(E::ChallengeConsumed), S::ConsumedValid);
        assert_eq!(c.settle(true), S::Completed);
    }

    #[test]
    fn rejected_challenges_end_in_failed() {
        // ---
        for (rejection, intermediate) in [
            (ChallengeRejection::Expired, S::Expired),
            (ChallengeRejection::Replayed, S::Replayed),
            (ChallengeRejection::Unknown, S::ConsumedInvalid),
            (ChallengeRejection::PurposeMismatch, S::ConsumedInvalid),
        ] {
            let mut c = Ceremony::resume(ChallengePurpose::Login);
            assert_eq!(c.advance(E::ChallengeRejected(rejection)), intermediate);
            assert_eq!(c.settle(false), S::Failed);
        }
    }

    #[test]
    fn terminal_states_are_sticky() {
        // ---
        let mut done = Ceremony::resume(ChallengePurpose::Login);
        done.advance(E::ChallengeConsumed);
        done.settle(true);
        for event in [E::ChallengeIssued, E::ChallengeConsumed, E::Rejected] {
            assert_eq!(done.advance(event), S::Completed);
        }

        let mut failed = Ceremony::resume(ChallengePurpose::Login);
        failed.settle(false);
        assert_eq!(failed.advance(E::Verified), S::Failed);
        assert_eq!(failed.advance(E::ChallengeConsumed), S::Failed);
    }

    #[test]
    fn verification_without_consumed_challenge_fails() {
        // ---
        assert_eq!(S::ChallengeIssued.on(E::Verified), S::Failed);
        assert_eq!(S::Started.on(E::ChallengeConsumed), S::Failed);
    }

    #[test]
    fn a_valid_challenge_cannot_be_rejected_later() {
        // ---
        let state = S::ConsumedValid.on(E::ChallengeRejected(ChallengeRejection::Replayed));
        assert_eq!(state, S::Failed);
    }
}
