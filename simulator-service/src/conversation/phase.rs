//! Conversation phases and the rule that advances them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the five scripted stages of a simulator session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Phase {
    /// Greeting and preferred-name question.
    #[default]
    Greeting = 1,
    /// Effective-prompt concepts.
    Concepts = 2,
    /// Drafting a prompt for the reply email.
    Practice = 3,
    /// Critique of the draft and a demonstration.
    Feedback = 4,
    /// Recap and closing advice.
    Closing = 5,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Greeting,
        Phase::Concepts,
        Phase::Practice,
        Phase::Feedback,
        Phase::Closing,
    ];

    /// Phase for a 1-based number, `None` outside 1..=5.
    pub fn from_number(number: i64) -> Option<Self> {
        match number {
            1 => Some(Phase::Greeting),
            2 => Some(Phase::Concepts),
            3 => Some(Phase::Practice),
            4 => Some(Phase::Feedback),
            5 => Some(Phase::Closing),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn is_terminal(self) -> bool {
        self == Phase::Closing
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl From<Phase> for u8 {
    fn from(phase: Phase) -> Self {
        phase.number()
    }
}

impl TryFrom<u8> for Phase {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Phase::from_number(value as i64).ok_or_else(|| format!("phase out of range: {}", value))
    }
}

/// Decide the phase for the turn being answered.
///
/// `user_turn_count` already includes the message being answered. Each phase
/// has a single trigger; when it does not hold the phase is unchanged, so a
/// call advances at most one step and never past [`Phase::Closing`].
pub fn next_phase(current: Phase, user_turn_count: u32) -> Phase {
    match current {
        Phase::Greeting if user_turn_count == 1 => Phase::Concepts,
        Phase::Concepts if user_turn_count == 2 => Phase::Practice,
        Phase::Practice if user_turn_count >= 3 => Phase::Feedback,
        Phase::Feedback if user_turn_count >= 4 => Phase::Closing,
        unchanged => unchanged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table() {
        assert_eq!(next_phase(Phase::Greeting, 1), Phase::Concepts);
        assert_eq!(next_phase(Phase::Concepts, 2), Phase::Practice);
        assert_eq!(next_phase(Phase::Practice, 3), Phase::Feedback);
        assert_eq!(next_phase(Phase::Practice, 10), Phase::Feedback);
        assert_eq!(next_phase(Phase::Feedback, 4), Phase::Closing);
        assert_eq!(next_phase(Phase::Feedback, 9), Phase::Closing);
    }

    #[test]
    fn closing_is_terminal() {
        for count in [0, 1, 2, 5, 100, u32::MAX] {
            assert_eq!(next_phase(Phase::Closing, count), Phase::Closing);
        }
    }

    #[test]
    fn unmet_trigger_keeps_phase() {
        assert_eq!(next_phase(Phase::Greeting, 0), Phase::Greeting);
        assert_eq!(next_phase(Phase::Greeting, 2), Phase::Greeting);
        assert_eq!(next_phase(Phase::Concepts, 1), Phase::Concepts);
        assert_eq!(next_phase(Phase::Concepts, 3), Phase::Concepts);
        assert_eq!(next_phase(Phase::Practice, 2), Phase::Practice);
        assert_eq!(next_phase(Phase::Feedback, 3), Phase::Feedback);
    }

    #[test]
    fn never_moves_backwards_or_skips() {
        for phase in Phase::ALL {
            for count in 0..20 {
                let next = next_phase(phase, count);
                assert!(next >= phase);
                assert!(next.number() - phase.number() <= 1);
            }
        }
    }

    #[test]
    fn number_round_trips_through_from_number() {
        for phase in Phase::ALL {
            assert_eq!(Phase::from_number(phase.number() as i64), Some(phase));
        }
        assert_eq!(Phase::from_number(0), None);
        assert_eq!(Phase::from_number(6), None);
    }

    #[test]
    fn serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Phase::Practice).unwrap(), "3");
        assert_eq!(serde_json::from_str::<Phase>("5").unwrap(), Phase::Closing);
        assert!(serde_json::from_str::<Phase>("7").is_err());
    }
}
