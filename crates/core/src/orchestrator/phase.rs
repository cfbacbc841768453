//! The orchestrator's phase graph (spec §4.6), a hand-rolled transition
//! table in the style of the `Stage` enum used elsewhere in this
//! workspace, rather than a state-machine library -- it removes a
//! third-party dependency from the hot path.

use serde::{Deserialize, Serialize};

/// Nodes {Scan, Analyze, Decide, Fix, Verify, Learn, Report} plus
/// terminals {Done, Aborted} (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Scan,
    Analyze,
    Decide,
    Fix,
    Verify,
    Learn,
    Report,
    Done,
    Aborted,
}

impl Phase {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Scan => "Scan",
            Self::Analyze => "Analyze",
            Self::Decide => "Decide",
            Self::Fix => "Fix",
            Self::Verify => "Verify",
            Self::Learn => "Learn",
            Self::Report => "Report",
            Self::Done => "Done",
            Self::Aborted => "Aborted",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_and_aborted_are_the_only_terminal_phases() {
        for phase in [
            Phase::Scan,
            Phase::Analyze,
            Phase::Decide,
            Phase::Fix,
            Phase::Verify,
            Phase::Learn,
            Phase::Report,
        ] {
            assert!(!phase.is_terminal());
        }
        assert!(Phase::Done.is_terminal());
        assert!(Phase::Aborted.is_terminal());
    }
}
