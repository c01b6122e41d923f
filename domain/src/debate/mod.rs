//! The advocate/skeptic triage mechanism and its deterministic judge
//! (§4.4). Grounded in the same shape as a quorum vote rule — a pure
//! function over two numeric scores and a threshold — but simplified to
//! match the spec's two-agent dialectic instead of N-way voting.

use serde::{Deserialize, Serialize};

/// Output of the advocate agent (role: "PM").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvocateOutput {
    /// Invariant: `0 <= strength_score <= 10`.
    pub strength_score: u8,
    pub key_arguments: Vec<String>,
}

/// Output of the skeptic agent (role: "Reviewer").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkepticOutput {
    /// Invariant: `0 <= weakness_score <= 10`.
    pub weakness_score: u8,
    pub risks: Vec<String>,
}

/// Outcome of the deterministic judge (§4.4): accept iff
/// `strength_score - weakness_score >= threshold`, ties broken as reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebateVerdict {
    pub accepted: bool,
    pub strength_score: u8,
    pub weakness_score: u8,
    pub threshold: i32,
}

/// Apply the fixed threshold rule. `threshold` defaults to 2 (§9 Open
/// Questions) but is a configuration parameter, never a hard-coded
/// constant in the caller.
pub fn judge(advocate: &AdvocateOutput, skeptic: &SkepticOutput, threshold: i32) -> DebateVerdict {
    let margin = advocate.strength_score as i32 - skeptic.weakness_score as i32;
    DebateVerdict {
        accepted: margin >= threshold,
        strength_score: advocate.strength_score,
        weakness_score: skeptic.weakness_score,
        threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advocate(strength: u8) -> AdvocateOutput {
        AdvocateOutput {
            strength_score: strength,
            key_arguments: vec![],
        }
    }

    fn skeptic(weakness: u8) -> SkepticOutput {
        SkepticOutput {
            weakness_score: weakness,
            risks: vec![],
        }
    }

    #[test]
    fn accepts_when_margin_meets_threshold() {
        let verdict = judge(&advocate(8), &skeptic(4), 2);
        assert!(verdict.accepted);
    }

    #[test]
    fn rejects_when_margin_below_threshold() {
        let verdict = judge(&advocate(6), &skeptic(5), 2);
        assert!(!verdict.accepted);
    }

    #[test]
    fn ties_are_rejected_unless_threshold_is_zero() {
        let verdict = judge(&advocate(5), &skeptic(5), 2);
        assert!(!verdict.accepted);

        let lenient = judge(&advocate(5), &skeptic(5), 0);
        assert!(lenient.accepted);
    }

    #[test]
    fn boundary_margin_exactly_meets_threshold() {
        let verdict = judge(&advocate(7), &skeptic(5), 2);
        assert!(verdict.accepted);
    }

    #[test]
    fn negative_margin_never_accepted_with_positive_threshold() {
        let verdict = judge(&advocate(2), &skeptic(9), 2);
        assert!(!verdict.accepted);
    }
}
