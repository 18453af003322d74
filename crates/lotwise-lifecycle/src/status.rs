//! Suggestion status and the allowed transition graph.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a trade suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SuggestionStatus {
    /// Initial state.
    Suggested,
    /// Accepted by the user, execution pending.
    Taken,
    /// At least one batch placed.
    Active,
    Closed,
    Successful,
    Loss,
    Breakeven,
    Rejected,
    Expired,
    Cancelled,
}

impl SuggestionStatus {
    pub const ALL: [SuggestionStatus; 10] = [
        Self::Suggested,
        Self::Taken,
        Self::Active,
        Self::Closed,
        Self::Successful,
        Self::Loss,
        Self::Breakeven,
        Self::Rejected,
        Self::Expired,
        Self::Cancelled,
    ];

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Suggested | Self::Taken | Self::Active)
    }

    /// Closing states reachable from `Active`.
    #[must_use]
    pub fn is_closing(&self) -> bool {
        matches!(
            self,
            Self::Closed | Self::Successful | Self::Loss | Self::Breakeven
        )
    }

    /// Whether the graph has an edge `self -> target`.
    ///
    /// Time-dependent guards (TTL) are checked by the suggestion itself.
    #[must_use]
    pub fn can_transition_to(&self, target: SuggestionStatus) -> bool {
        use SuggestionStatus::*;
        match self {
            Suggested => matches!(target, Taken | Rejected | Expired | Cancelled),
            Taken => matches!(target, Active | Cancelled),
            Active => target.is_closing(),
            _ => false,
        }
    }

    /// Classify a realized P&L by its sign.
    #[must_use]
    pub fn from_pnl(pnl: Decimal) -> Self {
        if pnl > Decimal::ZERO {
            Self::Successful
        } else if pnl < Decimal::ZERO {
            Self::Loss
        } else {
            Self::Breakeven
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Suggested => "SUGGESTED",
            Self::Taken => "TAKEN",
            Self::Active => "ACTIVE",
            Self::Closed => "CLOSED",
            Self::Successful => "SUCCESSFUL",
            Self::Loss => "LOSS",
            Self::Breakeven => "BREAKEVEN",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SuggestionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == upper)
            .ok_or_else(|| format!("unknown suggestion status: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use super::SuggestionStatus::*;

    #[test]
    fn test_terminal_states() {
        let terminal: Vec<_> = SuggestionStatus::ALL
            .iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(terminal.len(), 7);
        assert!(!Suggested.is_terminal());
        assert!(!Taken.is_terminal());
        assert!(!Active.is_terminal());
    }

    #[test]
    fn test_transition_graph() {
        let allowed = [
            (Suggested, Taken),
            (Suggested, Rejected),
            (Suggested, Expired),
            (Suggested, Cancelled),
            (Taken, Active),
            (Taken, Cancelled),
            (Active, Closed),
            (Active, Successful),
            (Active, Loss),
            (Active, Breakeven),
        ];

        for from in SuggestionStatus::ALL {
            for to in SuggestionStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_no_skipping_states() {
        assert!(!Suggested.can_transition_to(Active));
        assert!(!Suggested.can_transition_to(Successful));
        assert!(!Active.can_transition_to(Cancelled));
        assert!(!Taken.can_transition_to(Expired));
    }

    #[test]
    fn test_from_pnl() {
        assert_eq!(SuggestionStatus::from_pnl(dec!(1250.5)), Successful);
        assert_eq!(SuggestionStatus::from_pnl(dec!(-0.01)), Loss);
        assert_eq!(SuggestionStatus::from_pnl(dec!(0)), Breakeven);
    }

    #[test]
    fn test_parse_and_serde() {
        assert_eq!("taken".parse::<SuggestionStatus>().unwrap(), Taken);
        assert!("open".parse::<SuggestionStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&Breakeven).unwrap(),
            "\"BREAKEVEN\""
        );
    }
}
