use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Execution mode supplied by the host on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Stochastic masking is active.
    Train,
    /// Deterministic pass-through, used for evaluation and deployment.
    Test,
}

impl Phase {
    pub fn is_train(self) -> bool {
        matches!(self, Phase::Train)
    }
}

impl FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "train" | "training" => Ok(Phase::Train),
            "test" | "inference" | "eval" => Ok(Phase::Test),
            _ => Err(Error::UnsupportedPhase(s.to_string())),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Train => f.write_str("train"),
            Phase::Test => f.write_str("test"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_from_str() {
        assert_eq!("TRAIN".parse::<Phase>().unwrap(), Phase::Train);
        assert_eq!("training".parse::<Phase>().unwrap(), Phase::Train);
        assert_eq!("inference".parse::<Phase>().unwrap(), Phase::Test);
        assert_eq!("Eval".parse::<Phase>().unwrap(), Phase::Test);
        assert!("validate".parse::<Phase>().is_err());
    }
}
