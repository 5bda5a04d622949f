//! Review ratings

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Outcome the learner reports for a single review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    /// Forgot the item
    Again = 1,
    /// Recalled with serious difficulty
    Hard = 2,
    /// Recalled after some hesitation
    Good = 3,
    /// Recalled effortlessly
    Easy = 4,
}

impl Rating {
    /// All ratings in ascending order
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    /// Convert from the 1-4 button scale
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Rating::Again),
            2 => Some(Rating::Hard),
            3 => Some(Rating::Good),
            4 => Some(Rating::Easy),
            _ => None,
        }
    }

    /// Convert to the 1-4 button scale
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Again => "again",
            Rating::Hard => "hard",
            Rating::Good => "good",
            Rating::Easy => "easy",
        }
    }

    /// Parse a rating from its name or its 1-4 number
    pub fn parse_name(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<i32>() {
            return Self::from_i32(n).ok_or_else(|| {
                EngineError::Validation(format!("Rating must be between 1 and 4, got {}", n))
            });
        }
        match trimmed.to_lowercase().as_str() {
            "again" => Ok(Rating::Again),
            "hard" => Ok(Rating::Hard),
            "good" => Ok(Rating::Good),
            "easy" => Ok(Rating::Easy),
            _ => Err(EngineError::Validation(format!("Unknown rating: {}", s))),
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Rating {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_name(s)
    }
}

impl TryFrom<i32> for Rating {
    type Error = EngineError;

    fn try_from(value: i32) -> Result<Self> {
        Self::from_i32(value).ok_or_else(|| {
            EngineError::Validation(format!("Rating must be between 1 and 4, got {}", value))
        })
    }
}
