use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Room mode
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Discussion mode of a room.
///
/// `quick` biases toward fast, low-threshold decisions with short replies;
/// `deep` toward discursive exchanges with a higher approval bar. Only the
/// default voting threshold affects the coordination engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomMode {
    Quick,
    Deep,
}

impl Default for RoomMode {
    fn default() -> Self {
        Self::Deep
    }
}

impl RoomMode {
    pub fn profile(&self) -> ModeProfile {
        match self {
            Self::Quick => ModeProfile {
                default_threshold: 0.4,
                response_style: ResponseStyle::Short,
            },
            Self::Deep => ModeProfile {
                default_threshold: 0.6,
                response_style: ResponseStyle::Discursive,
            },
        }
    }

    pub fn default_threshold(&self) -> f64 {
        self.profile().default_threshold
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Deep => "deep",
        }
    }
}

impl std::fmt::Display for RoomMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-mode tuning table.
#[derive(Debug, Clone, Copy)]
pub struct ModeProfile {
    /// Default share of decisive votes required to approve a proposal.
    pub default_threshold: f64,
    /// Hint forwarded to agents; the server never enforces it.
    pub response_style: ResponseStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStyle {
    Short,
    Discursive,
}
