//! Rotation strategies

use serde::{Deserialize, Serialize};

/// What happens to the superseded generation when a new one is minted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationStrategy {
    /// The new generation replaces `Current`; no `Old` is kept
    #[default]
    InPlace,
    /// The previous `Current` becomes `Old`
    KeepOld,
}

impl RotationStrategy {
    /// Value of the `rotation-strategy` label.
    pub fn as_label_value(&self) -> &'static str {
        match self {
            Self::InPlace => "inplace",
            Self::KeepOld => "keepold",
        }
    }

    /// Parse a `rotation-strategy` label value.
    pub fn from_label_value(value: &str) -> Option<Self> {
        match value {
            "inplace" => Some(Self::InPlace),
            "keepold" => Some(Self::KeepOld),
            _ => None,
        }
    }
}

impl std::fmt::Display for RotationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label_value())
    }
}
