//! Transcription model selectors

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User-facing model choice
///
/// Each selector maps to one opaque checkpoint identifier; the checkpoint
/// directory for a selector is `<checkpoint_dir>/<checkpoint_id>`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ModelSelector {
    /// Piano-only model
    #[default]
    Piano,
    /// Multi-instrument model
    MultiInstrument,
}

impl ModelSelector {
    pub const ALL: [ModelSelector; 2] = [ModelSelector::Piano, ModelSelector::MultiInstrument];

    /// Wire name (`piano`, `multi-instrument`)
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSelector::Piano => "piano",
            ModelSelector::MultiInstrument => "multi-instrument",
        }
    }

    /// Checkpoint identifier handed to the inference backend
    pub fn checkpoint_id(&self) -> &'static str {
        match self {
            ModelSelector::Piano => "ismir2021",
            ModelSelector::MultiInstrument => "mt3",
        }
    }
}

impl fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ModelSelector::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "Invalid model type '{}'. Choose from 'piano' or 'multi-instrument'.",
                    s
                ))
            })
    }
}
