use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter, EnumString, IntoEnumIterator};

/// Diagnosis labels, in the order the classifier emits them.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    EnumCount,
)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    #[strum(serialize = "covid")]
    Covid,
    #[strum(serialize = "nofinding")]
    NoFinding,
    #[strum(serialize = "pneumonia")]
    Pneumonia,
}

impl Label {
    pub fn from_index(index: usize) -> Option<Self> {
        Self::iter().nth(index)
    }

    pub fn all() -> impl Iterator<Item = Self> {
        Self::iter()
    }

    pub fn count() -> usize {
        Self::COUNT
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PredictionResponse {
    pub prediction: Label,
}
