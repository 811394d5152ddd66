//! Immutable stage definitions for the brewing process.

use crate::types::StageDefinition;
use std::collections::HashSet;
use std::sync::Arc;

/// Ordered, validated list of stage definitions.
///
/// Cloning is cheap; every run built from the same table shares it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTable {
    stages: Arc<[StageDefinition]>,
}

impl StageTable {
    pub fn new(stages: Vec<StageDefinition>) -> Result<Self, StageTableError> {
        if stages.is_empty() {
            return Err(StageTableError::Empty);
        }

        let mut seen = HashSet::new();
        for (index, stage) in stages.iter().enumerate() {
            if stage.id.trim().is_empty() {
                return Err(StageTableError::MissingId { index });
            }
            if !seen.insert(stage.id.as_str()) {
                return Err(StageTableError::DuplicateId(stage.id.clone()));
            }
        }

        Ok(Self {
            stages: stages.into(),
        })
    }

    /// The seven-stage all-grain process from grain to conditioned beer.
    pub fn brewing_default() -> Self {
        Self {
            stages: default_brewing_stages().into(),
        }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StageDefinition> {
        self.stages.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageDefinition> {
        self.stages.iter()
    }

    pub fn total_planned_minutes(&self) -> u64 {
        self.stages
            .iter()
            .map(|stage| u64::from(stage.duration_minutes))
            .sum()
    }
}

impl Default for StageTable {
    fn default() -> Self {
        Self::brewing_default()
    }
}

pub fn default_brewing_stages() -> Vec<StageDefinition> {
    vec![
        StageDefinition::new("milling", "Milling", 15)
            .with_description("Crushing the grain to expose the starches")
            .with_notes("Ensure consistent grain crush for optimal extraction"),
        StageDefinition::new("mashing", "Mashing", 60)
            .with_description("Converting starches to fermentable sugars")
            .with_temperature(152)
            .with_notes("Maintain steady temperature for enzyme activity"),
        StageDefinition::new("lautering", "Lautering", 45)
            .with_description("Separating wort from grain husks")
            .with_notes("Slow and steady sparge for clear wort"),
        StageDefinition::new("boiling", "Boiling", 90)
            .with_description("Sterilizing wort and adding hops")
            .with_temperature(212)
            .with_notes("Add hops according to recipe schedule"),
        StageDefinition::new("cooling", "Cooling", 30)
            .with_description("Rapidly cooling wort to fermentation temperature")
            .with_temperature(68)
            .with_notes("Cool quickly to prevent contamination"),
        StageDefinition::new("fermentation", "Fermentation", 10_080) // 7 days
            .with_description("Yeast converts sugars to alcohol and CO2")
            .with_temperature(68)
            .with_notes("Monitor temperature and airlock activity"),
        StageDefinition::new("conditioning", "Conditioning", 20_160) // 14 days
            .with_description("Beer matures and flavors develop")
            .with_temperature(38)
            .with_notes("Allow time for flavors to meld and clarify"),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageTableError {
    Empty,
    MissingId { index: usize },
    DuplicateId(String),
}

impl std::fmt::Display for StageTableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageTableError::Empty => write!(f, "stage table must contain at least one stage"),
            StageTableError::MissingId { index } => {
                write!(f, "stage at position {} has an empty id", index)
            }
            StageTableError::DuplicateId(id) => write!(f, "duplicate stage id: {}", id),
        }
    }
}

impl std::error::Error for StageTableError {}
