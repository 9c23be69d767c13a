//! Question bank
//!
//! Supplies (authentic, divergent) prompt pairs grouped into ordered tiers.
//! The built-in bank is compiled into the binary; `QUESTIONS_PATH` replaces it
//! with a JSON file of the same shape.

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::{QuestionPair, Tier};

const BUILTIN_QUESTIONS: &str = include_str!("../data/questions.json");

#[derive(Debug, thiserror::Error)]
pub enum QuestionBankError {
    #[error("Failed to read question file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse question file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Tier {0} has no questions")]
    EmptyTier(String),

    #[error("Question bank has {available} tiers but {required} are configured")]
    NotEnoughTiers { available: usize, required: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionBank {
    tiers: Vec<Tier>,
}

impl QuestionBank {
    /// Build a bank from tiers, rejecting empty tiers
    pub fn new(tiers: Vec<Tier>) -> Result<Self, QuestionBankError> {
        if let Some(empty) = tiers.iter().find(|t| t.questions.is_empty()) {
            return Err(QuestionBankError::EmptyTier(empty.name.clone()));
        }
        Ok(Self { tiers })
    }

    /// The bank compiled into the binary
    pub fn builtin() -> Result<Self, QuestionBankError> {
        Self::from_json(BUILTIN_QUESTIONS)
    }

    pub fn from_json(json: &str) -> Result<Self, QuestionBankError> {
        let bank: QuestionBank = serde_json::from_str(json)?;
        Self::new(bank.tiers)
    }

    pub fn from_path(path: &Path) -> Result<Self, QuestionBankError> {
        let json = std::fs::read_to_string(path)?;
        let bank = Self::from_json(&json)?;
        tracing::info!(
            "Loaded {} question tiers from {}",
            bank.tier_count(),
            path.display()
        );
        Ok(bank)
    }

    /// Make sure the configured number of tiers can be served
    pub fn ensure_tiers(&self, required: usize) -> Result<(), QuestionBankError> {
        if self.tiers.len() < required {
            return Err(QuestionBankError::NotEnoughTiers {
                available: self.tiers.len(),
                required,
            });
        }
        Ok(())
    }

    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    pub fn tier(&self, index: usize) -> Option<&Tier> {
        self.tiers.get(index)
    }

    /// Pick a random pair from a tier. Picks are independent, so a session
    /// may see the same pair twice.
    pub fn pick(&self, tier: usize) -> Option<&QuestionPair> {
        self.tiers
            .get(tier)
            .and_then(|t| t.questions.choose(&mut rand::rng()))
    }
}
