use serde::{Deserialize, Serialize};

use crate::util::count_words;

/// One of the nine pitch blocks with its word range and writing guidance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDefinition {
    pub number: u8,
    pub name: String,
    pub question: String,
    pub min_words: usize,
    pub max_words: usize,
    pub placeholder: String,
    pub structure: Vec<BlockStructure>,
    pub restrictions: Vec<String>,
    pub prohibited: Vec<String>,
    pub example: String,
}

/// A recommended beat inside a block ("1. Personaje (15-20 palabras)").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockStructure {
    pub title: String,
    pub description: String,
}

/// The bundle of constraints handed to a draft generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockConstraints {
    pub name: String,
    pub min_words: usize,
    pub max_words: usize,
    pub structure: Vec<BlockStructure>,
    pub restrictions: Vec<String>,
    pub prohibited: Vec<String>,
    pub example: String,
}

/// Where a text sits relative to its block's word range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WordCountStatus {
    Under,
    InRange,
    Over,
}

impl BlockDefinition {
    pub fn constraints(&self) -> BlockConstraints {
        BlockConstraints {
            name: self.name.clone(),
            min_words: self.min_words,
            max_words: self.max_words,
            structure: self.structure.clone(),
            restrictions: self.restrictions.clone(),
            prohibited: self.prohibited.clone(),
            example: self.example.clone(),
        }
    }

    pub fn word_count_status(&self, text: &str) -> WordCountStatus {
        let words = count_words(text);
        if words < self.min_words {
            WordCountStatus::Under
        } else if words > self.max_words {
            WordCountStatus::Over
        } else {
            WordCountStatus::InRange
        }
    }
}
