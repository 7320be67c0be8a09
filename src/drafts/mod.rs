//! Draft generation for pitch blocks.
//!
//! A generator receives the section's exercise data, the protagonist from
//! section 1 and the block's constraints, and returns a candidate narrative.
//! Two implementations ship: deterministic local templates and a remote
//! chat-completions gateway. Callers choose one explicitly.

mod gateway;
pub mod prompts;
pub mod templates;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::blocks::{self, BlockConstraints};
use crate::error::DraftError;
use crate::types::{ExerciseData, PitchData, ProtagonistData};

pub use gateway::GatewayDraftGenerator;
pub use templates::{clean_draft, competitor_test, customer_story, generate_block_draft};

/// Everything a generator needs to draft one block.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRequest {
    pub section_number: u8,
    pub exercises: BTreeMap<String, ExerciseData>,
    pub protagonist: ProtagonistData,
    pub constraints: BlockConstraints,
}

impl DraftRequest {
    /// Assemble the request for `section` from a store snapshot.
    pub fn from_data(section: u8, data: &PitchData) -> Result<Self, DraftError> {
        let block = blocks::block(section).ok_or(DraftError::UnknownBlock(section))?;
        Ok(Self {
            section_number: section,
            exercises: data.section_exercises(section),
            protagonist: data.protagonist(),
            constraints: block.constraints(),
        })
    }
}

#[async_trait]
pub trait DraftGenerator: Send + Sync {
    /// Produce a candidate narrative for the requested block.
    async fn generate(&self, request: &DraftRequest) -> Result<String, DraftError>;
}

/// Local generator backed by the narrative templates.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateDraftGenerator;

#[async_trait]
impl DraftGenerator for TemplateDraftGenerator {
    async fn generate(&self, request: &DraftRequest) -> Result<String, DraftError> {
        let draft = generate_block_draft(
            request.section_number,
            &request.exercises,
            &request.protagonist,
        );
        if draft.is_empty() {
            return Err(DraftError::EmptyDraft);
        }
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SectionData, PROTAGONIST_EXERCISE_ID};

    fn data_with_protagonist() -> PitchData {
        let mut data = PitchData::default();
        let mut section = SectionData::default();
        section.exercises.insert(
            PROTAGONIST_EXERCISE_ID.into(),
            [("nombre".to_string(), "Carlos".to_string())].into_iter().collect(),
        );
        data.sections.insert(1, section);
        data
    }

    #[test]
    fn test_request_reads_section_and_protagonist() {
        let data = data_with_protagonist();
        let request = DraftRequest::from_data(9, &data).unwrap();
        assert_eq!(request.section_number, 9);
        assert_eq!(request.protagonist.name, "Carlos");
        assert!(request.exercises.is_empty());
        assert_eq!(request.constraints.name, "EL CIERRE");
    }

    #[test]
    fn test_request_rejects_unknown_block() {
        assert!(matches!(
            DraftRequest::from_data(0, &PitchData::default()),
            Err(DraftError::UnknownBlock(0))
        ));
    }

    #[tokio::test]
    async fn test_template_generator() {
        let data = data_with_protagonist();
        let request = DraftRequest::from_data(9, &data).unwrap();
        let draft = TemplateDraftGenerator.generate(&request).await.unwrap();
        assert_eq!(draft, "Carlos hoy tiene una vida diferente.");

        let empty = DraftRequest::from_data(7, &data).unwrap();
        assert!(matches!(
            TemplateDraftGenerator.generate(&empty).await,
            Err(DraftError::EmptyDraft)
        ));
    }
}
