use chrono::{DateTime, Utc};

use crate::types::{ExerciseData, PitchData, PitchKitBlock};

/// Top-level row fields a mutation wrote. Drives the pending-patch buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Touched {
    pub user_info: bool,
    pub blocks: bool,
    pub sections: bool,
    pub pitch_kit: bool,
    pub current_block: bool,
}

impl Touched {
    pub fn is_empty(&self) -> bool {
        *self == Touched::default()
    }

    pub fn merge(&mut self, other: Touched) {
        self.user_info |= other.user_info;
        self.blocks |= other.blocks;
        self.sections |= other.sections;
        self.pitch_kit |= other.pitch_kit;
        self.current_block |= other.current_block;
    }

    /// Field names for log lines, e.g. "blocks,sections".
    pub fn describe(&self) -> String {
        [
            (self.user_info, "user_info"),
            (self.blocks, "blocks"),
            (self.sections, "sections"),
            (self.pitch_kit, "pitch_kit"),
            (self.current_block, "current_block"),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(",")
    }
}

/// One store write, kept as data so it can be replayed over a freshly loaded row.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Mutation {
    UserInfo {
        user_name: String,
        startup_name: String,
    },
    BlockContent {
        block: u8,
        content: String,
    },
    CurrentBlock(u8),
    ExercisePatch {
        section: u8,
        exercise_id: String,
        patch: ExerciseData,
    },
    SectionStep {
        section: u8,
        step: u32,
    },
    SaveToPitchKit {
        block: u8,
        content: String,
        saved_at: DateTime<Utc>,
    },
}

impl Mutation {
    pub(crate) fn apply(&self, data: &mut PitchData) -> Touched {
        let mut touched = Touched::default();
        match self {
            Mutation::UserInfo {
                user_name,
                startup_name,
            } => {
                data.user_name = user_name.clone();
                data.startup_name = startup_name.clone();
                touched.user_info = true;
            }
            Mutation::BlockContent { block, content } => {
                data.blocks.insert(*block, content.clone());
                touched.blocks = true;
                // One-way: clearing the text later leaves the flag set
                if !content.trim().is_empty() {
                    data.sections.entry(*block).or_default().completed = true;
                    touched.sections = true;
                }
            }
            Mutation::CurrentBlock(block) => {
                data.current_block = *block;
                touched.current_block = true;
            }
            Mutation::ExercisePatch {
                section,
                exercise_id,
                patch,
            } => {
                data.sections
                    .entry(*section)
                    .or_default()
                    .exercises
                    .entry(exercise_id.clone())
                    .or_default()
                    .extend(patch.iter().map(|(k, v)| (k.clone(), v.clone())));
                touched.sections = true;
            }
            Mutation::SectionStep { section, step } => {
                data.sections.entry(*section).or_default().current_step = *step;
                touched.sections = true;
            }
            Mutation::SaveToPitchKit {
                block,
                content,
                saved_at,
            } => {
                data.pitch_kit
                    .insert(*block, PitchKitBlock::new(content.clone(), *saved_at));
                touched.pitch_kit = true;
            }
        }
        data.updated_at = Utc::now();
        touched
    }
}
