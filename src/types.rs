use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::count_words;

/// The nine fixed pitch blocks.
pub const BLOCK_NUMBERS: RangeInclusive<u8> = 1..=9;

/// Section holding the protagonist casting exercise.
pub const PROTAGONIST_SECTION: u8 = 1;

/// Exercise id of the protagonist casting exercise within section 1.
pub const PROTAGONIST_EXERCISE_ID: &str = "1_4";

pub fn is_valid_block(number: u8) -> bool {
    BLOCK_NUMBERS.contains(&number)
}

/// Free-form field values of one exercise, keyed by field id.
pub type ExerciseData = BTreeMap<String, String>;

// =============================================================================
// Pitch data
// =============================================================================

/// Wizard progress for one section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionData {
    #[serde(default)]
    pub exercises: BTreeMap<String, ExerciseData>,
    #[serde(default)]
    pub current_step: u32,
    /// Set once the block receives non-empty content. Never cleared automatically.
    #[serde(default, alias = "completado")]
    pub completed: bool,
}

/// A user-curated snapshot of a finished block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchKitBlock {
    pub content: String,
    pub saved_at: DateTime<Utc>,
    /// Snapshot taken at save time; not recomputed.
    pub word_count: usize,
}

impl PitchKitBlock {
    pub fn new(content: String, saved_at: DateTime<Utc>) -> Self {
        let word_count = count_words(&content);
        Self {
            content,
            saved_at,
            word_count,
        }
    }
}

/// Root aggregate: one per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchData {
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub startup_name: String,
    #[serde(default)]
    pub blocks: BTreeMap<u8, String>,
    #[serde(default)]
    pub sections: BTreeMap<u8, SectionData>,
    #[serde(default)]
    pub pitch_kit: BTreeMap<u8, PitchKitBlock>,
    #[serde(default = "default_current_block")]
    pub current_block: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_current_block() -> u8 {
    1
}

impl Default for PitchData {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            user_name: String::new(),
            startup_name: String::new(),
            blocks: BTreeMap::new(),
            sections: BTreeMap::new(),
            pitch_kit: BTreeMap::new(),
            current_block: default_current_block(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl PitchData {
    /// Whether onboarding captured both names.
    pub fn has_started(&self) -> bool {
        !self.user_name.is_empty() && !self.startup_name.is_empty()
    }

    pub fn block_content(&self, number: u8) -> &str {
        self.blocks.get(&number).map(String::as_str).unwrap_or("")
    }

    pub fn is_block_completed(&self, number: u8) -> bool {
        !self.block_content(number).trim().is_empty()
    }

    /// Block numbers with non-empty content, ascending.
    pub fn completed_blocks(&self) -> Vec<u8> {
        BLOCK_NUMBERS
            .filter(|n| self.is_block_completed(*n))
            .collect()
    }

    /// Lowest block without content, or `None` once all nine are written.
    pub fn next_incomplete_block(&self) -> Option<u8> {
        BLOCK_NUMBERS.into_iter().find(|n| !self.is_block_completed(*n))
    }

    /// Words across all blocks, space-joined.
    pub fn total_words(&self) -> usize {
        let joined = BLOCK_NUMBERS
            .map(|n| self.block_content(n))
            .collect::<Vec<_>>()
            .join(" ");
        count_words(&joined)
    }

    pub fn section_exercises(&self, section: u8) -> BTreeMap<String, ExerciseData> {
        self.sections
            .get(&section)
            .map(|s| s.exercises.clone())
            .unwrap_or_default()
    }

    pub fn section_step(&self, section: u8) -> u32 {
        self.sections
            .get(&section)
            .map(|s| s.current_step)
            .unwrap_or(0)
    }

    /// The wizard's sticky completion flag, independent of current block content.
    pub fn is_section_marked_completed(&self, section: u8) -> bool {
        self.sections
            .get(&section)
            .map(|s| s.completed)
            .unwrap_or(false)
    }

    pub fn protagonist(&self) -> ProtagonistData {
        self.sections
            .get(&PROTAGONIST_SECTION)
            .and_then(|s| s.exercises.get(PROTAGONIST_EXERCISE_ID))
            .map(ProtagonistData::from_fields)
            .unwrap_or_default()
    }

    /// Kit entries whose content is non-empty after trim.
    pub fn pitch_kit_completed_count(&self) -> usize {
        self.pitch_kit
            .values()
            .filter(|b| !b.content.trim().is_empty())
            .count()
    }

    /// Sum of stored word-count snapshots.
    pub fn pitch_kit_total_words(&self) -> usize {
        self.pitch_kit.values().map(|b| b.word_count).sum()
    }
}

// =============================================================================
// Protagonist
// =============================================================================

/// The person cast in section 1 and reused by later sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtagonistData {
    pub name: String,
    pub age: String,
    pub profession: String,
    pub city: String,
    pub context: String,
    pub aspiration: String,
    pub routine: String,
    pub frustration: String,
}

impl ProtagonistData {
    /// Read the named fields out of the casting exercise; missing keys become "".
    pub fn from_fields(fields: &ExerciseData) -> Self {
        let get = |key: &str| fields.get(key).cloned().unwrap_or_default();
        Self {
            name: get("nombre"),
            age: get("edad"),
            profession: get("profesion"),
            city: get("ciudad"),
            context: get("contexto"),
            aspiration: get("aspiracion"),
            routine: get("rutina"),
            frustration: get("frustracion"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_fields().iter().all(|(_, v)| v.trim().is_empty())
    }

    /// `(field id, value)` pairs in display order, using the exercise's field ids.
    pub fn as_fields(&self) -> [(&'static str, &str); 8] {
        [
            ("nombre", self.name.as_str()),
            ("edad", self.age.as_str()),
            ("profesion", self.profession.as_str()),
            ("ciudad", self.city.as_str()),
            ("contexto", self.context.as_str()),
            ("aspiracion", self.aspiration.as_str()),
            ("rutina", self.routine.as_str()),
            ("frustracion", self.frustration.as_str()),
        ]
    }
}

// =============================================================================
// Sync status
// =============================================================================

/// Observable persistence status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

/// What the auth layer currently knows about the signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Option<String>,
    pub loading: bool,
}

impl Identity {
    pub fn loading() -> Self {
        Self {
            user_id: None,
            loading: true,
        }
    }

    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            loading: false,
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration stored in ~/.pitchkit/config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Quiet period before the store writes its coalesced patch.
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,
    /// Quiet period after the last keystroke before the editor commits.
    #[serde(default = "default_editor_debounce_ms")]
    pub editor_debounce_ms: u64,
    /// Periodic editor autosave (only when dirty).
    #[serde(default = "default_autosave_interval_secs")]
    pub autosave_interval_secs: u64,
    /// How long `Saved`/`Error` stay visible before reverting to `Idle`.
    #[serde(default = "default_status_reset_ms")]
    pub status_reset_ms: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Directory for the file-backed persistence collaborator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub draft: DraftConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            save_debounce_ms: default_save_debounce_ms(),
            editor_debounce_ms: default_editor_debounce_ms(),
            autosave_interval_secs: default_autosave_interval_secs(),
            status_reset_ms: default_status_reset_ms(),
            retry: RetryPolicy::default(),
            data_dir: None,
            draft: DraftConfig::default(),
        }
    }
}

fn default_save_debounce_ms() -> u64 {
    500
}

fn default_editor_debounce_ms() -> u64 {
    3000
}

fn default_autosave_interval_secs() -> u64 {
    30
}

fn default_status_reset_ms() -> u64 {
    2000
}

/// What to do when an upsert fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum RetryPolicy {
    /// Single attempt; the store reports `Error` and stays unsynced until the next save.
    #[default]
    None,
    /// Re-attempt with linear backoff (`backoff_ms * attempt`).
    #[serde(rename_all = "camelCase")]
    Bounded { max_attempts: u32, backoff_ms: u64 },
}

impl RetryPolicy {
    /// Total attempts including the first.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryPolicy::None => 1,
            RetryPolicy::Bounded { max_attempts, .. } => (*max_attempts).max(1),
        }
    }

    /// Wait before the attempt following failed attempt number `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        match self {
            RetryPolicy::None => Duration::ZERO,
            RetryPolicy::Bounded { backoff_ms, .. } => {
                Duration::from_millis(backoff_ms.saturating_mul(u64::from(attempt)))
            }
        }
    }
}

/// Remote draft generator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftConfig {
    #[serde(default = "default_draft_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_draft_model")]
    pub model: String,
    /// Environment variable holding the bearer token.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            endpoint: default_draft_endpoint(),
            model: default_draft_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_draft_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_draft_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "PITCHKIT_AI_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    500
}

fn default_temperature() -> f32 {
    0.7
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_with_blocks(blocks: &[(u8, &str)]) -> PitchData {
        let mut data = PitchData::default();
        for (n, text) in blocks {
            data.blocks.insert(*n, text.to_string());
        }
        data
    }

    #[test]
    fn test_completion_is_derived_from_trimmed_content() {
        let data = data_with_blocks(&[(1, "hola"), (2, "   "), (4, "\n texto \n")]);
        for n in BLOCK_NUMBERS {
            let expected = !data.block_content(n).trim().is_empty();
            assert_eq!(data.is_block_completed(n), expected, "block {n}");
        }
        assert_eq!(data.completed_blocks(), vec![1, 4]);
    }

    #[test]
    fn test_next_incomplete_block() {
        let data = data_with_blocks(&[(1, "a"), (2, "b"), (4, "d")]);
        assert_eq!(data.next_incomplete_block(), Some(3));

        let all: Vec<(u8, &str)> = BLOCK_NUMBERS.map(|n| (n, "x")).collect();
        assert_eq!(data_with_blocks(&all).next_incomplete_block(), None);
    }

    #[test]
    fn test_total_words_joins_blocks() {
        let data = data_with_blocks(&[(1, "uno dos"), (2, "tres"), (3, "  ")]);
        assert_eq!(data.total_words(), 3);
    }

    #[test]
    fn test_derivations_ignore_keys_outside_the_catalog() {
        let mut data = PitchData::default();
        data.blocks.insert(0, "bloque cero".into());
        data.blocks.insert(12, "bloque doce".into());
        data.blocks.insert(4, "tracción real".into());
        assert_eq!(data.completed_blocks(), vec![4]);
        assert_eq!(data.total_words(), 2);
    }

    #[test]
    fn test_has_started_requires_both_names() {
        let mut data = PitchData::default();
        assert!(!data.has_started());
        data.user_name = "Ana".into();
        assert!(!data.has_started());
        data.startup_name = "Brisa".into();
        assert!(data.has_started());
    }

    #[test]
    fn test_protagonist_defaults_missing_fields() {
        let mut data = PitchData::default();
        assert!(data.protagonist().is_empty());

        let mut fields = ExerciseData::new();
        fields.insert("nombre".into(), "Carlos".into());
        fields.insert("ciudad".into(), "Medellín".into());
        data.sections.insert(
            PROTAGONIST_SECTION,
            SectionData {
                exercises: BTreeMap::from([(PROTAGONIST_EXERCISE_ID.to_string(), fields)]),
                ..SectionData::default()
            },
        );

        let p = data.protagonist();
        assert_eq!(p.name, "Carlos");
        assert_eq!(p.city, "Medellín");
        assert_eq!(p.age, "");
        assert_eq!(p.frustration, "");
        assert!(!p.is_empty());
    }

    #[test]
    fn test_pitch_kit_totals_use_snapshots() {
        let mut data = PitchData::default();
        data.pitch_kit.insert(1, PitchKitBlock::new("uno dos tres".into(), Utc::now()));
        let mut stale = PitchKitBlock::new("a b".into(), Utc::now());
        stale.word_count = 10;
        data.pitch_kit.insert(2, stale);
        data.pitch_kit.insert(3, PitchKitBlock::new("   ".into(), Utc::now()));

        assert_eq!(data.pitch_kit_completed_count(), 2);
        assert_eq!(data.pitch_kit_total_words(), 13);
    }

    #[test]
    fn test_section_data_accepts_legacy_flag_name() {
        let section: SectionData =
            serde_json::from_str(r#"{"exercises":{},"currentStep":2,"completado":true}"#).unwrap();
        assert!(section.completed);
        assert_eq!(section.current_step, 2);
    }

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.save_debounce_ms, 500);
        assert_eq!(config.editor_debounce_ms, 3000);
        assert_eq!(config.autosave_interval_secs, 30);
        assert_eq!(config.retry, RetryPolicy::None);
        assert_eq!(config.draft.max_tokens, 500);
    }

    #[test]
    fn test_retry_policy_json_shape() {
        let config: Config = serde_json::from_str(
            r#"{"retry":{"mode":"bounded","maxAttempts":3,"backoffMs":250}}"#,
        )
        .unwrap();
        assert_eq!(
            config.retry,
            RetryPolicy::Bounded {
                max_attempts: 3,
                backoff_ms: 250
            }
        );
        assert_eq!(config.retry.attempts(), 3);
        assert_eq!(RetryPolicy::None.attempts(), 1);
    }

    #[test]
    fn test_retry_backoff_is_linear_and_saturates() {
        let policy = RetryPolicy::Bounded {
            max_attempts: 3,
            backoff_ms: 250,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(250));
        assert_eq!(policy.backoff(2), Duration::from_millis(500));
        assert_eq!(RetryPolicy::None.backoff(2), Duration::ZERO);

        let huge = RetryPolicy::Bounded {
            max_attempts: 5,
            backoff_ms: u64::MAX,
        };
        assert_eq!(huge.backoff(4), Duration::from_millis(u64::MAX));
    }
}
