//! Text exports of the pitch and the Pitch Kit.
//!
//! Pure functions over a [`PitchData`] snapshot. Block headings come from the
//! embedded catalog.

use crate::blocks;
use crate::types::{PitchData, BLOCK_NUMBERS};
use crate::util::{reading_time_minutes, slugify};

const PITCH_TRAILER: &str = "---\nCreado con Pitch de Película\npitchdepelicula.com";

/// The "copy all" text: startup name in capitals, then every non-empty block.
pub fn pitch_plain_text(data: &PitchData) -> String {
    let mut text = format!("{}\n\n", data.startup_name.to_uppercase());
    for number in BLOCK_NUMBERS {
        let content = data.block_content(number).trim();
        if !content.is_empty() {
            text.push_str(content);
            text.push_str("\n\n");
        }
    }
    text
}

/// The downloadable pitch: plain text plus the fixed trailer.
pub fn pitch_download_text(data: &PitchData) -> String {
    format!("{}{}", pitch_plain_text(data), PITCH_TRAILER)
}

pub fn pitch_file_name(startup_name: &str) -> String {
    format!("{}-pitch.txt", slugify(startup_name))
}

/// Kit entries with content, in block order, paired with their headings.
fn kit_sections(data: &PitchData) -> Vec<(u8, &str, &str)> {
    BLOCK_NUMBERS
        .filter_map(|number| {
            let entry = data.pitch_kit.get(&number)?;
            if entry.content.is_empty() {
                return None;
            }
            let name = blocks::block(number).map(|b| b.name.as_str()).unwrap_or("");
            Some((number, name, entry.content.as_str()))
        })
        .collect()
}

/// The Pitch Kit as markdown for the clipboard.
pub fn pitch_kit_markdown(data: &PitchData) -> String {
    kit_sections(data)
        .into_iter()
        .map(|(number, name, content)| format!("## {}. {}\n\n{}", number, name, content))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// The downloadable Pitch Kit. `date` is shown as given in the header.
pub fn pitch_kit_download_text(data: &PitchData, date: &str) -> String {
    let total_words = data.pitch_kit_total_words();
    let header = format!(
        "PITCH KIT - {}\nCreado por: {}\nFecha: {}\nPalabras totales: {}\nTiempo estimado de lectura: {} minutos\n\n{}\n\n",
        data.startup_name,
        data.user_name,
        date,
        total_words,
        reading_time_minutes(total_words),
        "=".repeat(50),
    );
    let body = kit_sections(data)
        .into_iter()
        .map(|(number, name, content)| {
            format!("{}. {}\n{}\n\n{}", number, name, "=".repeat(30), content)
        })
        .collect::<Vec<_>>()
        .join("\n\n\n");
    header + &body
}

pub fn pitch_kit_file_name(startup_name: &str) -> String {
    format!("pitch-kit-{}.txt", slugify(startup_name))
}
