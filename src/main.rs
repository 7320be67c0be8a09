//! pitchkit: inspect and export a user's pitch from the local data directory.
//!
//! Usage:
//!   pitchkit <user-id> [status]
//!   pitchkit <user-id> export
//!   pitchkit <user-id> kit
//!   pitchkit <user-id> draft <block> [--local]

use std::process::ExitCode;
use std::sync::Arc;

use pitchkit_lib::drafts::{DraftGenerator, GatewayDraftGenerator, TemplateDraftGenerator};
use pitchkit_lib::export;
use pitchkit_lib::persistence::JsonFilePersistence;
use pitchkit_lib::state::{data_dir, load_config};
use pitchkit_lib::store::PitchStore;
use pitchkit_lib::types::{Identity, BLOCK_NUMBERS};
use pitchkit_lib::util::reading_time_minutes;

const USAGE: &str = "usage: pitchkit <user-id> [status|export|kit|draft <block> [--local]]";

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pitchkit: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &[String]) -> Result<(), String> {
    let user_id = args.first().ok_or(USAGE)?;
    let command = args.get(1).map(String::as_str).unwrap_or("status");

    let config = load_config()?;
    let dir = data_dir(&config)?;
    log::debug!("Using data directory {}", dir.display());
    let store = PitchStore::new(config, Arc::new(JsonFilePersistence::new(dir)));
    store
        .set_identity(&Identity::signed_in(user_id.as_str()))
        .await
        .map_err(|e| e.to_string())?;

    match command {
        "status" => print_status(&store),
        "export" => print!("{}", export::pitch_download_text(&store.snapshot())),
        "kit" => {
            let date = chrono::Local::now().format("%d/%m/%Y").to_string();
            print!("{}", export::pitch_kit_download_text(&store.snapshot(), &date));
        }
        "draft" => {
            let block = args
                .get(2)
                .and_then(|n| n.parse::<u8>().ok())
                .ok_or(USAGE)?;
            let local = args.iter().any(|a| a == "--local");
            let generator: Box<dyn DraftGenerator> = if local {
                Box::new(TemplateDraftGenerator)
            } else {
                Box::new(
                    GatewayDraftGenerator::from_env(&store.config().draft)
                        .map_err(|e| e.to_string())?,
                )
            };
            let draft = store
                .generate_draft(block, generator.as_ref())
                .await
                .map_err(|e| e.user_message().to_string())?;
            store.flush().await.map_err(|e| e.to_string())?;
            println!("{}", draft);
        }
        _ => return Err(USAGE.to_string()),
    }
    Ok(())
}

fn print_status(store: &PitchStore) {
    let completed = store.completed_blocks();
    let total_words = store.total_words();
    let data = store.snapshot();

    println!("{} / {}", data.user_name, data.startup_name);
    println!(
        "Bloques completos: {}/{}",
        completed.len(),
        BLOCK_NUMBERS.count()
    );
    match store.next_incomplete_block() {
        Some(next) => println!("Siguiente bloque: {}", next),
        None => println!("Siguiente bloque: ninguno"),
    }
    println!(
        "Palabras: {} (~{} min)",
        total_words,
        reading_time_minutes(total_words)
    );
    println!(
        "Pitch Kit: {} bloques, {} palabras",
        store.pitch_kit_completed_count(),
        store.pitch_kit_total_words()
    );
    println!("Archivo: {}", export::pitch_file_name(&data.startup_name));
}
