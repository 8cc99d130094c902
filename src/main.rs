use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use setu_translate::cancellation::TaskGeneration;
use setu_translate::config::TranslatorConfig;
use setu_translate::{
    build_service, init_tracing, normalize_lang, translate_questions_with_cancel, Question,
};

/// Translate a quiz question set, warming the shared translation cache.
#[derive(Debug, Parser)]
#[command(name = "setu-translate", version)]
struct Cli {
    /// Target language name or code (e.g. "Hindi", "hi").
    #[arg(short, long)]
    lang: String,

    /// JSON file with the question array. Reads stdin when omitted.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Skip the shared cache even if a Firestore project is configured.
    #[arg(long)]
    local_only: bool,

    /// Emit logs as JSON.
    #[arg(long)]
    log_json: bool,

    /// Log latency and cache counters when done.
    #[arg(long)]
    metrics: bool,
}

fn read_questions(input: Option<&PathBuf>) -> Result<Vec<Question>, String> {
    let raw = match input {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("failed to read stdin: {e}"))?;
            buf
        }
    };
    serde_json::from_str(&raw).map_err(|e| format!("invalid question JSON: {e}"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let questions = match read_questions(cli.input.as_ref()) {
        Ok(q) => q,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let config = TranslatorConfig::from_env();
    let service = match build_service(&config, cli.local_only) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to build translation service");
            return ExitCode::FAILURE;
        }
    };

    let lang = normalize_lang(Some(cli.lang.as_str()));
    info!(lang = %lang, questions = questions.len(), "translating quiz");

    let generations = TaskGeneration::new();
    let guard = generations.cancel_and_advance();

    let load = async {
        service.preload(lang).await;
        translate_questions_with_cancel(&service, &questions, lang, guard.token()).await
    };

    let translated = tokio::select! {
        out = load => out,
        _ = tokio::signal::ctrl_c() => {
            generations.cancel_all();
            info!("interrupted");
            return ExitCode::FAILURE;
        }
    };

    if cli.metrics {
        let m = service.metrics();
        info!(counters = ?m.counters(), latency = ?m.summary(), "translation metrics");
    }

    match serde_json::to_string_pretty(&translated) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "failed to serialize result");
            ExitCode::FAILURE
        }
    }
}
