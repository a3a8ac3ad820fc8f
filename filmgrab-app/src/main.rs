use clap::Parser;
use filmgrab_common::observability::{LogConfig, LogFormat, init_logging};
use filmgrab_common::{ArgumentFailure, ExtractionRequest, ExtractionResult, FilmgrabError};
use filmgrab_config::{DEFAULT_SENTINEL, SettingsLoader};
use std::process::ExitCode;
use tracing::{error, info};

/// Render a film page and print its poster URL and overview as JSON.
#[derive(Debug, Parser)]
#[command(name = "filmgrab", version)]
struct Cli {
    /// Film page URL.
    url: String,
}

fn log_config() -> LogConfig {
    let json = std::env::var("FILMGRAB_LOG_FORMAT")
        .map(|raw| raw.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    LogConfig {
        format: if json { LogFormat::Json } else { LogFormat::Text },
        ..LogConfig::default()
    }
}

/// Print the single stdout record.
fn emit(record: serde_json::Result<String>) {
    match record {
        Ok(line) => println!("{line}"),
        Err(e) => error!(target: "filmgrab", error = %e, "result not serializable"),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // stdout carries the result only; diagnostics go to stderr
    if let Err(e) = init_logging(log_config()) {
        eprintln!("logging disabled: {e:#}");
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            error!(target: "filmgrab", "{}", e.render());
            emit(ArgumentFailure::url_required().to_json_line());
            return ExitCode::FAILURE;
        }
    };

    let result = match SettingsLoader::new().load() {
        Ok(settings) => {
            let request = ExtractionRequest::new(cli.url, settings.timeouts.overall_ms);
            info!(target: "filmgrab", url = %request.url, timeout_ms = request.timeout_ms, "extracting");
            filmgrab_extract::extract(&request, &settings).await
        }
        Err(e) => {
            let err = FilmgrabError::Config(e.to_string());
            error!(target: "filmgrab", error = %err, "settings unavailable");
            ExtractionResult::failure(DEFAULT_SENTINEL.to_string(), &err)
        }
    };

    emit(result.to_json_line());
    ExitCode::SUCCESS
}
