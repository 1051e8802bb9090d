use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use otter_importer::browser::picker_label;
use otter_importer::credentials::seal_plaintext_password;
use otter_importer::render::daily_page_title;
use otter_importer::scheduler::load_render_options;
use otter_importer::{
    AutoImportScheduler, BlockWriter, CredentialSource, ForwardingClient, ForwardingSource, ImportOrchestrator,
    ImportTarget, ImportTracker, ImporterConfig, JsonFileSettings, MarkdownPageWriter,
    SpeechBrowser,
};
use shared::telemetry::{self, TelemetryConfig};
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};

/// Imports Otter.ai transcripts into markdown note pages.
#[derive(Parser)]
#[command(name = "otter-importer", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run auto-import at startup (when enabled) and on the configured interval.
    Run,
    /// Import every recording not imported yet, right now.
    ImportNew {
        /// Target page, today's daily page by default.
        #[arg(long)]
        page: Option<String>,
        /// Print the rendered notes as JSON instead of writing them. They are
        /// recorded as imported once printed.
        #[arg(long)]
        collect: bool,
    },
    /// Import one recording at a position of a page.
    Import {
        speech_id: String,
        #[arg(long)]
        page: String,
        /// Position among the page's top-level blocks, appended when omitted.
        #[arg(long)]
        order: Option<usize>,
    },
    /// Show recordings ten at a time.
    List {
        /// How many windows to show.
        #[arg(long, default_value_t = 1)]
        windows: usize,
    },
    /// Seal the plaintext password kept in the settings.
    SealPassword,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let telemetry_config = TelemetryConfig::from_env("otter-importer");
    telemetry::init_telemetry(telemetry_config)?;

    let cli = Cli::parse();
    let config = ImporterConfig::from_env()?;
    info!("Loaded configuration: {:?}", config);

    let settings = Arc::new(JsonFileSettings::new(&config.settings_path));
    let secrets = Arc::new(JsonFileSettings::new(&config.secrets_path));
    let forwarding = ForwardingClient::new(config.forwarding_url.clone(), config.http_timeout)?;

    if let Command::SealPassword = cli.command {
        seal_plaintext_password(&forwarding, settings, secrets).await?;
        info!("Password sealed and removed from {}", config.settings_path.display());
        return Ok(());
    }

    let credentials = CredentialSource::detect(settings.clone(), secrets)
        .await?
        .credentials()
        .await
        .context("Otter credentials are incomplete")?;
    let source = Arc::new(ForwardingSource::new(forwarding, credentials));
    let writer = Arc::new(MarkdownPageWriter::new(&config.notes_dir));
    let tracker = ImportTracker::new(settings.clone());
    let orchestrator = Arc::new(ImportOrchestrator::new(source.clone(), writer.clone(), tracker));

    match cli.command {
        Command::Run => {
            let scheduler = AutoImportScheduler::new(
                orchestrator,
                settings,
                config.auto_import_interval,
                config.auto_import_page_budget,
            );
            scheduler.run().await;
        }
        Command::ImportNew { page, collect } => {
            let options = load_render_options(settings.as_ref()).await?;
            let target = if collect {
                ImportTarget::Collect
            } else {
                ImportTarget::Append(page.unwrap_or_else(|| daily_page_title(orchestrator.today())))
            };
            let report = orchestrator
                .import_all_new(&options, &target, config.auto_import_page_budget)
                .await?;
            for failure in &report.failures {
                warn!("{}: {}", failure.speech_id, failure.message);
            }
            if collect {
                let rendered = serde_json::to_string_pretty(&report.notes)?;
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{}", rendered)?;
                stdout.flush()?;

                let placed: Vec<(String, String)> =
                    report.notes.iter().map(|collected| collected.placement()).collect();
                orchestrator.record_collected(&placed).await?;
                info!(
                    "Collected {} recordings, {} failed",
                    placed.len(),
                    report.failures.len()
                );
            } else {
                info!(
                    "Imported {} recordings, {} failed",
                    report.imported_count,
                    report.failures.len()
                );
            }
        }
        Command::Import {
            speech_id,
            page,
            order,
        } => {
            let options = load_render_options(settings.as_ref()).await?;
            let order = match order {
                Some(order) => order,
                None => writer.child_count(&page).await?,
            };
            let block_uid = orchestrator
                .import_and_write(&speech_id, &options, &page, order)
                .await?;
            println!("{}", block_uid);
        }
        Command::List { windows } => {
            let mut browser = SpeechBrowser::new(source);
            let imported = orchestrator.tracker().imported_ids().await?;
            browser.open().await?;
            for shown in 0..windows.max(1) {
                if shown > 0 {
                    if !browser.has_next() {
                        break;
                    }
                    browser.next().await?;
                }
                for speech in browser.window() {
                    let marker = if imported.contains_key(&speech.id) { "*" } else { " " };
                    println!("{} {}  {}", marker, speech.id, picker_label(speech));
                }
            }
        }
        Command::SealPassword => {}
    }

    Ok(())
}
