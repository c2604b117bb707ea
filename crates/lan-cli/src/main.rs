use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod app;
mod commands;

#[derive(Parser)]
#[command(name = "lan")]
#[command(about = "Lan - a reading companion you can talk to")]
#[command(version)]
struct Cli {
    /// Ask a single question and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Reading mode to start in
    #[arg(long)]
    mode: Option<String>,

    /// Model identifier
    #[arg(short, long)]
    model: Option<String>,

    /// Creativity (0.0-1.5)
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Folder for Markdown transcripts
    #[arg(long)]
    folder: Option<PathBuf>,

    /// Append every turn to the transcript
    #[arg(long)]
    auto_save: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut settings = lan_core::Settings::load();

    if let Some(model) = cli.model {
        settings.llm.model = model;
    }
    if let Some(temperature) = cli.temperature {
        if !temperature.is_finite() {
            anyhow::bail!("--temperature must be a number between 0.0 and 1.5");
        }
        settings.llm.temperature = temperature;
    }
    if let Some(folder) = cli.folder {
        settings.transcript.folder = folder;
    }
    if let Some(mode) = cli.mode {
        settings.session.default_mode = mode;
    }
    if cli.auto_save {
        settings.session.auto_save = true;
    }

    // A missing API key is fatal: no session without a model.
    let llm = settings.build_llm_client()?;
    let mut manager = settings.build_manager(llm)?;

    if let Some(prompt) = cli.prompt {
        app::run_single_prompt(&mut manager, &prompt).await?;
    } else {
        app::run_repl(manager).await?;
    }

    Ok(())
}
