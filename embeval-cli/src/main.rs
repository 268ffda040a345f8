mod app;

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use embeval_core::Scores;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "embeval")]
#[command(about = "Score text-embedding models on classification tasks", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "embeval.yaml")]
    config: PathBuf,

    /// Path to split file (YAML or JSON with labeled train and test sentences)
    #[arg(short, long)]
    data: PathBuf,

    /// Override the encoder model from the config
    #[arg(short, long)]
    model: Option<String>,

    /// Keep only the first N train and test sentences
    #[arg(short, long)]
    limit: Option<usize>,

    /// Output format for results
    #[arg(long, default_value = "json")]
    output: OutputFormat,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Json,
    Csv,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let mut config = embeval_core::Config::from_file(&cli.config)?;
    if let Some(model) = cli.model {
        config.encoder.model = model;
    }
    if cli.limit.is_some() {
        config.task.limit = cli.limit;
    }

    // Validate split file exists
    if !cli.data.exists() {
        return Err(anyhow!("Split file not found: {}", cli.data.display()));
    }

    let mut app = app::App::new(config);
    eprintln!("Loading splits and encoder...");
    app.load(&cli.data)?;
    if let Some(status) = &app.status_message {
        info!("{}", status);
    }

    eprintln!("Evaluating {}...", app.task_name());
    let results = app.run().await?;
    if let Some(status) = &app.status_message {
        info!("{}", status);
    }

    print_results(app.task_name(), &results, cli.output)
}

fn print_results(task: &str, results: &[Scores], output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => {
            for scores in results {
                let mut line = serde_json::to_value(scores)?;
                line["task"] = serde_json::Value::String(task.to_string());
                println!("{}", serde_json::to_string(&line)?);
            }
        }
        OutputFormat::Csv => {
            println!("timestamp,task,evaluator,accuracy,f1,ap");
            for scores in results {
                println!(
                    "{},{},{},{:.4},{:.4},{}",
                    scores.timestamp,
                    task,
                    scores.evaluator,
                    scores.accuracy().unwrap_or_default(),
                    scores.f1().unwrap_or_default(),
                    scores.ap().map(|ap| format!("{ap:.4}")).unwrap_or_default(),
                );
            }
        }
    }
    Ok(())
}
