//! tube-meta - Suggest video metadata from a summary

use clap::Parser;
use libtubecast::logging::init_default;
use libtubecast::metadata::{GeneratedMetadata, MetadataGenerator};
use libtubecast::error::MetadataError;
use libtubecast::{Config, Result, TubecastError};
use std::io::{self, IsTerminal, Read};

#[derive(Parser, Debug)]
#[command(name = "tube-meta")]
#[command(version)]
#[command(about = "Suggest video titles, descriptions and tags")]
#[command(long_about = "\
tube-meta - Suggest video titles, descriptions and tags

DESCRIPTION:
    Sends a short summary of a video to Gemini and prints a suggested
    title, description and comma-separated tag string. The output can be
    passed to tube-post with --title, --description and --tags.

USAGE EXAMPLES:
    # Summary as an argument
    tube-meta \"A walkthrough of async Rust for beginners\"

    # Summary from stdin, JSON output
    cat notes.txt | tube-meta --format json

CONFIGURATION:
    GEMINI_API_KEY must be set (environment or .env file).

    [gemini]
    model = \"gemini-2.5-flash\"

EXIT CODES:
    0 - Success
    1 - Model request failed
    2 - Missing API key or configuration error
    3 - Invalid input (empty summary)
")]
struct Cli {
    /// Video summary (reads from stdin if not provided)
    summary: Option<String>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_default("error", cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    if cli.format != "text" && cli.format != "json" {
        return Err(TubecastError::Validation(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            cli.format
        )));
    }

    let config = Config::load()?;
    let generator = MetadataGenerator::from_env(&config.gemini);

    // Fail before blocking on stdin
    if !generator.is_configured() {
        return Err(MetadataError::MissingApiKey.into());
    }

    let summary = match cli.summary {
        Some(summary) => summary,
        None => read_summary_from_stdin()?,
    };

    let metadata = generator.generate(&summary).await?;

    if cli.format == "json" {
        let text = serde_json::to_string_pretty(&metadata)
            .map_err(|e| TubecastError::Validation(format!("Could not encode metadata: {}", e)))?;
        println!("{}", text);
    } else {
        print_text(&metadata);
    }

    Ok(())
}

fn read_summary_from_stdin() -> Result<String> {
    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        return Err(TubecastError::Validation(
            "A summary is required (argument or stdin)".to_string(),
        ));
    }

    let mut buffer = String::new();
    stdin
        .read_to_string(&mut buffer)
        .map_err(|e| TubecastError::Validation(format!("Could not read stdin: {}", e)))?;
    Ok(buffer)
}

fn print_text(metadata: &GeneratedMetadata) {
    println!("Title: {}", metadata.title);
    println!("Tags: {}", metadata.tags);
    println!();
    println!("{}", metadata.description);
}
