//! tube-post - Schedule a video for upload

use clap::Parser;
use libtubecast::logging::init_default;
use libtubecast::{Config, Database, Result, SubmissionHandler, SubmissionRequest, TubecastError};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tube-post")]
#[command(version)]
#[command(about = "Schedule a video for upload")]
#[command(long_about = "\
tube-post - Schedule a video for upload

DESCRIPTION:
    Copies the video into the upload directory and adds it to the schedule
    as a pending post. tube-send uploads it once the scheduled time passes.
    On success the new post id is printed to stdout.

USAGE EXAMPLES:
    # Upload at a fixed time (UTC)
    tube-post talk.mp4 --title \"My talk\" --at 2026-03-01T15:00:00Z

    # Upload in two hours, unlisted, with tags
    tube-post talk.mp4 --at 2h --privacy unlisted --tags \"rust, async\"

EXIT CODES:
    0 - Scheduled
    1 - Storage failure
    2 - Configuration error
    3 - Invalid input (missing file, bad time, bad privacy or category)
")]
struct Cli {
    /// Video file to schedule
    video: Option<PathBuf>,

    /// Video title (default: "Untitled video")
    #[arg(short, long)]
    title: Option<String>,

    /// Video description
    #[arg(short, long)]
    description: Option<String>,

    /// Privacy: private, unlisted or public
    #[arg(short, long)]
    privacy: Option<String>,

    /// Numeric category id
    #[arg(short, long)]
    category: Option<String>,

    /// Comma-separated tags
    #[arg(long)]
    tags: Option<String>,

    /// When to upload: ISO-8601 time or a duration such as 30m
    #[arg(long = "at", value_name = "TIME")]
    scheduled_time: Option<String>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    // TUBECAST_* overrides may live in .env; a missing file is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_default("error", cli.verbose);

    // Run the main logic and handle errors
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
    let db = Database::new(&config.database_path()).await?;

    let handler = SubmissionHandler::new(
        db.clone(),
        config.upload_dir(),
        (&config.youtube).into(),
    );

    let result = handler
        .submit(SubmissionRequest {
            video_path: cli.video,
            title: cli.title,
            description: cli.description,
            privacy: cli.privacy,
            category: cli.category,
            tags: cli.tags,
            scheduled_time: cli.scheduled_time,
        })
        .await;

    let id = match result {
        Ok(id) => id,
        Err(e) => {
            db.close().await;
            return Err(e);
        }
    };

    let post = db.get_post(id).await?.ok_or(TubecastError::NotFound(id))?;
    db.close().await;

    if cli.format == "json" {
        let json = serde_json::json!({
            "id": post.id,
            "title": post.title,
            "scheduled_time": post.scheduled_at.to_rfc3339(),
            "status": post.status,
        });
        println!("{}", json);
    } else {
        println!("{}", post.id);
    }

    Ok(())
}
