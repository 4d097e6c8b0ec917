//! tube-queue - Inspect the upload schedule
//!
//! Unix-style tool for viewing scheduled videos and their outcomes.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use libtubecast::logging::init_default;
use libtubecast::{
    Config, Database, PostStatus, PostSummary, Result, TokenFileProvider, TubecastError,
};

#[derive(Parser, Debug)]
#[command(name = "tube-queue")]
#[command(version)]
#[command(about = "Inspect the upload schedule")]
#[command(long_about = "\
tube-queue - Inspect the upload schedule

DESCRIPTION:
    tube-queue lists scheduled videos with their status, shows the full
    record of one post, and summarizes the queue by status. Posts in
    'error' keep their file and carry the failure cause; re-submit them
    with tube-post once the cause is fixed.

COMMANDS:
    list        List all posts, earliest scheduled first
    show        Show one post in full
    stats       Count posts per status
    auth        Check whether the YouTube token can authorize uploads

USAGE EXAMPLES:
    # List all posts
    tube-queue list

    # List posts in JSON format
    tube-queue list --format json

    # Show why post 7 failed
    tube-queue show 7

CONFIGURATION:
    Configuration file: ~/.config/tubecast/config.toml
    Database location: ~/.local/share/tubecast/schedule.db

    Override with environment variables:
        TUBECAST_CONFIG    - Path to config file
        TUBECAST_DB_PATH   - Path to database file

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Database or configuration error
    3 - Invalid input (bad post ID, unknown format)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List all posts
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Only show posts with this status
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show one post in full
    Show {
        /// Post ID
        post_id: i64,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show queue statistics
    Stats {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check the YouTube token file
    Auth {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() {
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
    // Load configuration
    let config = Config::load()?;

    // The token check needs no database
    if let Commands::Auth { format } = &cli.command {
        return cmd_auth(&config, format).await;
    }

    // Initialize database
    let db = Database::new(&config.database_path()).await?;

    // Execute command
    let result = match cli.command {
        Commands::List { format, status } => cmd_list(&db, &format, status.as_deref()).await,
        Commands::Show { post_id, format } => cmd_show(&db, post_id, &format).await,
        Commands::Stats { format } => cmd_stats(&db, &format).await,
        Commands::Auth { format } => cmd_auth(&config, &format).await,
    };

    db.close().await;
    result
}

fn validate_format(format: &str) -> Result<()> {
    if format != "text" && format != "json" {
        return Err(TubecastError::Validation(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            format
        )));
    }
    Ok(())
}

/// List posts
async fn cmd_list(db: &Database, format: &str, status: Option<&str>) -> Result<()> {
    validate_format(format)?;

    let status = status
        .map(|s| s.parse::<PostStatus>().map_err(TubecastError::Validation))
        .transpose()?;

    let mut posts = db.list_posts().await?;
    if let Some(status) = status {
        posts.retain(|p| p.status == status);
    }

    if format == "json" {
        output_list_json(&posts)?;
    } else {
        output_list_text(&posts);
    }

    Ok(())
}

/// Output posts as JSON
fn output_list_json(posts: &[PostSummary]) -> Result<()> {
    let json = serde_json::json!({ "posts": posts });
    let text = serde_json::to_string_pretty(&json)
        .map_err(|e| TubecastError::Validation(format!("Could not encode listing: {}", e)))?;
    println!("{}", text);
    Ok(())
}

/// Output posts as human-readable text
fn output_list_text(posts: &[PostSummary]) {
    if posts.is_empty() {
        return;
    }

    let now = Utc::now();

    for post in posts {
        let detail = if post.status.is_terminal() {
            post.posted_id
                .clone()
                .or_else(|| post.error_message.clone())
                .unwrap_or_default()
        } else {
            format_time_until(now, post.scheduled_time)
        };

        println!(
            "{} | {} | {} | {} | {}",
            post.id,
            post.status,
            post.scheduled_time.to_rfc3339(),
            truncate(&post.title, 50),
            truncate(&detail, 80)
        );
    }
}

/// Show one post in full
async fn cmd_show(db: &Database, post_id: i64, format: &str) -> Result<()> {
    validate_format(format)?;

    let post = db
        .get_post(post_id)
        .await?
        .ok_or(TubecastError::NotFound(post_id))?;

    if format == "json" {
        let text = serde_json::to_string_pretty(&post)
            .map_err(|e| TubecastError::Validation(format!("Could not encode post: {}", e)))?;
        println!("{}", text);
        return Ok(());
    }

    println!("id:             {}", post.id);
    println!("platform:       {}", post.platform);
    println!("status:         {}", post.status);
    println!("title:          {}", post.title);
    if let Some(description) = &post.description {
        println!("description:    {}", description);
    }
    if !post.tags.is_empty() {
        println!("tags:           {}", post.tags.join(", "));
    }
    println!("privacy:        {}", post.privacy_status);
    println!("category:       {}", post.category_id);
    println!("scheduled_time: {}", post.scheduled_at.to_rfc3339());
    println!("video_path:     {}", post.video_path);
    if let Some(posted_id) = &post.posted_id {
        println!("posted_id:      {}", posted_id);
        println!("url:            https://www.youtube.com/watch?v={}", posted_id);
    }
    if let Some(error) = &post.error_message {
        println!("error_message:  {}", error);
    }

    Ok(())
}

/// Show queue statistics
async fn cmd_stats(db: &Database, format: &str) -> Result<()> {
    validate_format(format)?;

    let counts = db.status_counts().await?;
    let total: i64 = counts.values().sum();

    if format == "json" {
        let mut json = serde_json::Map::new();
        for status in PostStatus::ALL {
            json.insert(
                status.as_str().to_string(),
                serde_json::json!(counts.get(&status).copied().unwrap_or(0)),
            );
        }
        json.insert("total".to_string(), serde_json::json!(total));
        println!("{}", serde_json::Value::Object(json));
    } else {
        for status in PostStatus::ALL {
            println!("{:<11} {}", status.as_str(), counts.get(&status).copied().unwrap_or(0));
        }
        println!("{:<11} {}", "total", total);
    }

    Ok(())
}

/// Report whether the token file can authorize uploads
async fn cmd_auth(config: &Config, format: &str) -> Result<()> {
    validate_format(format)?;

    let status = TokenFileProvider::new(config.token_file()).status().await;

    if format == "json" {
        let text = serde_json::to_string_pretty(&status)
            .map_err(|e| TubecastError::Validation(format!("Could not encode status: {}", e)))?;
        println!("{}", text);
        return Ok(());
    }

    println!("authenticated: {}", status.authenticated);
    println!("token_file:    {}", status.token_file);
    if let Some(expires_at) = status.expires_at {
        println!("expires_at:    {}", expires_at.to_rfc3339());
    }
    println!("refreshable:   {}", status.refreshable);
    if let Some(problem) = &status.problem {
        println!("problem:       {}", problem);
    }

    Ok(())
}

/// Truncate to max characters with ellipsis
fn truncate(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let cut: String = content.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

/// Format time until scheduled time in human-readable format
fn format_time_until(now: DateTime<Utc>, scheduled_at: DateTime<Utc>) -> String {
    let diff = (scheduled_at - now).num_seconds();

    if diff < 0 {
        return "overdue".to_string();
    }

    let minutes = diff / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("in {} day{}", days, if days == 1 { "" } else { "s" })
    } else if hours > 0 {
        format!("in {} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else if minutes > 0 {
        format!("in {} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else {
        "in <1 minute".to_string()
    }
}
