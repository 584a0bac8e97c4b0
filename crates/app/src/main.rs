mod render;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use services::{Clock, CourseStore};
use storage::{HttpBackend, HttpBackendConfig};
use tracing_subscriber::EnvFilter;
use tracker_core::model::{Category, CourseFilter, CourseId, CourseStatus, ProgressInput};

const DEFAULT_LOG_FILTER: &str = "tracker=info,services=info,storage=info,warn";

#[derive(Parser)]
#[command(
    name = "tracker",
    about = "Track your progress through a computer-science curriculum",
    version
)]
struct Cli {
    /// Tracker API base URL (default: $TRACKER_API_URL or http://localhost:8001/api)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Request timeout in seconds (default: $TRACKER_API_TIMEOUT_SECS or 30)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List courses with their progress (default)
    Courses {
        /// Only courses in this category, e.g. `core_math`
        #[arg(short, long)]
        category: Option<Category>,
        /// Only courses with this status: not_started, in_progress or completed
        #[arg(short, long)]
        status: Option<CourseStatus>,
        /// Case-insensitive match on title or description
        #[arg(long)]
        search: Option<String>,
    },

    /// Show one course in detail
    Show { id: CourseId },

    /// Record progress on a course
    Progress {
        id: CourseId,
        #[arg(short, long)]
        status: Option<CourseStatus>,
        /// Completion percentage, 0 to 100
        #[arg(short, long, allow_negative_numbers = true)]
        percent: Option<i32>,
        /// Total hours spent
        #[arg(long, conflicts_with = "add_hours")]
        hours: Option<f64>,
        /// Hours to add to the current total
        #[arg(long, allow_negative_numbers = true)]
        add_hours: Option<f64>,
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Show the progress summary
    Summary {
        /// Also fetch the server's summary and compare
        #[arg(long)]
        remote: bool,
    },

    /// Refresh the catalog from the curriculum source
    Sync,

    /// List known categories
    Categories,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn backend_config(cli: &Cli) -> Result<HttpBackendConfig> {
    let mut config = match &cli.api_url {
        Some(url) => HttpBackendConfig::new(url)?.with_env()?,
        None => HttpBackendConfig::from_env()?,
    };
    if let Some(secs) = cli.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    Ok(config)
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = backend_config(&cli)?;
    tracing::debug!(url = %config.base_url, timeout = ?config.timeout, "using tracker API");
    let backend = HttpBackend::new(config, Clock::default())?;
    let store = CourseStore::new(Arc::new(backend));

    match cli.command.unwrap_or(Commands::Courses {
        category: None,
        status: None,
        search: None,
    }) {
        Commands::Courses {
            category,
            status,
            search,
        } => {
            store.load(category).await?;
            let filter = CourseFilter {
                category,
                status,
                ..CourseFilter::default()
            }
            .with_search(search.unwrap_or_default());
            let courses = store.filter(&filter);
            if courses.is_empty() {
                println!("No courses match.");
            }
            for entry in &courses {
                println!("{}", render::course_line(entry));
            }
        }
        Commands::Show { id } => {
            store.load(None).await?;
            let entry = store
                .course(id)
                .with_context(|| format!("course not found: {id}"))?;
            print!("{}", render::course_detail(&entry));
        }
        Commands::Progress {
            id,
            status,
            percent,
            hours,
            add_hours,
            notes,
        } => {
            store.load(None).await?;
            let current = store
                .course(id)
                .with_context(|| format!("course not found: {id}"))?;

            let mut input = ProgressInput {
                status,
                completion_percentage: percent,
                time_spent_hours: hours,
                notes,
            };
            if let Some(delta) = add_hours {
                input.time_spent_hours = Some(current.time_spent_hours());
                input.adjust_hours(delta);
            }
            if input.is_empty() {
                bail!("nothing to record: pass --status, --percent, --hours, --add-hours or --notes");
            }

            store.record_progress(id, input).await?;
            let updated = store
                .course(id)
                .with_context(|| format!("course not found: {id}"))?;
            println!("{}", render::course_line(&updated));
            println!("{}", render::summary(&store.summary()));
        }
        Commands::Summary { remote } => {
            store.load(None).await?;
            let local = store.summary();
            println!("{}", render::summary(&local));
            if remote {
                let server = store.remote_summary().await?;
                if server == local {
                    println!("Server summary matches.");
                } else {
                    println!("Server: {}", render::summary(&server));
                }
            }
        }
        Commands::Sync => {
            store.load(None).await?;
            let outcome = store.sync().await?;
            println!("{}", render::sync_outcome(&outcome));
            let detached = store.detached_progress();
            if !detached.is_empty() {
                println!(
                    "{} progress record(s) belong to courses no longer in the catalog.",
                    detached.len()
                );
            }
        }
        Commands::Categories => {
            for category in store.categories().await? {
                println!("{:<22} {}", category.as_str(), category.label());
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_url_and_timeout() {
        let cli = Cli::try_parse_from([
            "tracker",
            "--api-url",
            "http://127.0.0.1:9000/api",
            "--timeout",
            "5",
            "sync",
        ])
        .unwrap();
        let config = backend_config(&cli).unwrap();
        assert_eq!(config.base_url.as_str(), "http://127.0.0.1:9000/api/");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn invalid_flag_url_is_rejected() {
        let cli = Cli::try_parse_from(["tracker", "--api-url", "not a url", "--timeout", "5"])
            .unwrap();
        assert!(backend_config(&cli).is_err());
    }

    #[test]
    fn progress_parses_typed_arguments() {
        let cli = Cli::try_parse_from([
            "tracker",
            "progress",
            "6f1c2a3e-9a4b-4d7e-8f10-2b3c4d5e6f70",
            "--status",
            "in_progress",
            "--add-hours",
            "1.5",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Progress {
                status, add_hours, ..
            }) => {
                assert_eq!(status, Some(CourseStatus::InProgress));
                assert_eq!(add_hours, Some(1.5));
            }
            _ => panic!("expected progress command"),
        }
    }
}
