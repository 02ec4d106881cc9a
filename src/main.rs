//! CLI entry point for docsite

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docsite::DocSite;

#[derive(Parser)]
#[command(name = "docsite")]
#[command(version)]
#[command(about = "Compose a documentation site from a tree of markdown files", long_about = None)]
struct Cli {
    /// Instance settings file; site directories are relative to it
    #[arg(short, long, global = true, default_value = "config.yml")]
    config: PathBuf,

    /// Defaults settings file (defaults to `defaults.yml` next to the config)
    #[arg(long, global = true)]
    defaults: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the site into the public directory
    #[command(alias = "b")]
    Build,

    /// Build the site and serve it
    #[command(alias = "s")]
    Run {
        /// Rebuild when content, layouts or settings change
        #[arg(short, long)]
        watch: bool,

        /// Port to listen on (defaults to `site/port`)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the content tree
    List,

    /// Delete the public directory
    Clean,
}

/// How long blocking reads may hold up exit
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn main() -> Result<()> {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(cli));
    // A read abandoned on timeout may still sit in a blocking thread
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn run(cli: Cli) -> Result<()> {
    // Initialize logging
    let filter = if cli.debug {
        "docsite=debug,info"
    } else {
        "docsite=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app = DocSite::new(&cli.config, cli.defaults.as_deref())?;

    match cli.command {
        Commands::Build => {
            tracing::info!("Building site from {:?}", app.content_dir);
            let report = app.generate().await?;
            if report.is_clean() {
                println!("Built {} page(s) successfully!", report.pages);
            } else {
                println!(
                    "Built {} page(s) with {} issue(s)",
                    report.pages,
                    report.issues.len()
                );
            }
        }

        Commands::Run { watch, port } => {
            docsite::server::start(&app, port, watch).await?;
        }

        Commands::List => {
            docsite::commands::list::run(&app).await?;
        }

        Commands::Clean => {
            tracing::info!("Cleaning public folder...");
            app.clean()?;
            println!("Cleaned successfully!");
        }
    }

    Ok(())
}
