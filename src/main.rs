//! CLI entry point for blogsmith

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blogsmith::{commands, server, Site};

#[derive(Parser)]
#[command(name = "blogsmith")]
#[command(version)]
#[command(about = "A static site generator for Markdown blogs", long_about = None)]
struct Cli {
    /// Site source directory (defaults to current directory)
    #[arg(short, long, global = true)]
    source: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new site
    Init {
        /// Directory to initialize (defaults to the source directory)
        folder: Option<PathBuf>,
    },

    /// Create a new post, draft or page
    New {
        /// What to create (post, draft, page)
        #[arg(short = 't', long = "type", default_value = "post")]
        kind: String,

        /// Title of the new item
        title: String,

        /// Layout to declare (defaults to `post` or `page`)
        #[arg(short, long)]
        layout: Option<String>,

        /// File name slug (defaults to the slugified title)
        #[arg(long)]
        slug: Option<String>,
    },

    /// Build the site into the destination directory
    #[command(alias = "b")]
    Build {
        /// Include drafts
        #[arg(long)]
        drafts: bool,

        /// Rebuild on file changes
        #[arg(short, long)]
        watch: bool,
    },

    /// Render the site and run all checks without writing output
    Check {
        /// Include drafts
        #[arg(long)]
        drafts: bool,
    },

    /// Build and serve the site locally
    #[command(alias = "s")]
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "localhost")]
        host: String,

        /// Open browser automatically
        #[arg(short, long)]
        open: bool,

        /// Disable watching and live reload
        #[arg(long)]
        no_watch: bool,

        /// Include drafts
        #[arg(long)]
        drafts: bool,
    },

    /// Remove the destination directory
    Clean,

    /// List site content
    List {
        /// Type of content to list (post, page, tag, hidden, layout)
        #[arg(default_value = "post")]
        r#type: String,

        /// Include drafts
        #[arg(long)]
        drafts: bool,
    },

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        "blogsmith=debug,info"
    } else {
        "blogsmith=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(cli).await {
        // build and check failures are already logged error by error
        if e.downcast_ref::<blogsmith::BuildFailed>().is_none() {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let source_dir = match cli.source {
        Some(dir) => dir,
        None => std::env::current_dir().context("cannot determine current directory")?,
    };

    match cli.command {
        Commands::Init { folder } => {
            let target_dir = match folder {
                Some(folder) if folder.is_absolute() => folder,
                Some(folder) => source_dir.join(folder),
                None => source_dir,
            };
            tracing::info!("Initializing site in {:?}", target_dir);
            commands::init::init_site(&target_dir)?;
            println!("Initialized new site in {:?}", target_dir);
        }

        Commands::New {
            kind,
            title,
            layout,
            slug,
        } => {
            let site = Site::new(&source_dir)?;
            commands::new::run(&site, &kind, &title, layout.as_deref(), slug.as_deref())?;
        }

        Commands::Build { drafts, watch } => {
            let site = Site::new(&source_dir)?;
            tracing::info!("Building {:?}", site.source_dir);

            let result = commands::build::run(&site, drafts);
            if watch {
                let site = site.clone();
                tokio::task::spawn_blocking(move || commands::build::watch(&site, drafts))
                    .await??;
            } else {
                result?;
                println!("Built successfully!");
            }
        }

        Commands::Check { drafts } => {
            let site = Site::new(&source_dir)?;
            commands::check::run(&site, drafts)?;
        }

        Commands::Serve {
            port,
            host,
            open,
            no_watch,
            drafts,
        } => {
            let site = Site::new(&source_dir)?;
            commands::build::run(&site, drafts)?;

            tracing::info!("Starting server at http://{}:{}", host, port);
            server::start(&site, &host, port, !no_watch, open, drafts).await?;
        }

        Commands::Clean => {
            let site = Site::new(&source_dir)?;
            commands::clean::run(&site)?;
            println!("Cleaned successfully!");
        }

        Commands::List { r#type, drafts } => {
            let site = Site::new(&source_dir)?;
            commands::list::run(&site, &r#type, drafts)?;
        }

        Commands::Version => {
            println!("blogsmith version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
