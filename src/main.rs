use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, Level};

use cloudfm::{
    render, CloudFmError, Config, FailurePolicy, FileBrowser, Result, Shell, StorageBackend,
    UploadSource,
};

/// Config file read when `--config` is not given.
const DEFAULT_CONFIG: &str = "cloudfm.toml";

#[derive(Parser)]
#[command(name = "cloudfm", version, about = "Cloud File Manager client")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// File server base URL (overrides config and CLOUDFM_SERVER_URL).
    #[arg(long)]
    server: Option<String>,
    /// Storage backend: local or memory.
    #[arg(long)]
    storage: Option<StorageBackend>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the file table.
    List,
    /// Print files whose name contains the query (case-insensitive).
    Search {
        /// Text to look for.
        query: String,
    },
    /// Upload files one after another.
    Upload {
        /// Local files, uploaded in the order given.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Keep going after a failed file instead of stopping the batch.
        #[arg(long)]
        continue_on_error: bool,
    },
    /// Download a file.
    Download {
        /// Name of the file on the server.
        name: String,
        /// Directory to save into (defaults to download.directory).
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Delete a file.
    Delete {
        /// Name of the file on the server.
        name: String,
        /// Do not ask for confirmation.
        #[arg(long, short)]
        yes: bool,
    },
    /// Interactive browser (default).
    Shell,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => match Config::load(DEFAULT_CONFIG) {
            Ok(config) => config,
            Err(e @ CloudFmError::Io(_)) => {
                eprintln!("Failed to load {DEFAULT_CONFIG}: {e}");
                eprintln!("Using default configuration.");
                Config::default()
            }
            Err(e) => return Err(e),
        },
    };
    config.apply_env_overrides()?;

    if let Some(server) = &cli.server {
        config.server.base_url = server.clone();
    }
    if let Some(storage) = cli.storage {
        config.server.storage = storage;
    }
    if let Some(Command::Upload {
        continue_on_error: true,
        ..
    }) = &cli.command
    {
        config.upload.on_failure = FailurePolicy::Continue;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    if let Err(e) = cloudfm::logging::init(&config.logging, Level::WARN) {
        eprintln!("Failed to initialize logging: {e}");
        cloudfm::logging::init_console_only(&config.logging.level);
    }

    info!("cloudfm - Cloud File Manager");
    info!(
        "Using {} ({} storage)",
        config.server.base_url, config.server.storage
    );

    match run(cli.command.unwrap_or(Command::Shell), &config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run one command. `Ok(false)` means the operation failed but was reported.
async fn run(command: Command, config: &Config) -> Result<bool> {
    let mut browser = FileBrowser::from_config(config)?;

    match command {
        Command::List => {
            let ok = browser.refresh().await.is_ok();
            println!("{}", render(&browser.view(), &config.display));
            Ok(ok)
        }
        Command::Search { query } => {
            let ok = browser.refresh().await.is_ok();
            browser.search(query);
            println!("{}", render(&browser.view(), &config.display));
            Ok(ok)
        }
        Command::Upload { paths, .. } => {
            let sources = paths.into_iter().map(UploadSource::from_path).collect();
            let summary = browser.upload(sources).await?;
            for name in &summary.uploaded {
                println!("uploaded {}", name);
            }
            for (name, reason) in &summary.failed {
                println!("failed   {}: {}", name, reason);
            }
            for name in &summary.skipped {
                println!("skipped  {}", name);
            }
            Ok(summary.all_succeeded())
        }
        Command::Download { name, output } => {
            let dir = output.unwrap_or_else(|| PathBuf::from(&config.download.directory));
            let path = browser.download(&name, &dir).await?;
            println!("saved to {}", path.display());
            Ok(true)
        }
        Command::Delete { name, yes } => {
            if !yes && !confirm(&format!("Delete {}? [y/N] ", name)).await? {
                println!("cancelled");
                return Ok(true);
            }
            browser.delete(&name).await?;
            println!("deleted {}", name);
            Ok(true)
        }
        Command::Shell => {
            let input = BufReader::new(tokio::io::stdin());
            Shell::new(&mut browser, config, input, tokio::io::stdout())
                .run()
                .await?;
            Ok(true)
        }
    }
}

async fn confirm(question: &str) -> Result<bool> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(question.as_bytes()).await?;
    stdout.flush().await?;

    let mut answer = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut answer)
        .await?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
