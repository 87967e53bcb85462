mod report;

use albumdiff_common::{
    ensure_config, load_config, Album, AlbumSource, AppConfig, LoadedConfig, Snapshot,
};
use albumdiff_core::{
    CredentialManager, GooglePhotosAuth, GooglePhotosClient, LibraryComparator, OneDriveScanner,
};
use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "albumdiff")]
#[command(author = "AlbumDiff Contributors")]
#[command(version)]
#[command(about = "Compare photo albums between OneDrive and Google Photos", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare the OneDrive photos folder with Google Photos albums
    Compare(CompareArgs),

    /// Show where credentials are stored and which ones exist
    Auth {
        /// Credential store directory
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Print the config file location, creating it with defaults if missing
    Config,
}

#[derive(Args)]
struct CompareArgs {
    /// Path to the OneDrive photos folder
    #[arg(long)]
    onedrive_path: Option<PathBuf>,

    /// Path to Google client_secret.json (downloaded from Cloud Console)
    #[arg(long)]
    google_credentials: Option<PathBuf>,

    /// Read Google albums from a JSON snapshot instead of the API
    #[arg(long, conflicts_with = "google_credentials")]
    google_snapshot: Option<PathBuf>,

    /// Write the fetched Google albums to a JSON snapshot
    #[arg(long)]
    save_google_snapshot: Option<PathBuf>,

    /// Write the comparison report (JSON) to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the comparison report as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Album name similarity threshold for matching (0-1)
    #[arg(short, long)]
    similarity: Option<f64>,

    /// Credential store directory
    #[arg(long)]
    credentials_dir: Option<PathBuf>,

    /// Disable ANSI colors in output
    #[arg(long)]
    no_color: bool,
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output on stdout stays clean
    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let result = match cli.command {
        Commands::Compare(args) => run_compare(args),
        Commands::Auth { path } => run_auth(path),
        Commands::Config => run_config(),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run_compare(args: CompareArgs) -> Result<()> {
    let loaded = load_config(false)?;
    let config = &loaded.config;

    let threshold = AppConfig::check_similarity_threshold(
        args.similarity.unwrap_or(config.similarity_threshold),
    )?;

    let onedrive_path = args
        .onedrive_path
        .clone()
        .or_else(|| config.onedrive_path.clone())
        .ok_or_else(|| {
            anyhow!("No OneDrive folder given; pass --onedrive-path or set onedrive_path in the config file")
        })?;

    info!("Scanning OneDrive at {}", onedrive_path.display());
    let scanner = OneDriveScanner::new(&onedrive_path, config)?;
    let onedrive = scanner.scan()?;
    info!(
        "Found {} OneDrive albums with {} items",
        onedrive.len(),
        onedrive.total_items()
    );

    let google = match &args.google_snapshot {
        Some(path) => load_snapshot(path)?,
        None => fetch_google_albums(&args, &loaded)?,
    };
    info!(
        "Found {} Google Photos albums with {} items",
        google.len(),
        google.total_items()
    );

    if let Some(path) = &args.save_google_snapshot {
        save_snapshot(path, &google)?;
        info!("Saved Google Photos snapshot to {}", path.display());
    }

    let comparator = LibraryComparator::new(threshold);
    let comparison = comparator.compare(Arc::new(onedrive), Arc::new(google));
    let report = report::build_json_report(&comparison);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let use_color = !args.no_color && io::stdout().is_terminal();
        report::render_console(&mut io::stdout().lock(), &comparison, use_color)?;
    }

    if let Some(path) = &args.output {
        let data = serde_json::to_string_pretty(&report)?;
        fs::write(path, data)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Report saved to {}", path.display());
    }

    Ok(())
}

fn credential_manager(explicit: Option<PathBuf>, loaded: &LoadedConfig) -> Result<CredentialManager> {
    let dir = match explicit {
        Some(dir) => dir,
        None => loaded.credentials_dir()?,
    };
    Ok(CredentialManager::new(dir)?)
}

fn fetch_google_albums(args: &CompareArgs, loaded: &LoadedConfig) -> Result<Snapshot> {
    let credentials = credential_manager(args.credentials_dir.clone(), loaded)?;
    let client_secret = args
        .google_credentials
        .clone()
        .or_else(|| loaded.config.google_client_secret.clone());

    info!("Authenticating with Google Photos");
    let token = GooglePhotosAuth::new(client_secret, credentials)?.authenticate()?;

    let spinner = spinner("Fetching Google Photos albums...");
    let result = GooglePhotosClient::new(token.access_token).and_then(|client| client.scan());
    spinner.finish_and_clear();

    Ok(result?)
}

fn spinner(message: &'static str) -> ProgressBar {
    if !io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Snapshots on disk are a JSON array of albums
fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let albums: Vec<Album> = serde_json::from_str(&data)
        .with_context(|| format!("Invalid snapshot {}", path.display()))?;
    Ok(Snapshot::from_albums(AlbumSource::GooglePhotos, albums))
}

fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let albums: Vec<&Album> = snapshot.albums().collect();
    let data = serde_json::to_string_pretty(&albums)?;
    fs::write(path, data)
        .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
    Ok(())
}

fn run_auth(path: Option<PathBuf>) -> Result<()> {
    let loaded = load_config(false)?;
    let credentials = credential_manager(path, &loaded)?;

    println!("Credential Status");
    println!("{}", "=".repeat(50));
    println!("Credentials stored at: {}", credentials.base_path().display());
    println!();

    match credentials.load_google_token()? {
        Some(token) => {
            println!("[ok] Google Photos credentials found");
            match token.expiry {
                Some(expiry) if token.is_expired() => println!("     Expired: {}", expiry.to_rfc3339()),
                Some(expiry) => println!("     Expires: {}", expiry.to_rfc3339()),
                None => println!("     Expires: never"),
            }
        }
        None => println!("[--] Google Photos credentials not found"),
    }

    match credentials.load_onedrive_credentials()? {
        Some(_) => println!("[ok] OneDrive credentials found"),
        None => println!("[--] OneDrive credentials not found"),
    }

    Ok(())
}

fn run_config() -> Result<()> {
    let loaded = ensure_config(false)?;
    if loaded.exists {
        println!("Config file: {}", loaded.path().display());
    } else {
        println!("Config file: {} (created with defaults)", loaded.path().display());
    }
    if loaded.is_portable() {
        println!("Portable mode: enabled");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cli_parses_compare() {
        let cli = Cli::try_parse_from([
            "albumdiff",
            "compare",
            "--onedrive-path",
            "/photos",
            "--google-snapshot",
            "google.json",
            "--similarity",
            "0.6",
            "--json",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Compare(args) => {
                assert_eq!(args.onedrive_path, Some(PathBuf::from("/photos")));
                assert_eq!(args.google_snapshot, Some(PathBuf::from("google.json")));
                assert_eq!(args.similarity, Some(0.6));
                assert!(args.json);
            }
            _ => panic!("expected compare command"),
        }
    }

    #[test]
    fn test_snapshot_and_credentials_are_exclusive() {
        let result = Cli::try_parse_from([
            "albumdiff",
            "compare",
            "--google-credentials",
            "secret.json",
            "--google-snapshot",
            "google.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_snapshot_file_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("google.json");
        let snapshot = Snapshot::from_albums(
            AlbumSource::GooglePhotos,
            vec![
                Album::new("google-1", "Pets", AlbumSource::GooglePhotos, 4),
                Album::new("google-2", "Birthday", AlbumSource::GooglePhotos, 9),
            ],
        );

        save_snapshot(&path, &snapshot).unwrap();
        assert_eq!(load_snapshot(&path).unwrap(), snapshot);
    }

    #[test]
    fn test_load_snapshot_rejects_garbage() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("google.json");
        fs::write(&path, "{not json").unwrap();

        assert!(load_snapshot(&path).is_err());
    }
}
