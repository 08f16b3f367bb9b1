//! Storekit CLI - Command line interface for configured stores
//!
//! Usage:
//!   storekit --root ./data ls /              # List a local directory store
//!   storekit --config stores.json cat a.txt  # Read from a configured store
//!   echo hi | storekit put notes/hi.txt      # Write stdin to a file
//!   storekit cp reports/ archive/2024/       # Trailing slash: directory copy
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use storekit::{
    DEFAULT_STORE, DirectoryRequest, DirectoryTransferRequest, DiskAdapter, FileRequest,
    PublicUrlRequest, Storage, StorageConfig, StoragePath, TransferRequest, WriteFileRequest,
};
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

/// Storekit - One file API over object stores, disk and memory
#[derive(Parser, Debug)]
#[command(name = "storekit")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON store configuration
    #[arg(long, conflicts_with = "root")]
    config: Option<PathBuf>,

    /// Serve a local directory as the default store (default: current directory)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Store to operate on
    #[arg(long, default_value = DEFAULT_STORE)]
    store: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory and everything beneath it
    Ls {
        #[arg(default_value = "/")]
        path: String,
        /// Stop after this many entries
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print a file to stdout
    Cat { path: String },
    /// Print file metadata as JSON
    Stat { path: String },
    /// Write stdin (or --file) to a file
    Put {
        path: String,
        /// Read content from a local file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        content_type: Option<String>,
        #[arg(long)]
        overwrite: bool,
    },
    /// Create an empty file
    Touch { path: String },
    /// Delete a file
    Rm { path: String },
    /// Create a directory
    Mkdir { path: String },
    /// Delete a directory and its contents
    Rmdir { path: String },
    /// Copy a file, or a directory when both paths end with '/'
    Cp {
        source: String,
        destination: String,
        #[arg(long)]
        overwrite: bool,
    },
    /// Move a file, or a directory when both paths end with '/'
    Mv {
        source: String,
        destination: String,
        #[arg(long)]
        overwrite: bool,
    },
    /// Print a time-limited URL for a file
    Url {
        path: String,
        /// Lifetime in seconds
        #[arg(long, default_value_t = 86_400)]
        expires_in: i64,
    },
}

fn expiry_after(seconds: i64) -> Result<DateTime<Utc>> {
    Duration::try_seconds(seconds)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .with_context(|| format!("--expires-in {seconds} is out of range"))
}

fn parse_path(raw: &str) -> Result<StoragePath> {
    StoragePath::parse(raw).with_context(|| format!("Invalid path: {raw}"))
}

async fn open_storage(args: &Args) -> Result<Storage> {
    if let Some(config) = &args.config {
        let config = StorageConfig::from_path(config)
            .await
            .context("Failed to load configuration")?;
        return Storage::from_config(&config)
            .await
            .context("Failed to configure stores");
    }
    let root = args.root.clone().unwrap_or_else(|| PathBuf::from("."));
    Storage::builder()
        .register(DEFAULT_STORE, Arc::new(DiskAdapter::new(root)))
        .build()
        .context("Failed to configure stores")
}

async fn run(storage: &Storage, store: &str, command: Command) -> Result<()> {
    let files = storage.files();
    let directories = storage.directories();
    let mut stdout = tokio::io::stdout();

    match command {
        Command::Ls { path, limit } => {
            let request = DirectoryRequest::new(parse_path(&path)?.as_directory()).store(store);
            let mut entries = Vec::new();
            directories
                .iterate_contents(request, |entry| {
                    entries.push(entry);
                    match limit {
                        Some(limit) if entries.len() >= limit => ControlFlow::Break(()),
                        _ => ControlFlow::Continue(()),
                    }
                })
                .await
                .with_context(|| format!("Failed to list {path}"))?;
            for entry in entries {
                stdout.write_all(format!("{entry}\n").as_bytes()).await?;
            }
        }
        Command::Cat { path } => {
            let file = files
                .read(FileRequest::new(parse_path(&path)?).store(store))
                .await
                .with_context(|| format!("Failed to read {path}"))?;
            stdout.write_all(&file.content).await?;
        }
        Command::Stat { path } => {
            let info = files
                .get(FileRequest::new(parse_path(&path)?).store(store))
                .await
                .with_context(|| format!("Failed to stat {path}"))?;
            let json = serde_json::to_string_pretty(&info)?;
            stdout.write_all(format!("{json}\n").as_bytes()).await?;
        }
        Command::Put {
            path,
            file,
            content_type,
            overwrite,
        } => {
            let mut request =
                WriteFileRequest::new(parse_path(&path)?, Vec::new()).overwrite(overwrite);
            request.store = store.to_string();
            request.content_type = content_type;
            let info = match file {
                Some(local) => {
                    let mut reader = tokio::fs::File::open(&local)
                        .await
                        .with_context(|| format!("Failed to open {}", local.display()))?;
                    files.write_from_reader(request, &mut reader).await
                }
                None => {
                    files
                        .write_from_reader(request, &mut tokio::io::stdin())
                        .await
                }
            }
            .with_context(|| format!("Failed to write {path}"))?;
            tracing::info!(path = %info.path, size = info.size, "wrote file");
        }
        Command::Touch { path } => {
            files
                .touch(FileRequest::new(parse_path(&path)?).store(store))
                .await
                .with_context(|| format!("Failed to touch {path}"))?;
        }
        Command::Rm { path } => {
            files
                .delete(FileRequest::new(parse_path(&path)?).store(store))
                .await
                .with_context(|| format!("Failed to delete {path}"))?;
        }
        Command::Mkdir { path } => {
            directories
                .create(DirectoryRequest::new(parse_path(&path)?.as_directory()).store(store))
                .await
                .with_context(|| format!("Failed to create {path}"))?;
        }
        Command::Rmdir { path } => {
            directories
                .delete(DirectoryRequest::new(parse_path(&path)?.as_directory()).store(store))
                .await
                .with_context(|| format!("Failed to delete {path}"))?;
        }
        Command::Cp {
            source,
            destination,
            overwrite,
        } => transfer(storage, store, &source, &destination, overwrite, false).await?,
        Command::Mv {
            source,
            destination,
            overwrite,
        } => transfer(storage, store, &source, &destination, overwrite, true).await?,
        Command::Url { path, expires_in } => {
            let request = PublicUrlRequest::new(parse_path(&path)?)
                .expiry(expiry_after(expires_in)?)
                .store(store);
            let url = files
                .public_url(request)
                .await
                .with_context(|| format!("Failed to get a URL for {path}"))?;
            stdout.write_all(format!("{}\n", url.url).as_bytes()).await?;
        }
    }

    stdout.flush().await?;
    Ok(())
}

async fn transfer(
    storage: &Storage,
    store: &str,
    source: &str,
    destination: &str,
    overwrite: bool,
    remove_source: bool,
) -> Result<()> {
    let source_path = parse_path(source)?;
    let destination_path = parse_path(destination)?;
    let verb = if remove_source { "move" } else { "copy" };

    match (source_path.is_directory(), destination_path.is_directory()) {
        (true, true) => {
            if overwrite {
                bail!("--overwrite only applies to files");
            }
            let request =
                DirectoryTransferRequest::new(source_path, destination_path).store(store);
            let directories = storage.directories();
            let result = if remove_source {
                directories.move_to(request).await
            } else {
                directories.copy(request).await
            };
            result.with_context(|| format!("Failed to {verb} {source} to {destination}"))?;
        }
        (false, false) => {
            let request = TransferRequest::new(source_path, destination_path)
                .overwrite(overwrite)
                .store(store);
            let files = storage.files();
            let result = if remove_source {
                files.move_to(request).await
            } else {
                files.copy(request).await
            };
            result.with_context(|| format!("Failed to {verb} {source} to {destination}"))?;
        }
        _ => bail!("source and destination must both be files or both be directories"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let storage = open_storage(&args).await?;
    run(&storage, &args.store, args.command).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn config_and_root_conflict() {
        let result = Args::try_parse_from(["storekit", "--config", "a.json", "--root", ".", "ls"]);
        assert!(result.is_err());
    }

    #[test]
    fn expiry_rejects_out_of_range_lifetimes() {
        let soon = expiry_after(600).unwrap();
        assert!(soon > Utc::now());
        for seconds in [i64::MAX, i64::MIN, i64::MAX / 1000] {
            let err = expiry_after(seconds).unwrap_err();
            assert!(err.to_string().contains("out of range"), "{err}");
        }
    }

    #[tokio::test]
    async fn commands_operate_on_disk_root() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args::try_parse_from([
            "storekit",
            "--root",
            dir.path().to_str().unwrap(),
            "mkdir",
            "reports",
        ])
        .unwrap();
        let storage = open_storage(&args).await.unwrap();
        run(&storage, &args.store, args.command).await.unwrap();
        assert!(dir.path().join("reports").is_dir());

        run(&storage, DEFAULT_STORE, Command::Touch { path: "reports/a.txt".into() })
            .await
            .unwrap();
        run(
            &storage,
            DEFAULT_STORE,
            Command::Cp {
                source: "reports/".into(),
                destination: "archive/".into(),
                overwrite: false,
            },
        )
        .await
        .unwrap();
        assert!(dir.path().join("archive/a.txt").is_file());

        let err = run(
            &storage,
            DEFAULT_STORE,
            Command::Mv {
                source: "archive/".into(),
                destination: "file.txt".into(),
                overwrite: false,
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("both be files"));
    }
}
