use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{ArgGroup, Parser};

use sql_bulk_loader::config::{ConfigOverrides, LoaderConfig};
use sql_bulk_loader::db;
use sql_bulk_loader::import::Importer;

#[derive(Parser, Debug)]
#[command(
    name = "bulkload",
    about = "Load SQL dump files into MySQL with parallel workers",
    group(
        ArgGroup::new("source")
            .required(true)
            .multiple(true)
            .args(["file", "directory"])
    )
)]
struct Args {
    /// Path to INI configuration file ([bulkload] section).
    #[arg(long)]
    ini_file: Option<PathBuf>,

    /// MySQL host.
    #[arg(long)]
    host: Option<String>,

    /// MySQL port.
    #[arg(long)]
    port: Option<u16>,

    /// MySQL username.
    #[arg(long)]
    user: Option<String>,

    /// MySQL password.
    #[arg(long)]
    password: Option<String>,

    /// Database name.
    #[arg(long)]
    database: Option<String>,

    /// SQL file to import; ignored when --directory is also given.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Directory containing SQL files.
    #[arg(long)]
    directory: Option<PathBuf>,

    /// File pattern for data files (default `*-thread*.sql`).
    #[arg(long)]
    pattern: Option<String>,

    /// Number of parallel workers.
    #[arg(long)]
    workers: Option<usize>,

    /// Size of statement chunks (accepted, not used).
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Size of the statement queue.
    #[arg(long)]
    channel_buffer_size: Option<usize>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
            workers: self.workers,
            channel_buffer_size: self.channel_buffer_size,
            chunk_size: self.chunk_size,
            pattern: self.pattern.clone(),
        }
    }
}

#[tokio::main]
async fn main() {
    let start = Instant::now();
    sql_bulk_loader::init_logger();

    let args = Args::parse();
    if let Err(err) = run(&args).await {
        log::error!("{}", err);
        std::process::exit(1);
    }

    println!(
        "\nImport completed successfully. Execution time: {:?}",
        start.elapsed()
    );
}

async fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = LoaderConfig::load(args.overrides(), args.ini_file.as_deref())?;
    log::debug!(
        "chunk size {} is informational; statements are never batched",
        config.chunk_size
    );

    let pool = db::connect(&config).await?;
    let importer = Importer::new(Arc::new(pool.clone()), config.import_settings());

    log::info!("starting import with {} workers", config.workers);

    let result = if let Some(directory) = &args.directory {
        importer.import_directory(directory, &config.pattern).await
    } else if let Some(file) = &args.file {
        importer.import_file(file).await
    } else {
        return Err("please specify either --file or --directory".into());
    };
    pool.close().await;

    let stats = result?;
    println!(
        "Executed {} statements from {} files ({} rows affected)",
        stats.statements, stats.files, stats.rows_affected
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_and_file_may_both_be_given() {
        let args = Args::try_parse_from([
            "bulkload",
            "--file",
            "load.sql",
            "--directory",
            "dump",
        ])
        .expect("both sources accepted");
        assert_eq!(args.directory.as_deref(), Some(std::path::Path::new("dump")));
        assert_eq!(args.file.as_deref(), Some(std::path::Path::new("load.sql")));
    }

    #[test]
    fn a_source_is_required() {
        let err = Args::try_parse_from(["bulkload", "--workers", "2"]).expect_err("no source");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn flags_become_overrides() {
        let args = Args::try_parse_from([
            "bulkload",
            "--directory",
            "dump",
            "--workers",
            "8",
            "--channel-buffer-size",
            "16",
            "--pattern",
            "*.sql",
        ])
        .expect("parses");
        let overrides = args.overrides();
        assert_eq!(overrides.workers, Some(8));
        assert_eq!(overrides.channel_buffer_size, Some(16));
        assert_eq!(overrides.pattern.as_deref(), Some("*.sql"));
        assert_eq!(overrides.host, None);
    }
}
