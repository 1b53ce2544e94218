//! mssql-pg-copy CLI - batched MSSQL to PostgreSQL table copy.

use clap::{Args, Parser, Subcommand};
use mssql_pg_copy::config::split_list;
use mssql_pg_copy::{
    generate_schema, Config, MigrateError, MigrationResult, Orchestrator, RowErrorPolicy,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "mssql-pg-copy")]
#[command(about = "Batched, transactional MSSQL to PostgreSQL table copy")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

/// Which source tables to work on.
#[derive(Args, Debug, Default)]
struct SelectionArgs {
    /// Comma-separated source schemas (e.g. dbo,sales)
    #[arg(long)]
    schemas: Option<String>,

    /// Comma-separated tables to copy (schema.table)
    #[arg(long)]
    tables: Option<String>,

    /// Comma-separated exclude patterns (`*` wildcard)
    #[arg(long)]
    exclude_tables: Option<String>,

    /// Keep SQL Server system schemas and sys* tables
    #[arg(long)]
    include_system_schemas: bool,

    /// Quote target identifiers to preserve their case
    #[arg(long)]
    preserve_case: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy table data from SQL Server into PostgreSQL
    Run {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Skip tables with no rows
        #[arg(long)]
        exclude_empty_tables: bool,

        /// Skip tables with more rows than this
        #[arg(long, value_name = "ROWS")]
        exclude_large_tables: Option<i64>,

        /// Skip tables larger than this many MB
        #[arg(long, value_name = "MB")]
        max_table_size: Option<i64>,

        /// Skip tables that already have rows in the target
        #[arg(long)]
        skip_if_exists: bool,

        /// Rows per target transaction
        #[arg(long)]
        batch_size: Option<usize>,

        /// Truncate target tables before copying
        #[arg(long)]
        truncate: bool,

        /// What to do with a row the target rejects: abort or skip
        #[arg(long, value_name = "POLICY")]
        on_row_error: Option<RowErrorPolicy>,

        /// Dry run: show the table plan without copying data
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate PostgreSQL DDL from the source catalog
    Schema {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Output path for the generated SQL
        #[arg(short, long, default_value = "postgres_schema.sql")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            selection,
            exclude_empty_tables,
            exclude_large_tables,
            max_table_size,
            skip_if_exists,
            batch_size,
            truncate,
            on_row_error,
            dry_run,
        } => {
            apply_selection(&mut config, selection);
            let migration = &mut config.migration;
            migration.exclude_empty_tables |= exclude_empty_tables;
            migration.skip_if_exists |= skip_if_exists;
            migration.truncate |= truncate;
            if let Some(rows) = exclude_large_tables {
                migration.exclude_large_tables = rows;
            }
            if let Some(mb) = max_table_size {
                migration.max_table_size_mb = mb;
            }
            if let Some(size) = batch_size {
                migration.batch_size = size;
            }
            if let Some(policy) = on_row_error {
                migration.on_row_error = policy;
            }
            config.validate()?;

            let orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.run(dry_run).await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                print_summary(&result, dry_run);
            }
        }

        Commands::Schema { selection, output } => {
            apply_selection(&mut config, selection);
            config.validate()?;

            let script = generate_schema(&config, &output).await?;
            println!("{}", script);
        }
    }

    Ok(())
}

fn apply_selection(config: &mut Config, selection: SelectionArgs) {
    let migration = &mut config.migration;
    if let Some(schemas) = selection.schemas {
        migration.schemas = split_list(&schemas);
    }
    if let Some(tables) = selection.tables {
        migration.tables = split_list(&tables);
    }
    if let Some(patterns) = selection.exclude_tables {
        migration.exclude_tables = split_list(&patterns);
    }
    migration.include_system_schemas |= selection.include_system_schemas;
    migration.preserve_case |= selection.preserve_case;
}

fn print_summary(result: &MigrationResult, dry_run: bool) {
    if dry_run {
        println!("\nDry run completed!");
        println!("  Tables to copy: {}", result.tables_planned);
        for table in &result.planned {
            println!("    {}", table);
        }
    } else {
        println!("\nMigration completed!");
        println!("  Run ID: {}", result.run_id);
        println!("  Duration: {:.2}s", result.duration_seconds);
        println!("  Tables: {}/{}", result.tables_copied, result.tables_planned);
        println!("  Rows: {}", result.rows_copied);
        if result.rows_skipped > 0 {
            println!("  Rows skipped: {}", result.rows_skipped);
        }
        println!("  Throughput: {} rows/sec", result.rows_per_second);
    }
    if !result.dropped.is_empty() {
        println!("  Skipped tables:");
        for dropped in &result.dropped {
            println!("    {} ({})", dropped.table, dropped.reason);
        }
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
