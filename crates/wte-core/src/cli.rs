//! Command-line interface for the `wte` binary.
//!
//! Every command prints one report to stdout, either human text or a JSON
//! envelope carrying `schema_version`, `run_id`, `generated_at` and
//! `command`. Logs go to stderr.

use std::io;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::Serialize;
use tracing::warn;
use wte_common::{Error, OutputFormat, RunId, SCHEMA_VERSION};
use wte_config::{resolve_config, ConfigError, ConfigPaths, PipelineConfig, ResolvedConfig};
use wte_export::{render_overview, write_overview_parquet, Compression, WriterConfig};

use crate::exit_codes::ExitCode;
use crate::logging::LogFormat;
use crate::overview::{counter_columns, read_overview};
use crate::pipeline::{ensure_tables, Pipeline, PipelineError};
use crate::store::{JsonFileStore, TabularStore};

const DATA_DIR_NAME: &str = "warehouse_efficiency";

/// Warehouse transport efficiency pipeline
#[derive(Parser, Debug)]
#[command(name = "wte", version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the table store
    #[arg(long, global = true, env = "WTE_DATA_DIR", value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Pipeline config file (.json or .toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Report format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Human)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create every configured table that does not exist yet
    Init,
    /// Run prepare, analyze, archive and cleanup in order
    RunAll,
    /// Derive the staging tables from the raw imports
    Prepare,
    /// Compute per-batch aggregates from staging
    Analyze,
    /// Append new aggregate rows to the overview
    Archive,
    /// Clear staging and raw tables
    Cleanup,
    /// Inspect or export the archived overview
    Overview(OverviewArgs),
    /// Inspect the effective configuration
    Config(ConfigArgs),
    /// Generate shell completions
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct OverviewArgs {
    #[command(subcommand)]
    pub command: OverviewCommands,
}

#[derive(Subcommand, Debug)]
pub enum OverviewCommands {
    /// Print archived rows
    Show {
        /// Only the most recent N rows
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Write archived rows to a Parquet file
    Export {
        /// Output file path
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
        /// Column compression
        #[arg(long, value_enum, default_value_t = CompressionArg::Zstd)]
        compression: CompressionArg,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompressionArg {
    Zstd,
    Snappy,
    None,
}

impl From<CompressionArg> for Compression {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::Zstd => Compression::Zstd,
            CompressionArg::Snappy => Compression::Snappy,
            CompressionArg::None => Compression::None,
        }
    }
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration and where it came from
    Show,
    /// Print the JSON schema of the config file
    Schema,
    /// Validate a config file (defaults to the resolved one)
    Validate {
        /// Config file to validate
        path: Option<PathBuf>,
    },
}

/// Default store location under the user data directory.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR_NAME)
}

/// Per-invocation context shared by the command handlers.
struct Context {
    format: OutputFormat,
    run_id: RunId,
    data_dir: PathBuf,
}

impl Context {
    fn emit<T: Serialize>(&self, command: &str, result: &T, human: impl FnOnce()) {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "schema_version": SCHEMA_VERSION,
                    "run_id": self.run_id,
                    "generated_at": chrono::Utc::now().to_rfc3339(),
                    "command": command,
                    "result": result,
                });
                print_json(&output);
            }
            OutputFormat::Human => human(),
        }
    }

    fn fail(&self, command: &str, err: &Error, stage: Option<&str>) -> ExitCode {
        let code = ExitCode::from(err);
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "schema_version": SCHEMA_VERSION,
                    "run_id": self.run_id,
                    "generated_at": chrono::Utc::now().to_rfc3339(),
                    "command": command,
                    "error": {
                        "code": err.code(),
                        "stage": stage,
                        "message": err.to_string(),
                    },
                });
                print_json(&output);
            }
            OutputFormat::Human => match stage {
                Some(stage) => eprintln!("error: {stage} stage failed: {err}"),
                None => eprintln!("error: {err}"),
            },
        }
        code
    }

    fn fail_stage(&self, command: &str, err: &PipelineError) -> ExitCode {
        self.fail(command, err.inner(), Some(err.stage().as_str()))
    }

    fn open_store(&self) -> Result<JsonFileStore, Error> {
        JsonFileStore::open(&self.data_dir)
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("error: failed to encode report: {e}"),
    }
}

/// Dispatch a parsed command line.
pub fn run(cli: Cli) -> ExitCode {
    let ctx = Context {
        format: cli.format,
        run_id: RunId::new(),
        data_dir: cli.data_dir.clone().unwrap_or_else(default_data_dir),
    };

    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "wte", &mut io::stdout());
        return ExitCode::Clean;
    }
    if let Commands::Config(args) = &cli.command {
        return run_config(&ctx, cli.config.as_deref(), args);
    }

    let resolved = match resolve_config(&ConfigPaths::discover(cli.config.as_deref())) {
        Ok(resolved) => resolved,
        Err(e) => return ctx.fail("config", &Error::from(e), None),
    };
    let config = &resolved.config;

    match &cli.command {
        Commands::Init => run_init(&ctx, config),
        Commands::RunAll => run_stage(&ctx, config, "run-all", |p| {
            p.run_all().map(|r| {
                let code = nothing_new(r.archive.appended);
                (serde_json::to_value(&r), code, render_run(&r))
            })
        }),
        Commands::Prepare => run_stage(&ctx, config, "prepare", |p| {
            p.prepare().map(|r| {
                let text = format!(
                    "Staged {} completed and {} created shipments, {} pallet finalizations, {} order rows",
                    r.shipments_completed, r.shipments_created, r.pallet_finalizations, r.order_flags
                );
                (serde_json::to_value(&r), ExitCode::Clean, text)
            })
        }),
        Commands::Analyze => run_stage(&ctx, config, "analyze", |p| {
            p.analyze().map(|r| {
                let text = format!(
                    "Aggregated {} batches from {} candidate rows ({} without a complete window)",
                    r.rows, r.candidates, r.incomplete_windows
                );
                (serde_json::to_value(&r), ExitCode::Clean, text)
            })
        }),
        Commands::Archive => run_stage(&ctx, config, "archive", |p| {
            p.archive().map(|r| {
                let text = format!(
                    "Archived {} new rows ({} already present, {} without key)",
                    r.appended, r.skipped_existing, r.skipped_empty
                );
                (serde_json::to_value(&r), nothing_new(r.appended), text)
            })
        }),
        Commands::Cleanup => run_stage(&ctx, config, "cleanup", |p| {
            p.cleanup().map(|r| {
                let text = format!(
                    "Cleared {} tables; active table is '{}'",
                    r.cleared_tables.len() + usize::from(r.cleared_columns.is_some()),
                    r.active
                );
                (serde_json::to_value(&r), ExitCode::Clean, text)
            })
        }),
        Commands::Overview(args) => run_overview(&ctx, config, args),
        Commands::Config(_) | Commands::Completions { .. } => ExitCode::Clean,
    }
}

fn nothing_new(appended: usize) -> ExitCode {
    if appended == 0 {
        ExitCode::NothingNew
    } else {
        ExitCode::Clean
    }
}

fn render_run(report: &crate::pipeline::RunReport) -> String {
    let p = &report.prepare;
    let a = &report.analyze;
    let r = &report.archive;
    format!(
        "# Run {}\n\n  prepare: {} completed, {} created, {} pallets, {} order rows\n  analyze: {} batches from {} candidates ({} incomplete)\n  archive: {} appended, {} skipped\n  cleanup: {} tables cleared, active '{}'",
        report.run_id,
        p.shipments_completed,
        p.shipments_created,
        p.pallet_finalizations,
        p.order_flags,
        a.rows,
        a.candidates,
        a.incomplete_windows,
        r.appended,
        r.skipped(),
        report.cleanup.cleared_tables.len(),
        report.cleanup.active
    )
}

type StageOutput = (serde_json::Result<serde_json::Value>, ExitCode, String);

fn run_stage(
    ctx: &Context,
    config: &PipelineConfig,
    command: &str,
    body: impl FnOnce(&mut Pipeline<'_, JsonFileStore>) -> Result<StageOutput, PipelineError>,
) -> ExitCode {
    let mut store = match ctx.open_store() {
        Ok(store) => store,
        Err(e) => return ctx.fail(command, &e, None),
    };
    let mut pipeline = Pipeline::new(&mut store, config, ctx.run_id.clone());
    match body(&mut pipeline) {
        Ok((value, code, text)) => {
            let value = match value {
                Ok(value) => value,
                Err(e) => return ctx.fail(command, &Error::Json(e), None),
            };
            ctx.emit(command, &value, || println!("{text}"));
            code
        }
        Err(e) => ctx.fail_stage(command, &e),
    }
}

fn run_init(ctx: &Context, config: &PipelineConfig) -> ExitCode {
    let mut store = match ctx.open_store() {
        Ok(store) => store,
        Err(e) => return ctx.fail("init", &e, None),
    };
    match ensure_tables(&mut store, config) {
        Ok(created) => {
            let result = serde_json::json!({
                "data_dir": ctx.data_dir,
                "created": created,
                "tables": store.table_names(),
            });
            ctx.emit("init", &result, || {
                println!(
                    "Initialized {} ({} new tables, {} total)",
                    ctx.data_dir.display(),
                    created.len(),
                    store.table_names().len()
                );
                for name in &created {
                    println!("  + {name}");
                }
            });
            ExitCode::Clean
        }
        Err(e) => ctx.fail("init", &e, None),
    }
}

fn run_overview(ctx: &Context, config: &PipelineConfig, args: &OverviewArgs) -> ExitCode {
    let command = match args.command {
        OverviewCommands::Show { .. } => "overview show",
        OverviewCommands::Export { .. } => "overview export",
    };
    let rows = match ctx.open_store().and_then(|store| read_overview(&store, config)) {
        Ok(rows) => rows,
        Err(e) => return ctx.fail(command, &e, None),
    };
    let records: Vec<_> = rows.iter().map(|r| r.to_record()).collect();
    let counters = counter_columns(config);

    match &args.command {
        OverviewCommands::Show { limit } => {
            let skip = limit.map_or(0, |n| records.len().saturating_sub(n));
            let shown = &records[skip..];
            match ctx.format {
                OutputFormat::Json => ctx.emit(command, &shown, || {}),
                OutputFormat::Human => match render_overview(shown, &counters) {
                    Ok(text) => println!("{text}"),
                    Err(e) => {
                        eprintln!("error: {e}");
                        return ExitCode::InternalError;
                    }
                },
            }
            ExitCode::Clean
        }
        OverviewCommands::Export { out, compression } => {
            let writer = WriterConfig {
                compression: (*compression).into(),
                ..WriterConfig::default()
            };
            match write_overview_parquet(&records, &counters, out, &writer) {
                Ok(written) => {
                    let result = serde_json::json!({ "path": out, "rows": written });
                    ctx.emit(command, &result, || {
                        println!("Exported {written} rows to {}", out.display())
                    });
                    ExitCode::Clean
                }
                Err(e) => {
                    warn!(error = %e, path = %out.display(), "overview export failed");
                    ctx.fail(command, &Error::Store(e.to_string()), None)
                }
            }
        }
    }
}

fn run_config(ctx: &Context, cli_path: Option<&Path>, args: &ConfigArgs) -> ExitCode {
    match &args.command {
        ConfigCommands::Show => match resolve_config(&ConfigPaths::discover(cli_path)) {
            Ok(resolved) => show_config(ctx, &resolved),
            Err(e) => ctx.fail("config show", &Error::from(e), None),
        },
        ConfigCommands::Schema => {
            let schema = schemars::schema_for!(PipelineConfig);
            match serde_json::to_value(&schema) {
                Ok(value) => {
                    print_json(&value);
                    ExitCode::Clean
                }
                Err(e) => ctx.fail("config schema", &Error::Json(e), None),
            }
        }
        ConfigCommands::Validate { path } => {
            let outcome = match path.as_deref().or(cli_path) {
                Some(path) => PipelineConfig::load(path).map(|_| path.display().to_string()),
                None => resolve_config(&ConfigPaths::discover(None)).map(|r| format!("{:?}", r.source)),
            };
            match outcome {
                Ok(source) => {
                    let result = serde_json::json!({ "valid": true, "source": source });
                    ctx.emit("config validate", &result, || println!("Config OK ({source})"));
                    ExitCode::Clean
                }
                Err(ConfigError::Invalid(result)) => {
                    let body = serde_json::json!({ "valid": false, "errors": result.errors });
                    ctx.emit("config validate", &body, || {
                        println!("Config invalid:");
                        for err in &result.errors {
                            println!("  {err}");
                        }
                    });
                    ExitCode::ConfigError
                }
                Err(e) => ctx.fail("config validate", &Error::from(e), None),
            }
        }
    }
}

fn show_config(ctx: &Context, resolved: &ResolvedConfig) -> ExitCode {
    let result = serde_json::json!({
        "source": resolved.source,
        "config": resolved.config,
    });
    match ctx.format {
        OutputFormat::Json => ctx.emit("config show", &result, || {}),
        OutputFormat::Human => match toml::to_string_pretty(&resolved.config) {
            Ok(text) => {
                println!("# source: {:?}\n", resolved.source);
                println!("{text}");
            }
            Err(e) => return ctx.fail("config show", &Error::Config(e.to_string()), None),
        },
    }
    ExitCode::Clean
}
