use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use itr_filer_lib::config::{self, AppConfig};
use itr_filer_lib::db::{RecordingOracle, SqliteRunStore};
use itr_filer_lib::models::{
    FilingInput, ManualInput, RawDeductionFields, RawIncomeFields, TaxRegime, TaxpayerProfile,
};
use itr_filer_lib::pipeline::import::{load_documents, PlainTextSource};
use itr_filer_lib::pipeline::oracle::{connect, InferenceOracle};
use itr_filer_lib::pipeline::{FilingPipeline, FilingService};
use itr_filer_lib::rules::TaxRules;

#[derive(Parser, Debug)]
#[command(name = "itr-filer", version, about = "Local ITR-1 filing pipeline")]
struct Cli {
    /// Run database; overrides ITR_DB_PATH.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Do not record oracle calls in the audit table.
    #[arg(long, global = true, default_value_t = false)]
    no_audit: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// File a return from a manual JSON input or from document files.
    File(FileArgs),
    /// Parse a free-form description into manual input JSON.
    Describe {
        text: String,
        /// File the parsed input straight away.
        #[arg(long, default_value_t = false)]
        file: bool,
    },
    /// Resume a run held for review with corrected figures.
    Resume {
        run_id: Uuid,
        /// JSON with `income` and `deductions` objects.
        #[arg(long)]
        corrections: String,
    },
    /// Print a stored run.
    Show { run_id: Uuid },
    /// List stored runs, newest first.
    Runs,
    /// Print recent oracle calls from the audit table.
    OracleCalls {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Args, Debug)]
struct FileArgs {
    /// Manual input as JSON text, or @path to a JSON file.
    #[arg(long, conflicts_with = "docs")]
    manual: Option<String>,

    /// Text documents to extract figures from.
    #[arg(long, num_args = 1.., required_unless_present = "manual")]
    docs: Vec<PathBuf>,

    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    pan: Option<String>,

    #[arg(long)]
    age: Option<u32>,

    /// OLD or NEW.
    #[arg(long)]
    regime: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Corrections {
    income: RawIncomeFields,
    deductions: RawDeductionFields,
}

fn main() {
    itr_filer_lib::init_tracing();

    if let Err(err) = run() {
        tracing::error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            tracing::error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut app_config = AppConfig::from_env();
    if let Some(db) = cli.db {
        app_config.db_path = db;
    }
    tracing::info!(version = config::APP_VERSION, db = %app_config.db_path.display(), "ITR filer starting");

    let service = build_service(&app_config, !cli.no_audit)?;
    run_command(&service, cli.command)
}

fn run_command(service: &FilingService<SqliteRunStore>, command: Commands) -> Result<()> {
    match command {
        Commands::File(args) => {
            let input = filing_input(args)?;
            print_json(&service.file(input)?)
        }
        Commands::Describe { text, file } => {
            let manual = service.describe(&text);
            if file {
                print_json(&service.file(FilingInput::Manual(manual))?)
            } else {
                print_json(&manual)
            }
        }
        Commands::Resume { run_id, corrections } => {
            let corrections: Corrections = serde_json::from_str(&read_json_arg(&corrections)?)
                .context("corrections are not valid JSON")?;
            print_json(&service.resume(run_id, corrections.income, corrections.deductions)?)
        }
        Commands::Show { run_id } => print_json(&service.show(run_id)?),
        Commands::Runs => print_json(&service.history()?),
        Commands::OracleCalls { limit } => print_json(&service.store().oracle_calls(limit)?),
    }
}

fn build_service(app_config: &AppConfig, audit: bool) -> Result<FilingService<SqliteRunStore>> {
    let rules = TaxRules::load(app_config.rules_path.as_deref()).context("loading tax rules")?;
    let mut oracle: Arc<dyn InferenceOracle> = connect(&app_config.oracle);
    if audit && oracle.is_live() {
        oracle = Arc::new(
            RecordingOracle::open(oracle, &app_config.db_path).context("opening oracle audit log")?,
        );
    }
    let store = SqliteRunStore::open(&app_config.db_path).context("opening run database")?;
    let pipeline = FilingPipeline::new(oracle, rules, app_config.pipeline.clone());
    Ok(FilingService::new(pipeline, store))
}

fn filing_input(args: FileArgs) -> Result<FilingInput> {
    if let Some(manual) = &args.manual {
        let mut input: ManualInput =
            serde_json::from_str(&read_json_arg(manual)?).context("manual input is not valid JSON")?;
        apply_taxpayer_overrides(&mut input.taxpayer, &args)?;
        return Ok(FilingInput::Manual(input));
    }

    let mut taxpayer = TaxpayerProfile::default();
    apply_taxpayer_overrides(&mut taxpayer, &args)?;
    let documents = load_documents(&PlainTextSource, &args.docs);
    Ok(FilingInput::Documents {
        taxpayer,
        documents,
    })
}

fn apply_taxpayer_overrides(taxpayer: &mut TaxpayerProfile, args: &FileArgs) -> Result<()> {
    if let Some(name) = &args.name {
        taxpayer.name = name.clone();
    }
    if let Some(pan) = &args.pan {
        taxpayer.pan = pan.clone();
    }
    if let Some(age) = args.age {
        taxpayer.age = age;
    }
    if let Some(regime) = &args.regime {
        taxpayer.regime = regime
            .trim()
            .to_uppercase()
            .parse::<TaxRegime>()
            .with_context(|| format!("unknown regime '{regime}', expected OLD or NEW"))?;
    }
    Ok(())
}

/// `@path` reads the JSON from a file.
fn read_json_arg(value: &str) -> Result<String> {
    match value.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {path}")),
        None => Ok(value.to_string()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
