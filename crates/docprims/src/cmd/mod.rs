use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Subcommand};
use docprims_schema::{RegistryConfig, Schema, SchemaRegistry};
use serde_json::Value;

use crate::exit::{io_error, schema_error, CliError, CliResult, DATA_INVALID, INTERNAL};
use crate::output::OutputFormat;

pub mod check;
pub mod formats;
pub mod validate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate documents against a schema.
    Validate(ValidateArgs),
    /// Check a schema definition and resolve its references.
    Check(CheckArgs),
    /// List registered format and type validators.
    Formats(FormatsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Validate(args) => validate::run(args, format),
        Command::Check(args) => check::run(args, format),
        Command::Formats(args) => formats::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Options shared by commands that load schemas.
#[derive(Args, Debug, Clone, Default)]
pub struct RegistryArgs {
    /// Directory of `<name>.schema.json` files available to `$ref`.
    #[arg(long, value_name = "DIR", env = "DOCPRIMS_SCHEMA_DIR")]
    pub schemas: Option<PathBuf>,
    /// Reject properties that object schemas do not declare.
    #[arg(long)]
    pub strict: bool,
    /// Do not fetch remote `$ref` targets.
    #[arg(long)]
    pub offline: bool,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Schema definition file.
    #[arg(long, short = 's', value_name = "FILE")]
    pub schema: PathBuf,
    /// Documents to validate (JSON files).
    #[arg(required = true, value_name = "DOCUMENT")]
    pub documents: Vec<PathBuf>,
    #[command(flatten)]
    pub registry: RegistryArgs,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Schema definition file.
    pub schema: PathBuf,
    #[command(flatten)]
    pub registry: RegistryArgs,
}

#[derive(Args, Debug, Default)]
pub struct FormatsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn build_registry(args: &RegistryArgs) -> CliResult<Arc<SchemaRegistry>> {
    let config = RegistryConfig {
        strict_mode: args.strict,
        ..RegistryConfig::default()
    };
    let registry = with_remote_fetcher(SchemaRegistry::with_config(config), args)?;

    if let Some(dir) = &args.schemas {
        let names = registry
            .load_directory(dir)
            .map_err(|err| schema_error(&format!("loading {}", dir.display()), err))?;
        tracing::info!(dir = %dir.display(), count = names.len(), "registered schema directory");
    }

    Ok(Arc::new(registry))
}

#[cfg(feature = "http")]
fn with_remote_fetcher(registry: SchemaRegistry, args: &RegistryArgs) -> CliResult<SchemaRegistry> {
    if args.offline {
        return Ok(registry);
    }
    let fetcher = docprims_schema::HttpFetcher::new()
        .map_err(|err| schema_error("remote schema support", err))?;
    Ok(registry.with_fetcher(Arc::new(fetcher)))
}

#[cfg(not(feature = "http"))]
fn with_remote_fetcher(registry: SchemaRegistry, _args: &RegistryArgs) -> CliResult<SchemaRegistry> {
    Ok(registry)
}

/// Name a schema after its file: `person.schema.json` and `person.json` are both `person`.
pub(crate) fn schema_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    file_name
        .strip_suffix(".schema.json")
        .or_else(|| file_name.strip_suffix(".json"))
        .unwrap_or(&file_name)
        .to_string()
}

pub(crate) fn read_json(path: &Path) -> CliResult<Value> {
    let content = std::fs::read_to_string(path).map_err(|err| io_error(path, err))?;
    serde_json::from_str(&content)
        .map_err(|err| CliError::new(DATA_INVALID, format!("{}: invalid JSON: {err}", path.display())))
}

pub(crate) fn load_schema(path: &Path, registry: Arc<SchemaRegistry>) -> CliResult<Schema> {
    let definition = read_json(path)?;
    Schema::new(schema_name(path), definition, registry)
        .map_err(|err| schema_error(&path.display().to_string(), err))
}

pub(crate) fn block_on<F: Future>(future: F) -> CliResult<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("failed to start runtime: {err}")))?;
    Ok(runtime.block_on(future))
}
