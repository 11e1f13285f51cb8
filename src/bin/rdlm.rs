use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use rdl_migrator::app::{App, DownloadResult, MetadataRow, UploadOptions};
use rdl_migrator::config::{ConfigLoader, Overrides};
use rdl_migrator::domain::{CatalogPath, ItemKind};
use rdl_migrator::error::MigrateError;
use rdl_migrator::events::TracingSink;
use rdl_migrator::fs_util;
use rdl_migrator::output::{CheckResult, DownloadSummary, HumanOutput, JsonOutput, OutputMode};
use rdl_migrator::rewriter;
use rdl_migrator::transport::HttpTransport;

const PARTIAL_FAILURE: u8 = 4;

#[derive(Parser)]
#[command(name = "rdlm")]
#[command(about = "Move report definitions between local files and a Reporting Services catalog")]
#[command(version, author)]
struct Cli {
    /// Connection profile (defaults to ./rdlm.json, then the user config dir)
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    server_url: Option<String>,

    #[arg(long, global = true)]
    username: Option<String>,

    #[arg(long, global = true)]
    password: Option<String>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Check that the catalog root can be listed")]
    Check,
    #[command(about = "List catalog items under a path")]
    Ls(LsArgs),
    #[command(about = "List shared data sources")]
    DataSources(PathArg),
    #[command(about = "List reports directly inside a folder")]
    Reports(FolderArg),
    #[command(about = "Upload .rdl files to a folder")]
    Upload(UploadArgs),
    #[command(about = "Download report definitions from a folder")]
    Download(DownloadArgs),
    #[command(about = "Export report metadata (names, paths, timestamps)")]
    Export(FolderArg),
}

#[derive(Args)]
struct LsArgs {
    #[arg(default_value = "/")]
    path: String,

    #[arg(long, short)]
    recursive: bool,

    #[arg(long, value_enum)]
    kind: Option<ItemKind>,
}

#[derive(Args)]
struct PathArg {
    #[arg(default_value = "/")]
    path: String,
}

#[derive(Args)]
struct FolderArg {
    folder: String,
}

#[derive(Args)]
struct UploadArgs {
    folder: String,

    /// .rdl files or directories containing them
    #[arg(required = true)]
    inputs: Vec<Utf8PathBuf>,

    /// Rebind every data source to this shared data source path
    #[arg(long)]
    data_source: Option<String>,

    #[arg(long)]
    no_overwrite: bool,
}

#[derive(Args)]
struct DownloadArgs {
    folder: String,

    /// Download only these reports (repeatable); default is every report below the folder
    #[arg(long = "name")]
    names: Vec<String>,

    #[arg(long, default_value = ".")]
    out: Utf8PathBuf,

    /// Pack the definitions into a single ZIP archive
    #[arg(long)]
    zip: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(err) = report.downcast_ref::<MigrateError>() {
                return ExitCode::from(map_exit_code(err));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &MigrateError) -> u8 {
    match error {
        MigrateError::MissingSetting(_)
        | MigrateError::ConfigRead(_)
        | MigrateError::ConfigParse(_) => 2,
        MigrateError::Connection(_)
        | MigrateError::Protocol(_)
        | MigrateError::ProtocolStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let overrides = Overrides {
        server_url: cli.server_url,
        username: cli.username,
        password: cli.password,
    }
    .or(Overrides::from_env());
    let settings = ConfigLoader::resolve(cli.config.as_deref(), overrides)?;
    let endpoint = settings.context.endpoint().to_string();
    let app = App::connect(settings.context, settings.timeout, Arc::new(TracingSink))?
        .with_upload_limit(settings.upload_limit);

    match cli.command {
        Command::Check => run_check(&app, endpoint, mode),
        Command::Ls(args) => run_ls(&app, args, mode),
        Command::DataSources(args) => {
            let items = app.list_data_sources(&parse_path(&args.path)?)?;
            print_items(&items, mode)
        }
        Command::Reports(args) => {
            let items = app.list_reports(&parse_path(&args.folder)?)?;
            print_items(&items, mode)
        }
        Command::Upload(args) => run_upload(&app, args, mode),
        Command::Download(args) => run_download(&app, args, mode),
        Command::Export(args) => run_export(&app, args, mode),
    }
}

fn parse_path(value: &str) -> Result<CatalogPath, MigrateError> {
    value.parse()
}

fn run_check(
    app: &App<HttpTransport>,
    endpoint: String,
    mode: OutputMode,
) -> miette::Result<ExitCode> {
    let connected = app.check_connection()?;
    let result = CheckResult {
        endpoint,
        connected,
    };
    match mode {
        OutputMode::Json => JsonOutput::print(&result).into_diagnostic()?,
        OutputMode::Human => HumanOutput::print_check(&result),
    }
    Ok(if connected {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(3)
    })
}

fn run_ls(app: &App<HttpTransport>, args: LsArgs, mode: OutputMode) -> miette::Result<ExitCode> {
    let path = parse_path(&args.path)?;
    let mut items = app.list_children(&path, args.recursive)?;
    if let Some(kind) = args.kind {
        items.retain(|item| kind.matches(&item.item_type));
    }
    print_items(&items, mode)
}

fn print_items(
    items: &[rdl_migrator::domain::CatalogItem],
    mode: OutputMode,
) -> miette::Result<ExitCode> {
    match mode {
        OutputMode::Json => JsonOutput::print(items).into_diagnostic()?,
        OutputMode::Human => HumanOutput::print_items(items),
    }
    Ok(ExitCode::SUCCESS)
}

fn run_upload(
    app: &App<HttpTransport>,
    args: UploadArgs,
    mode: OutputMode,
) -> miette::Result<ExitCode> {
    let folder = parse_path(&args.folder)?;
    let documents = fs_util::read_documents(&args.inputs)?;
    if args.data_source.is_some() {
        for document in &documents {
            match rewriter::data_source_names(&document.bytes) {
                Ok(names) => tracing::info!(
                    report = %document.name,
                    data_sources = %names.join(", "),
                    "rebinding"
                ),
                Err(err) => tracing::debug!(report = %document.name, error = %err, "cannot inspect"),
            }
        }
    }
    let options = UploadOptions {
        data_source_path: args.data_source,
        overwrite: !args.no_overwrite,
    };
    let outcome = app.upload_batch(&folder, documents, &options)?;
    match mode {
        OutputMode::Json => JsonOutput::print(&outcome).into_diagnostic()?,
        OutputMode::Human => HumanOutput::print_outcome("uploaded", &outcome),
    }
    Ok(exit_for(outcome.is_clean()))
}

fn run_download(
    app: &App<HttpTransport>,
    args: DownloadArgs,
    mode: OutputMode,
) -> miette::Result<ExitCode> {
    let folder = parse_path(&args.folder)?;
    let (result, prefix): (DownloadResult, &str) = if args.names.is_empty() {
        (app.download_all(&folder)?, "SSRS_Reports")
    } else {
        (app.download_selected(&folder, &args.names)?, "SelectedReports")
    };

    let written = if result.files.is_empty() {
        Vec::new()
    } else if args.zip {
        let archive = args
            .out
            .join(fs_util::archive_name(prefix, chrono::Local::now()));
        fs_util::write_archive(&archive, &result.files)?;
        vec![archive.to_string()]
    } else {
        fs_util::write_files(&args.out, &result.files)?
            .into_iter()
            .map(|path| path.to_string())
            .collect()
    };

    let clean = result.outcome.is_clean();
    let summary = DownloadSummary {
        written,
        outcome: result.outcome,
    };
    match mode {
        OutputMode::Json => JsonOutput::print(&summary).into_diagnostic()?,
        OutputMode::Human => HumanOutput::print_download(&summary),
    }
    Ok(exit_for(clean))
}

fn run_export(
    app: &App<HttpTransport>,
    args: FolderArg,
    mode: OutputMode,
) -> miette::Result<ExitCode> {
    let folder = parse_path(&args.folder)?;
    let rows = app
        .report_metadata(&folder)?
        .iter()
        .map(MetadataRow::from)
        .collect::<Vec<_>>();
    match mode {
        OutputMode::Json => JsonOutput::print(&rows).into_diagnostic()?,
        OutputMode::Human => HumanOutput::print_metadata(&rows),
    }
    Ok(ExitCode::SUCCESS)
}

fn exit_for(clean: bool) -> ExitCode {
    if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(PARTIAL_FAILURE)
    }
}
