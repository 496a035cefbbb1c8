use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand, ValueEnum};
use convoy_cli::config::{self, ConfigMerger, DeployOverrides};
use convoy_core::adapters::{
    FsBundleLoader, FsBundleLocator, FsDependencyFetcher, FsReleaseStore, FsSourceReader,
};
use convoy_core::{DeployError, DeployPorts, DeployRequest, ValueOptions, deploy};
use convoy_render::{OutputFormat, StatusOptions, render_status};
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "convoy",
    version,
    about = "Install a bundle as a named release, or upgrade it if it already exists."
)]
struct Cli {
    /// Verbose logging and a fuller status report.
    #[arg(long, global = true)]
    debug: bool,

    /// Config file (default: ./convoy.toml when present).
    #[arg(long, global = true)]
    config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Install the release if it does not exist, otherwise upgrade it.
    Deploy(DeployArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputArg {
    Table,
    Json,
    Yaml,
}

impl From<OutputArg> for OutputFormat {
    fn from(arg: OutputArg) -> Self {
        match arg {
            OutputArg::Table => OutputFormat::Table,
            OutputArg::Json => OutputFormat::Json,
            OutputArg::Yaml => OutputFormat::Yaml,
        }
    }
}

#[derive(Debug, Parser)]
struct DeployArgs {
    /// RELEASE BUNDLE
    #[arg(value_name = "ARGS")]
    args: Vec<String>,

    /// Namespace of the release.
    #[arg(short, long, env = "CONVOY_NAMESPACE")]
    namespace: Option<String>,

    /// Values file or URL (repeatable, later files win).
    #[arg(short = 'f', long = "values")]
    value_files: Vec<String>,

    /// key=value assignments with typed values (repeatable).
    #[arg(long = "set")]
    set: Vec<String>,

    /// key=value assignments kept as strings (repeatable).
    #[arg(long = "set-string")]
    set_string: Vec<String>,

    /// key=path assignments read from files (repeatable).
    #[arg(long = "set-file")]
    set_file: Vec<String>,

    /// Version constraint on the bundle (default: newest).
    #[arg(long = "version")]
    bundle_version: Option<String>,

    /// How long to wait for convergence, e.g. 300, 300s, 5m.
    #[arg(long)]
    timeout: Option<String>,

    /// Roll back on failure. Implies --wait.
    #[arg(long)]
    atomic: bool,

    /// Wait until the release has converged.
    #[arg(long)]
    wait: bool,

    /// Create the namespace if it does not exist (install only).
    #[arg(long)]
    create_namespace: bool,

    /// Fetch missing dependencies before deploying. Writes `charts/` and `Bundle.lock`
    /// into the bundle directory, including bundles resolved from a repository.
    #[arg(long)]
    dependency_update: bool,

    /// Simulate the deploy without storing anything.
    #[arg(long)]
    dry_run: bool,

    /// On upgrade, merge new values over the previous release's values.
    #[arg(long)]
    reuse_values: bool,

    /// On upgrade, ignore the previous release's values.
    #[arg(long)]
    reset_values: bool,

    /// Custom release description.
    #[arg(long)]
    description: Option<String>,

    /// Status output format.
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputArg,

    /// Release store directory (default: .convoy/releases).
    #[arg(long)]
    state_dir: Option<Utf8PathBuf>,

    /// Directory searched for dependencies that name no repository.
    #[arg(long)]
    repository_cache: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match real_main(cli) {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            if let Some(deploy_err) = e.downcast_ref::<DeployError>() {
                eprintln!("Error: {deploy_err}");
                debug!(phase = %deploy_err.phase(), "{:?}", e);
                return ExitCode::from(deploy_err.exit_code());
            }
            error!("{:?}", e);
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn real_main(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => config::load_or_default(&Utf8PathBuf::from("."))?,
    };
    match cli.cmd {
        Command::Deploy(args) => cmd_deploy(args, config, cli.debug),
    }
}

fn cmd_deploy(args: DeployArgs, config: config::ConvoyConfig, debug: bool) -> anyhow::Result<()> {
    let overrides = DeployOverrides {
        namespace: args.namespace,
        timeout: args.timeout,
        atomic: args.atomic,
        wait: args.wait,
        create_namespace: args.create_namespace,
        dependency_update: args.dependency_update,
        state_dir: args.state_dir,
        repository_cache: args.repository_cache,
    };
    let merged = ConfigMerger::new(config)
        .merge_deploy_args(&overrides)
        .context("merge config with CLI arguments")?;
    debug!(
        namespace = %merged.settings.namespace,
        timeout_secs = merged.settings.timeout.as_secs(),
        state_dir = %merged.state_dir,
        "resolved deploy settings"
    );

    let request = DeployRequest {
        args: args.args,
        version: args.bundle_version,
        values: ValueOptions {
            value_files: args.value_files,
            values: args.set,
            string_values: args.set_string,
            file_values: args.set_file,
        },
        dry_run: args.dry_run,
        reuse_values: args.reuse_values,
        reset_values: args.reset_values,
        description: args.description,
    };

    let store = FsReleaseStore::new(merged.state_dir.clone());
    let locator = FsBundleLocator::new();
    let loader = FsBundleLoader;
    let fetcher = FsDependencyFetcher;
    let sources = FsSourceReader::new();
    let ports = DeployPorts {
        probe: &store,
        locator: &locator,
        loader: &loader,
        fetcher: &fetcher,
        values: &sources,
        executor: &store,
    };

    let outcome = deploy(&merged.settings, &request, &ports)?;
    info!(
        release = %outcome.release.name,
        revision = outcome.release.revision,
        operation = %outcome.operation,
        "deploy finished"
    );

    let opts = StatusOptions {
        debug,
        show_description: false,
    };
    let rendered = render_status(&outcome.release, args.output.into(), opts)?;
    print!("{rendered}");
    Ok(())
}
