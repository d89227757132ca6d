//! oam-ecs CLI entrypoint.
//!
//! This is the main entrypoint for the oam-ecs command-line tool.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use oam_ecs::application::ApplicationDeployer;
use oam_ecs::cli::{AppCommands, Cli, Commands, EnvCommands, OutputFormatter};
use oam_ecs::cloudformation::{AwsCloudFormationClient, CloudFormation};
use oam_ecs::error::Result;
use oam_ecs::oam::WorkloadLoader;
use oam_ecs::settings::Settings;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let formatter = OutputFormatter::new(cli.output);
    match runtime.block_on(run(cli, &formatter)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", formatter.format_error(&format!("Error: {e}")));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` wins over the verbosity flag when set.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli, formatter: &OutputFormatter) -> Result<()> {
    let settings = Settings::from_env()?.with_region(cli.region);

    let output = match cli.command {
        Commands::Apply { files, dry_run } => {
            cmd_apply(&settings, &files.paths(), dry_run, formatter).await?
        }
        Commands::App { command } => cmd_app(&settings, command, formatter).await?,
        Commands::Env { command } => cmd_env(&settings, command, formatter).await?,
    };

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{output}")?;
    Ok(())
}

/// Deploy an application, or write its templates.
async fn cmd_apply(
    settings: &Settings,
    files: &[PathBuf],
    dry_run: bool,
    formatter: &OutputFormatter,
) -> Result<String> {
    let workload = WorkloadLoader::new().load(files)?;
    let deployer = if dry_run {
        offline_deployer(settings)
    } else {
        create_deployer(settings).await
    };

    let outcomes = deployer.apply(&workload, dry_run).await?;
    Ok(formatter.format_apply(&outcomes))
}

/// Application commands.
async fn cmd_app(
    settings: &Settings,
    command: AppCommands,
    formatter: &OutputFormatter,
) -> Result<String> {
    let loader = WorkloadLoader::new();

    match command {
        AppCommands::Show { files } => {
            let application = loader.load_application(&files.paths())?;
            let deployer = create_deployer(settings).await;
            let components = deployer.show(&application).await?;
            Ok(formatter.format_components("found", &components))
        }
        AppCommands::Delete { files } => {
            let application = loader.load_application(&files.paths())?;
            let deployer = create_deployer(settings).await;
            let components = deployer.delete(&application).await?;
            Ok(formatter.format_components("deleted", &components))
        }
    }
}

/// Environment commands.
async fn cmd_env(
    settings: &Settings,
    command: EnvCommands,
    formatter: &OutputFormatter,
) -> Result<String> {
    let deployer = create_deployer(settings).await;

    match command {
        EnvCommands::Deploy => {
            let environment = deployer.deploy_environment().await?;
            Ok(formatter.format_environment("deployed", &environment))
        }
        EnvCommands::Show => {
            let environment = deployer.show_environment().await?;
            Ok(formatter.format_environment("found", &environment))
        }
        EnvCommands::Delete => {
            let environment = deployer.delete_environment().await?;
            Ok(formatter.format_environment("deleted", &environment))
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Creates the deployer over the AWS SDK client.
async fn create_deployer(settings: &Settings) -> ApplicationDeployer<AwsCloudFormationClient> {
    debug!("Resolving AWS configuration");
    let client = AwsCloudFormationClient::new(settings.region.as_deref()).await;
    deployer(settings, client)
}

/// Creates a deployer that never resolves AWS configuration, for dry runs.
fn offline_deployer(settings: &Settings) -> ApplicationDeployer<AwsCloudFormationClient> {
    deployer(settings, AwsCloudFormationClient::unconfigured())
}

fn deployer(
    settings: &Settings,
    client: AwsCloudFormationClient,
) -> ApplicationDeployer<AwsCloudFormationClient> {
    let cloudformation = CloudFormation::new(client)
        .with_waiter(settings.waiter())
        .with_dry_run_dir(&settings.dry_run_dir);
    ApplicationDeployer::new(cloudformation)
}
