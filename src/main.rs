//! MetaKube provider CLI entrypoint.
//!
//! Drives resource operations from model and state files, the way an
//! orchestrator would.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use metakube_provider::cli::{
    Cli, Commands, OutputFormatter, ResourceKind, load_plan, load_state, to_value,
};
use metakube_provider::config::{ConfigParser, ProviderConfig, find_config_file};
use metakube_provider::context::OperationContext;
use metakube_provider::diagnostics::Diagnostics;
use metakube_provider::error::Result;
use metakube_provider::logging::init_logging;
use metakube_provider::resources::{
    ClusterResource, ClusterRoleBindingResource, NodeDeploymentResource, ProjectDataSource,
    Resource, RoleBindingResource, SshKeyResource,
};
use metakube_provider::schema::{
    self, ClusterModel, ClusterRoleBindingModel, NodeDeploymentModel, RoleBindingModel, SshKeyModel,
};
use metakube_provider::validate::{validate_cluster_local, validate_node_deployment_local};

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();
    let formatter = OutputFormatter::new(cli.output);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", formatter.format_diagnostics(&e.to_diagnostics()));
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli, config, &formatter)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}", formatter.format_diagnostics(&e.to_diagnostics()));
            ExitCode::FAILURE
        }
    }
}

/// Loads the provider configuration named on the command line, or the
/// nearest `metakube.yaml`, then applies environment overrides.
fn load_config(cli: &Cli) -> Result<ProviderConfig> {
    let path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => std::env::current_dir().ok().and_then(find_config_file),
    };

    let base = path
        .as_deref()
        .and_then(Path::parent)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let mut config = ConfigParser::new().with_base_path(base).load(path.as_deref())?;

    if cli.verbose {
        config.debug = true;
    }
    Ok(config)
}

/// One resource operation requested on the command line.
enum Action {
    Create(PathBuf),
    Read(PathBuf),
    Update(PathBuf, PathBuf),
    Delete(PathBuf),
    Import(String),
}

/// Main async entry point. Returns false when the operation reported errors.
async fn run(cli: Cli, config: ProviderConfig, formatter: &OutputFormatter) -> Result<bool> {
    let (kind, action) = match cli.command {
        Commands::Validate { kind, file } => return cmd_validate(kind, &file, formatter),
        Commands::Check => return cmd_check(&config, &cli.host_version, formatter).await,
        Commands::Project { name } => {
            return cmd_project(&config, &cli.host_version, &name, formatter).await;
        }
        Commands::Create { kind, file } => (kind, Action::Create(file)),
        Commands::Read { kind, state } => (kind, Action::Read(state)),
        Commands::Update { kind, state, file } => (kind, Action::Update(state, file)),
        Commands::Delete { kind, state } => (kind, Action::Delete(state)),
        Commands::Import { kind, id } => (kind, Action::Import(id)),
    };

    let client = config.client(&cli.host_version)?;
    let ctx = interruptible_context();

    match kind {
        ResourceKind::Cluster => execute(&ClusterResource::new(client), &ctx, action, formatter).await,
        ResourceKind::NodeDeployment => {
            execute(&NodeDeploymentResource::new(client), &ctx, action, formatter).await
        }
        ResourceKind::Sshkey => execute(&SshKeyResource::new(client), &ctx, action, formatter).await,
        ResourceKind::RoleBinding => {
            execute(&RoleBindingResource::new(client), &ctx, action, formatter).await
        }
        ResourceKind::ClusterRoleBinding => {
            execute(&ClusterRoleBindingResource::new(client), &ctx, action, formatter).await
        }
    }
}

/// Creates a context cancelled on Ctrl-C.
fn interruptible_context() -> OperationContext {
    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling the running operation");
            signal.cancel();
        }
    });
    OperationContext::with_cancellation(cancel)
}

/// Runs one operation of resource `R` and prints its outcome.
async fn execute<R: Resource>(
    resource: &R,
    ctx: &OperationContext,
    action: Action,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let schema = resource.schema();
    let response = match action {
        Action::Create(file) => resource.create(ctx, load_plan(schema, &file, None)?).await?,
        Action::Read(state) => resource.read(ctx, load_state(&state)?).await?,
        Action::Update(state, file) => {
            let prior: R::Model = load_state(&state)?;
            let plan = load_plan(schema, &file, Some(&to_value(&prior)?))?;
            resource.update(ctx, prior, plan).await?
        }
        Action::Delete(state) => {
            let diagnostics = resource.delete(ctx, load_state(&state)?).await?;
            println!("{}", formatter.format_diagnostics(&diagnostics));
            info!("{} deleted", schema.type_name);
            return Ok(!diagnostics.has_errors());
        }
        Action::Import(id) => resource.import(ctx, &id).await?,
    };

    println!("{}", formatter.format_response(schema, &response)?);
    Ok(!response.has_errors())
}

/// Validates a model file without calling the API.
fn cmd_validate(kind: ResourceKind, file: &Path, formatter: &OutputFormatter) -> Result<bool> {
    debug!("Validating {kind:?} model {}", file.display());

    let diagnostics = match kind {
        ResourceKind::Cluster => {
            let model: ClusterModel = load_plan(&schema::cluster::SCHEMA, file, None)?;
            validate_cluster_local(&model)
        }
        ResourceKind::NodeDeployment => {
            let model: NodeDeploymentModel = load_plan(&schema::node_deployment::SCHEMA, file, None)?;
            validate_node_deployment_local(&model)
        }
        ResourceKind::Sshkey => {
            load_plan::<SshKeyModel>(&schema::sshkey::SCHEMA, file, None)?;
            Diagnostics::new()
        }
        ResourceKind::RoleBinding => {
            load_plan::<RoleBindingModel>(&schema::bindings::ROLE_BINDING_SCHEMA, file, None)?;
            Diagnostics::new()
        }
        ResourceKind::ClusterRoleBinding => {
            load_plan::<ClusterRoleBindingModel>(&schema::bindings::CLUSTER_ROLE_BINDING_SCHEMA, file, None)?;
            Diagnostics::new()
        }
    };

    println!("{}", formatter.format_diagnostics(&diagnostics));
    Ok(!diagnostics.has_errors())
}

/// Validates the provider configuration and lists visible projects.
async fn cmd_check(config: &ProviderConfig, host_version: &str, formatter: &OutputFormatter) -> Result<bool> {
    let client = config.client(host_version)?;
    let projects = client.list_projects().await?;
    info!("Token can see {} projects", projects.len());

    println!("{}", formatter.format_projects(&projects));
    Ok(true)
}

/// Looks a project up by name.
async fn cmd_project(
    config: &ProviderConfig,
    host_version: &str,
    name: &str,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let source = ProjectDataSource::new(config.client(host_version)?);
    let response = source.read(&OperationContext::new(), name).await?;

    println!("{}", formatter.format_response(&schema::project::SCHEMA, &response)?);
    Ok(!response.has_errors())
}
