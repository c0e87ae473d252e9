//! branch-planner - plan-only shadow Terraform objects for pull request branches

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use kube::{Client, ResourceExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use planner_common::duration::parse_duration;
use planner_common::telemetry::{init_telemetry, TelemetryConfig};
use planner_common::{Error, LabelSet, ObjectKey, LABEL_PRIMARY_RESOURCE_KEY, LABEL_PR_ID_KEY};
use planner_shadow::{KubeStore, Planner, PlannerConfig, DEFAULT_INTERVAL};

/// Branch planner - mirror Terraform objects onto a branch as plan-only shadows
#[derive(Parser, Debug)]
#[command(name = "branch-planner", version, about, long_about = None)]
struct Cli {
    /// Reject sourceRefs that point outside the Terraform's namespace
    #[arg(long, global = true, env = "NO_CROSS_NAMESPACE_REFS")]
    no_cross_namespace_refs: bool,

    /// Emit JSON log lines
    #[arg(long, global = true, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create or update the shadow pair of a Terraform for a branch
    Reconcile(ReconcileArgs),

    /// Delete a shadow Terraform and its shadow source
    Delete(DeleteArgs),

    /// List shadow Terraforms (or their sources) in a namespace
    List(ListArgs),
}

#[derive(Args, Debug)]
struct ReconcileArgs {
    /// Namespace of the primary Terraform
    #[arg(short, long)]
    namespace: String,

    /// Name of the primary Terraform
    #[arg(long)]
    name: String,

    /// Branch the shadow source should track
    #[arg(long)]
    branch: String,

    /// Change request identifier (e.g., the pull request number)
    #[arg(long)]
    change_id: String,

    /// Polling interval of the shadow source (e.g., 5m, 1m30s)
    #[arg(long, value_parser = parse_duration)]
    interval: Option<Duration>,
}

#[derive(Args, Debug)]
struct DeleteArgs {
    /// Namespace of the shadow Terraform
    #[arg(short, long)]
    namespace: String,

    /// Name of the shadow Terraform
    #[arg(long)]
    name: String,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Namespace to list
    #[arg(short, long)]
    namespace: String,

    /// Only shadows of this primary Terraform
    #[arg(long)]
    primary: Option<String>,

    /// Only shadows for this change request
    #[arg(long)]
    change_id: Option<String>,

    /// List shadow GitRepositories instead of Terraforms
    #[arg(long)]
    sources: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: Failed to install aws-lc-rs crypto provider: {:?}", e);
        std::process::exit(1);
    }

    let cli = Cli::parse();

    init_telemetry(TelemetryConfig {
        json: cli.log_json,
        ..Default::default()
    })?;

    let client = Client::try_default()
        .await
        .map_err(Error::from)
        .context("failed to create Kubernetes client")?;
    let planner = Planner::new(
        Arc::new(KubeStore::new(client)),
        PlannerConfig {
            no_cross_namespace_refs: cli.no_cross_namespace_refs,
            default_interval: DEFAULT_INTERVAL,
        },
    );
    info!(
        deny_cross_namespace = planner.policy().denies_cross_namespace(),
        "branch planner ready"
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    match cli.command {
        Commands::Reconcile(args) => run_reconcile(&planner, args, &cancel).await,
        Commands::Delete(args) => run_delete(&planner, args, &cancel).await,
        Commands::List(args) => run_list(&planner, args, &cancel).await,
    }
}

async fn run_reconcile(
    planner: &Planner,
    args: ReconcileArgs,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let key = ObjectKey::new(args.namespace, args.name);
    let primary = planner.get_resource(&key, cancel).await?;
    let primary_source = planner.resolve_source(&primary, cancel).await?;
    let interval = args.interval.unwrap_or(planner.config().default_interval);

    let pair = planner
        .reconcile_resource(
            &primary,
            &primary_source,
            &args.branch,
            &args.change_id,
            interval,
            cancel,
        )
        .await?;

    info!(
        source = %pair.source.object.name_any(),
        terraform = %pair.resource.object.name_any(),
        "shadow pair reconciled"
    );
    println!(
        "gitrepository/{} {}",
        pair.source.object.name_any(),
        pair.source.outcome
    );
    println!(
        "terraform/{} {}",
        pair.resource.object.name_any(),
        pair.resource.outcome
    );
    Ok(())
}

async fn run_delete(
    planner: &Planner,
    args: DeleteArgs,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let key = ObjectKey::new(args.namespace, args.name);
    let shadow = planner.get_resource(&key, cancel).await?;
    planner.delete_shadow_pair(&shadow, cancel).await?;
    println!("terraform/{} deleted", key.name);
    Ok(())
}

async fn run_list(
    planner: &Planner,
    args: ListArgs,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let primary = args.primary.as_deref();
    let change_id = args.change_id.as_deref();

    if args.sources {
        let sources = planner
            .list_shadow_sources(&args.namespace, primary, change_id, cancel)
            .await?;
        for repo in sources {
            println!("{}", list_line(&repo.name_any(), repo.labels()));
        }
    } else {
        let shadows = planner
            .list_shadow_resources(&args.namespace, primary, change_id, cancel)
            .await?;
        for tf in shadows {
            println!("{}", list_line(&tf.name_any(), tf.labels()));
        }
    }
    Ok(())
}

fn list_line(name: &str, labels: &LabelSet) -> String {
    let label = |key: &str| labels.get(key).map(String::as_str).unwrap_or("-").to_string();
    format!(
        "{name}\tprimary={}\tpr={}",
        label(LABEL_PRIMARY_RESOURCE_KEY),
        label(LABEL_PR_ID_KEY)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn reconcile_parses_go_style_interval() {
        let cli = Cli::try_parse_from([
            "branch-planner",
            "--no-cross-namespace-refs",
            "reconcile",
            "-n",
            "team",
            "--name",
            "web",
            "--branch",
            "feature-x",
            "--change-id",
            "42",
            "--interval",
            "5m",
        ])
        .unwrap();

        assert!(cli.no_cross_namespace_refs);
        match cli.command {
            Commands::Reconcile(args) => {
                assert_eq!(args.interval, Some(Duration::from_secs(300)));
                assert_eq!(args.change_id, "42");
            }
            other => panic!("expected reconcile, got {other:?}"),
        }
    }

    #[test]
    fn bad_interval_is_a_usage_error() {
        let result = Cli::try_parse_from([
            "branch-planner",
            "reconcile",
            "-n",
            "team",
            "--name",
            "web",
            "--branch",
            "feature-x",
            "--change-id",
            "42",
            "--interval",
            "soon",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn list_accepts_sources_flag() {
        let cli =
            Cli::try_parse_from(["branch-planner", "list", "-n", "team", "--sources"]).unwrap();
        match cli.command {
            Commands::List(args) => {
                assert!(args.sources);
                assert_eq!(args.primary, None);
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn list_line_shows_lineage() {
        let mut labels = LabelSet::new();
        labels.insert(LABEL_PRIMARY_RESOURCE_KEY.to_string(), "web".to_string());
        labels.insert(LABEL_PR_ID_KEY.to_string(), "42".to_string());
        assert_eq!(
            list_line("web-feature-x-42", &labels),
            "web-feature-x-42\tprimary=web\tpr=42"
        );
        assert_eq!(list_line("web", &LabelSet::new()), "web\tprimary=-\tpr=-");
    }
}
