//! Administrative CLI for the workflow archive.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wfarchive_core::config::AppConfig;
use wfarchive_core::{StaticInstanceId, Workflow, selector};
use wfarchive_store::{WorkflowArchive, WorkflowFilter};

const ENV_PREFIX: &str = "WFARCHIVE_";

#[derive(Parser)]
#[command(name = "wfarchivectl")]
#[command(about = "Administrative CLI for the workflow archive")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "WFARCHIVE_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive a workflow read from a JSON file ("-" for stdin)
    Archive { file: PathBuf },
    /// List archived workflows, most recently started first
    List {
        #[command(flatten)]
        filter: FilterArgs,
        /// Maximum number of workflows (0 for all)
        #[arg(long, default_value_t = 0)]
        limit: u32,
        /// Number of workflows to skip (ignored when limit is 0)
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Count archived workflows
    Count {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Show one archived workflow by uid, or by namespace and name
    Get {
        #[arg(long, default_value = "")]
        uid: String,
        #[arg(long, short, default_value = "")]
        namespace: String,
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Delete an archived workflow
    Delete { uid: String },
    /// Delete workflows that finished longer ago than the TTL
    Sweep {
        /// Retention period in seconds
        #[arg(long)]
        ttl_secs: u64,
    },
    /// List label keys in use
    LabelKeys,
    /// List the values of one label key
    LabelValues { key: String },
}

#[derive(Args, Clone, Debug, Default)]
struct FilterArgs {
    /// Only workflows in this namespace
    #[arg(long, short, default_value = "")]
    namespace: String,
    /// Only workflows with exactly this name
    #[arg(long, default_value = "")]
    name: String,
    /// Only workflows whose name starts with this prefix
    #[arg(long, default_value = "")]
    name_prefix: String,
    /// Label selector, e.g. "env=prod,team in (a,b),!canary"
    #[arg(long, short = 'l')]
    selector: Option<String>,
    /// Only workflows started after this RFC 3339 time
    #[arg(long, value_parser = parse_timestamp)]
    min_started_at: Option<OffsetDateTime>,
    /// Only workflows started before this RFC 3339 time
    #[arg(long, value_parser = parse_timestamp)]
    max_started_at: Option<OffsetDateTime>,
}

impl FilterArgs {
    fn to_filter(&self) -> Result<WorkflowFilter> {
        let mut filter = WorkflowFilter::new()
            .namespace(&self.namespace)
            .name(&self.name)
            .name_prefix(&self.name_prefix);
        if let Some(at) = self.min_started_at {
            filter = filter.started_after(at);
        }
        if let Some(at) = self.max_started_at {
            filter = filter.started_before(at);
        }
        if let Some(text) = &self.selector {
            let requirements = selector::parse(text)
                .with_context(|| format!("invalid label selector {text:?}"))?;
            filter = filter.labels(requirements);
        }
        Ok(filter)
    }
}

fn parse_timestamp(value: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|e| format!("expected RFC 3339 time: {e}"))
}

/// Configuration from an optional TOML file overlaid with WFARCHIVE_ variables.
fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("config file {} does not exist", path.display());
        }
        tracing::debug!(config_path = %path.display(), "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    }

    figment
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["CONFIG"]).split("__"))
        .extract()
        .context("failed to load configuration")
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{text}");
    Ok(())
}

async fn read_workflow(file: &Path) -> Result<Workflow> {
    let bytes = if file == Path::new("-") {
        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut tokio::io::stdin(), &mut buf)
            .await
            .context("failed to read workflow from stdin")?;
        buf
    } else {
        tokio::fs::read(file)
            .await
            .with_context(|| format!("failed to read {}", file.display()))?
    };
    serde_json::from_slice(&bytes).context("workflow is not valid JSON")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine readable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Cli { config, command } = Cli::parse();
    let config = load_config(config.as_deref())?;

    let archive = wfarchive_store::from_config(
        &config,
        Arc::new(StaticInstanceId::new(config.instance_id.clone())),
    )
    .await
    .context("failed to initialize workflow archive")?;

    run(command, archive.as_ref()).await
}

async fn run(command: Commands, archive: &dyn WorkflowArchive) -> Result<()> {
    match command {
        Commands::Archive { file } => {
            let workflow = read_workflow(&file).await?;
            archive
                .archive_workflow(&workflow)
                .await
                .context("failed to archive workflow")?;
            print_json(&serde_json::json!({ "archived": workflow.uid() }))
        }
        Commands::List {
            filter,
            limit,
            offset,
        } => {
            let workflows = archive
                .list_workflows(&filter.to_filter()?, limit, offset)
                .await
                .context("failed to list archived workflows")?;
            print_json(&workflows)
        }
        Commands::Count { filter } => {
            let count = archive
                .count_workflows(&filter.to_filter()?)
                .await
                .context("failed to count archived workflows")?;
            print_json(&serde_json::json!({ "count": count }))
        }
        Commands::Get {
            uid,
            namespace,
            name,
        } => {
            let workflow = archive
                .get_workflow(&uid, &namespace, &name)
                .await
                .context("failed to get archived workflow")?
                .context("archived workflow not found")?;
            print_json(&workflow)
        }
        Commands::Delete { uid } => {
            let deleted = archive
                .delete_workflow(&uid)
                .await
                .with_context(|| format!("failed to delete archived workflow {uid}"))?;
            print_json(&serde_json::json!({ "deleted": deleted }))
        }
        Commands::Sweep { ttl_secs } => {
            let deleted = archive
                .delete_expired_workflows(Duration::from_secs(ttl_secs))
                .await
                .context("failed to delete expired workflows")?;
            print_json(&serde_json::json!({ "deleted": deleted }))
        }
        Commands::LabelKeys => {
            let keys = archive
                .list_label_keys()
                .await
                .context("failed to list label keys")?;
            print_json(&keys)
        }
        Commands::LabelValues { key } => {
            let values = archive
                .list_label_values(&key)
                .await
                .with_context(|| format!("failed to list values of label {key}"))?;
            print_json(&values)
        }
    }
}
