//! Stash - restic maintenance jobs for Kubernetes

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{CustomResourceExt, ResourceExt};
use tracing::{debug, info};

use stash_common::config::{
    DEFAULT_BACKOFF_LIMIT, DEFAULT_IMAGE, DEFAULT_POD_VAR_DIR, DEFAULT_PROM_URL,
    DEFAULT_SERVICE_ACCOUNT,
};
use stash_common::crd::{Prune, SecretKeyRef};
use stash_common::telemetry::{init_logging, LogFormat};
use stash_common::{JobKind, OperatorConfig};
use stash_prune::args::job_name;
use stash_prune::mutator::mutate_job;
use stash_prune::retention::ConfigDefaultEnv;
use stash_prune::template::BaseJobBuilder;

/// Stash - declarative restic maintenance jobs
#[derive(Parser, Debug)]
#[command(name = "stash", version, about, long_about = None)]
struct Cli {
    /// Log output format (text or json)
    #[arg(long, env = "STASH_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the Prune CRD manifest
    Crd,

    /// Render the prune Job for a Prune manifest without talking to a cluster
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Path to the Prune YAML manifest
    #[arg(short = 'f', long = "file")]
    file: PathBuf,

    /// Namespace used when the manifest has none
    #[arg(short = 'n', long, default_value = "default")]
    namespace: String,

    #[command(flatten)]
    operator: OperatorArgs,
}

/// Operator configuration flags
#[derive(Args, Debug)]
struct OperatorArgs {
    /// Working directory inside job pods
    #[arg(long, env = "STASH_POD_VAR_DIR", default_value = DEFAULT_POD_VAR_DIR)]
    pod_var_dir: String,

    /// Prometheus push gateway URL
    #[arg(long, env = "STASH_PROM_URL", default_value = DEFAULT_PROM_URL)]
    prom_url: String,

    /// Service account for job pods without one
    #[arg(long, env = "STASH_SERVICE_ACCOUNT", default_value = DEFAULT_SERVICE_ACCOUNT)]
    service_account: String,

    /// Job container image
    #[arg(long, env = "STASH_IMAGE", default_value = DEFAULT_IMAGE)]
    image: String,

    /// Job backoff limit
    #[arg(long, env = "STASH_BACKOFF_LIMIT", default_value_t = DEFAULT_BACKOFF_LIMIT)]
    backoff_limit: i32,

    /// Statistics webhook passed to jobs as STATS_URL
    #[arg(long, env = "STASH_GLOBAL_STATS_URL")]
    global_stats_url: Option<String>,

    /// Endpoint of the cluster-wide default S3 repository
    #[arg(long, env = "STASH_GLOBAL_S3_ENDPOINT")]
    global_s3_endpoint: Option<String>,

    /// Bucket of the cluster-wide default S3 repository
    #[arg(long, env = "STASH_GLOBAL_S3_BUCKET")]
    global_s3_bucket: Option<String>,

    /// Default repository password, as <secret>/<key>
    #[arg(long, env = "STASH_GLOBAL_REPO_PASSWORD", value_parser = parse_secret_ref)]
    global_repo_password: Option<SecretKeyRef>,

    /// Default S3 access key id, as <secret>/<key>
    #[arg(long, env = "STASH_GLOBAL_ACCESS_KEY_ID", value_parser = parse_secret_ref)]
    global_access_key_id: Option<SecretKeyRef>,

    /// Default S3 secret access key, as <secret>/<key>
    #[arg(long, env = "STASH_GLOBAL_SECRET_ACCESS_KEY", value_parser = parse_secret_ref)]
    global_secret_access_key: Option<SecretKeyRef>,
}

impl OperatorArgs {
    fn into_config(self) -> OperatorConfig {
        OperatorConfig {
            pod_var_dir: self.pod_var_dir,
            prom_url: self.prom_url,
            service_account: self.service_account,
            image: self.image,
            backoff_limit: self.backoff_limit,
            global_stats_url: self.global_stats_url,
            global_s3_endpoint: self.global_s3_endpoint,
            global_s3_bucket: self.global_s3_bucket,
            global_repo_password: self.global_repo_password,
            global_access_key_id: self.global_access_key_id,
            global_secret_access_key: self.global_secret_access_key,
            ..Default::default()
        }
    }
}

fn parse_secret_ref(s: &str) -> Result<SecretKeyRef, String> {
    match s.split_once('/') {
        Some((name, key)) if !name.is_empty() && !key.is_empty() => Ok(SecretKeyRef::new(name, key)),
        _ => Err(format!("expected <secret>/<key>, got '{s}'")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format)?;

    match cli.command {
        Commands::Crd => {
            let crd = serde_yaml::to_string(&Prune::crd())
                .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
            println!("{crd}");
            Ok(())
        }
        Commands::Render(args) => run_render(args).await,
    }
}

/// Build the prune Job for a manifest and print it as YAML
async fn run_render(args: RenderArgs) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(&args.file)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read {:?}: {}", args.file, e))?;
    let mut prune: Prune = serde_yaml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse Prune manifest: {}", e))?;
    if prune.namespace().is_none() {
        prune.metadata.namespace = Some(args.namespace.clone());
    }

    let config = Arc::new(args.operator.into_config());
    debug!(?config, "operator configuration");

    let name = job_name(JobKind::Prune, &prune)?;
    let namespace = prune.namespace().unwrap_or_default();
    let mut job = Job {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: Some(namespace.clone()),
            ..Default::default()
        },
        ..Default::default()
    };

    let builder = BaseJobBuilder::new(config.clone());
    let defaults = ConfigDefaultEnv::new(config.clone());
    mutate_job(&mut job, &prune, &config, &builder, &defaults)?;

    info!(job = %name, namespace = %namespace, "rendered prune job");
    println!("{}", serde_yaml::to_string(&job)?);
    Ok(())
}
