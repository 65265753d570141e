use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use prompt_deploy_core::generation::GenerationClient;
use prompt_deploy_core::pipeline::{BatchReport, Layout, Pipeline};
use prompt_deploy_core::uploader::{ObjectStoreUploader, Target};

use crate::account::AwsAccount;
use crate::aws::load_sdk_config;
use crate::bedrock::BedrockRuntime;
use crate::check::{self, CheckReport};
use crate::s3::S3Store;

/// Buckets probed by `check` when no `--bucket` is given.
pub const FALLBACK_BUCKET_VARS: [&str; 2] = ["S3_BUCKET_BETA", "S3_BUCKET_PROD"];

/// CLI for prompt-deploy: render prompt templates, generate with Bedrock, publish to S3.
#[derive(Parser)]
#[clap(
    name = "prompt-deploy",
    version,
    about = "Render prompt templates, generate content with Amazon Bedrock and publish it to S3"
)]
pub struct Cli {
    /// Also append plain-text logs to this file
    #[clap(long, global = true, env = "PROMPT_DEPLOY_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// AWS region for Bedrock and S3
    #[clap(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Destination S3 bucket
    #[clap(long, env = "S3_BUCKET")]
    pub bucket: Option<String>,

    /// Key prefix inside the bucket
    #[clap(long, env = "S3_PREFIX", default_value = "beta/")]
    pub prefix: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process prompt configuration files and upload the generated outputs
    Process {
        /// JSON prompt configuration files under prompts/; relative paths are taken from --workdir
        #[clap(required = true)]
        config_files: Vec<PathBuf>,

        #[clap(flatten)]
        target: TargetArgs,

        /// Directory containing prompts/, prompt_templates/ and outputs/
        #[clap(long, env = "PROMPT_DEPLOY_WORKDIR", default_value = ".")]
        workdir: PathBuf,

        /// Print the batch report as JSON instead of a summary
        #[clap(long)]
        json: bool,
    },
    /// Verify the project layout, AWS credentials, Bedrock access and buckets
    Check {
        #[clap(long, env = "AWS_REGION", default_value = "us-east-1")]
        region: String,

        /// Bucket to probe; repeat for several. Defaults to S3_BUCKET_BETA and S3_BUCKET_PROD
        #[clap(long = "bucket")]
        buckets: Vec<String>,

        #[clap(long, env = "PROMPT_DEPLOY_WORKDIR", default_value = ".")]
        workdir: PathBuf,
    },
}

/// Anchors relative config paths at `workdir`, where the prompts root lives.
pub fn config_paths_in(workdir: &Path, config_files: Vec<PathBuf>) -> Vec<PathBuf> {
    config_files
        .into_iter()
        .map(|path| {
            if path.is_absolute() {
                path
            } else {
                workdir.join(path)
            }
        })
        .collect()
}

/// Human-readable batch summary printed after `process`.
pub fn render_summary(report: &BatchReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Processing summary");
    let _ = writeln!(out, "  succeeded: {}", report.success_count());
    let _ = writeln!(out, "  failed:    {}", report.failure_count());
    if report.success_count() > 0 {
        let _ = writeln!(out, "Generated URLs:");
        for url in report.urls() {
            let _ = writeln!(out, "  {url}");
        }
    }
    if !report.all_succeeded() {
        let _ = writeln!(out, "Failed files:");
        for failure in &report.failed {
            let _ = writeln!(
                out,
                "  {} ({:?}): {}",
                failure.config_path.display(),
                failure.stage,
                failure.error
            );
        }
    }
    out
}

/// Entry point shared by `main` and the integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Process {
            config_files,
            target,
            workdir,
            json,
        } => process(config_files, target, workdir, json).await,
        Commands::Check {
            region,
            buckets,
            workdir,
        } => verify(region, buckets, workdir).await,
    }
}

async fn process(
    config_files: Vec<PathBuf>,
    args: TargetArgs,
    workdir: PathBuf,
    json: bool,
) -> Result<()> {
    let Some(bucket) = args.bucket.as_deref().filter(|b| !b.is_empty()) else {
        bail!("S3 bucket must be specified via --bucket or S3_BUCKET env var");
    };
    // Rejects bad region, bucket or prefix before any AWS client exists.
    let target = Target::new(&args.region, bucket, &args.prefix)?;

    let span = tracing::info_span!(
        "prompt_deploy",
        region = %target.region(),
        bucket = %target.bucket(),
        prefix = %target.prefix()
    );
    let sdk_config = load_sdk_config(target.region()).await;
    let pipeline = Pipeline::new(
        &Layout::rooted_at(&workdir),
        GenerationClient::new(BedrockRuntime::new(&sdk_config)),
        ObjectStoreUploader::new(S3Store::new(&sdk_config), target),
        span,
    );

    let config_files = config_paths_in(&workdir, config_files);
    let report = pipeline.process_batch(&config_files).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_summary(&report));
    }

    if !report.all_succeeded() {
        bail!(
            "{} of {} prompt configurations failed",
            report.failure_count(),
            config_files.len()
        );
    }
    Ok(())
}

async fn verify(region: String, buckets: Vec<String>, workdir: PathBuf) -> Result<()> {
    let mut report = CheckReport::default();
    report
        .outcomes
        .extend(check::project_structure(&Layout::rooted_at(&workdir)));

    let buckets = if buckets.is_empty() {
        let mut found = Vec::new();
        for var in FALLBACK_BUCKET_VARS {
            match std::env::var(var) {
                Ok(bucket) if !bucket.is_empty() => found.push(bucket),
                _ => report.skipped.push(format!("{var} not set")),
            }
        }
        found
    } else {
        buckets
    };

    let sdk_config = load_sdk_config(&region).await;
    report.outcomes.push(check::credentials(&sdk_config).await);
    let account = AwsAccount::new(&sdk_config);
    report.outcomes.push(check::identity(&account).await);
    report.outcomes.push(check::bedrock_models(&account).await);
    report.outcomes.push(
        check::model_runtime(&GenerationClient::new(BedrockRuntime::new(&sdk_config))).await,
    );

    let store = S3Store::new(&sdk_config);
    for bucket in &buckets {
        report.outcomes.extend(store.probe_bucket(bucket).await);
    }

    print!("{}", report.render());
    if !report.passed() {
        bail!("setup verification failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prompt_deploy_core::pipeline::{ProcessingResult, RecordFailure, Stage, Status};
    use prompt_deploy_core::PipelineError;

    #[test]
    fn cli_parses_process_with_defaults() {
        let cli = Cli::try_parse_from([
            "prompt-deploy",
            "process",
            "prompts/a.json",
            "prompts/b.json",
            "--bucket",
            "my-bucket",
        ])
        .unwrap();
        match cli.command {
            Commands::Process {
                config_files,
                target,
                json,
                ..
            } => {
                assert_eq!(config_files.len(), 2);
                assert_eq!(target.bucket.as_deref(), Some("my-bucket"));
                assert!(!json);
            }
            _ => panic!("expected process"),
        }
    }

    #[test]
    fn process_requires_a_config_file() {
        assert!(Cli::try_parse_from(["prompt-deploy", "process", "--bucket", "b"]).is_err());
    }

    #[test]
    fn check_accepts_repeated_buckets() {
        let cli = Cli::try_parse_from([
            "prompt-deploy",
            "check",
            "--bucket",
            "beta-bucket",
            "--bucket",
            "prod-bucket",
        ])
        .unwrap();
        match cli.command {
            Commands::Check { buckets, .. } => assert_eq!(buckets, ["beta-bucket", "prod-bucket"]),
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn relative_config_paths_follow_workdir() {
        let paths = config_paths_in(
            Path::new("/srv/repo"),
            vec![PathBuf::from("prompts/a.json"), PathBuf::from("/abs/prompts/b.json")],
        );
        assert_eq!(
            paths,
            [
                PathBuf::from("/srv/repo/prompts/a.json"),
                PathBuf::from("/abs/prompts/b.json")
            ]
        );

        let paths = config_paths_in(Path::new("."), vec![PathBuf::from("prompts/a.json")]);
        assert_eq!(paths, [PathBuf::from("./prompts/a.json")]);
    }

    #[test]
    fn summary_lists_urls_and_failed_files() {
        let report = BatchReport {
            succeeded: vec![ProcessingResult {
                config_path: PathBuf::from("prompts/ok.json"),
                output_path: PathBuf::from("outputs/ok.html"),
                remote_key: "beta/outputs/ok.html".into(),
                remote_url: "https://b.s3.us-east-1.amazonaws.com/beta/outputs/ok.html".into(),
                content_sha256: "00".into(),
                status: Status::Success,
            }],
            failed: vec![RecordFailure {
                config_path: PathBuf::from("prompts/bad.json"),
                stage: Stage::Render,
                error: PipelineError::MissingVariable("company".into()),
            }],
        };

        let summary = render_summary(&report);
        assert!(summary.contains("succeeded: 1"));
        assert!(summary.contains("failed:    1"));
        assert!(summary.contains("https://b.s3.us-east-1.amazonaws.com/beta/outputs/ok.html"));
        assert!(summary.contains("prompts/bad.json (Render): missing required variable: company"));
    }
}
