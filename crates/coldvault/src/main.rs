//! Coldvault: cold-storage backup lifecycle orchestrator.
//!
//! Two stateless jobs coupled only through a durable state store and a
//! recurring trigger:
//! - `start`: discovers eligible backup images, launches export work, arms
//!   the checker schedule
//! - `check`: polls in-flight work, advances tracked state, and disarms its
//!   own schedule once everything has drained

use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coldvault_aws::{DynamoStateStore, Ec2Gateway, EventBridgeScheduler};
use coldvault_lifecycle::{
    CheckerConfig, Frequency, ScheduleSpec, StarterConfig, run_checker, run_starter,
};
use coldvault_notify::WebhookNotifier;

#[derive(Parser)]
#[command(name = "coldvault")]
#[command(about = "Cold-storage backup lifecycle orchestrator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FrequencyArg {
    Weekly,
    Monthly,
}

impl From<FrequencyArg> for Frequency {
    fn from(value: FrequencyArg) -> Self {
        match value {
            FrequencyArg::Weekly => Frequency::Weekly,
            FrequencyArg::Monthly => Frequency::Monthly,
        }
    }
}

#[derive(Args)]
struct CommonArgs {
    /// Table tracking in-flight image exports
    #[arg(long, env = "COLDVAULT_IMAGES_TABLE")]
    images_table: String,

    /// Table tracking in-flight snapshot copies
    #[arg(long, env = "COLDVAULT_SNAPSHOTS_TABLE")]
    snapshots_table: String,

    /// Name of the checker's recurring schedule
    #[arg(long, env = "COLDVAULT_SCHEDULE_NAME", default_value = "coldvault-checker")]
    schedule_name: String,

    /// Chat-ops webhook failure digests are delivered to
    #[arg(long, env = "COLDVAULT_WEBHOOK_URL")]
    webhook_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover eligible backup images and launch export work
    Start {
        #[command(flatten)]
        common: CommonArgs,

        /// Backup cadence this run selects images for
        #[arg(long, env = "COLDVAULT_FREQUENCY", value_enum)]
        frequency: FrequencyArg,

        /// Destination bucket for image exports
        #[arg(long, env = "COLDVAULT_ARCHIVE_BUCKET")]
        archive_bucket: String,

        /// Rate expression for the checker schedule
        #[arg(long, env = "COLDVAULT_CHECKER_RATE", default_value = "rate(1 hour)")]
        checker_rate: String,

        /// Invocation target the checker schedule fires
        #[arg(long, env = "COLDVAULT_CHECKER_TARGET_ARN")]
        checker_target_arn: String,

        /// Role the scheduler assumes to fire the target
        #[arg(long, env = "COLDVAULT_CHECKER_ROLE_ARN")]
        checker_role_arn: String,
    },

    /// Poll in-flight export work and advance tracked state
    Check {
        #[command(flatten)]
        common: CommonArgs,
    },
}

struct Collaborators {
    gateway: Ec2Gateway,
    store: DynamoStateStore,
    scheduler: EventBridgeScheduler,
    notifier: WebhookNotifier,
}

async fn collaborators(common: &CommonArgs) -> Result<Collaborators> {
    let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let region = aws
        .region()
        .map(|region| region.to_string())
        .ok_or_else(|| miette::miette!("no AWS region configured"))?;

    Ok(Collaborators {
        gateway: Ec2Gateway::new(aws_sdk_ec2::Client::new(&aws), region),
        store: DynamoStateStore::new(
            aws_sdk_dynamodb::Client::new(&aws),
            common.images_table.clone(),
            common.snapshots_table.clone(),
        ),
        scheduler: EventBridgeScheduler::new(aws_sdk_scheduler::Client::new(&aws)),
        notifier: WebhookNotifier::new(common.webhook_url.clone()),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "coldvault=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            common,
            frequency,
            archive_bucket,
            checker_rate,
            checker_target_arn,
            checker_role_arn,
        } => {
            let services = collaborators(&common).await?;
            let config = StarterConfig {
                frequency: frequency.into(),
                archive_bucket,
                checker_schedule: ScheduleSpec {
                    name: common.schedule_name.clone(),
                    expression: checker_rate,
                    target_arn: checker_target_arn,
                    role_arn: checker_role_arn,
                },
            };
            let report = run_starter(
                &config,
                &services.gateway,
                &services.store,
                &services.scheduler,
                &services.notifier,
            )
            .await
            .map_err(|e| miette::miette!("{e}"))?;
            tracing::info!(?report, "starter finished");
        }

        Commands::Check { common } => {
            let services = collaborators(&common).await?;
            let config = CheckerConfig {
                schedule_name: common.schedule_name.clone(),
            };
            let report = run_checker(
                &config,
                &services.gateway,
                &services.store,
                &services.scheduler,
                &services.notifier,
            )
            .await
            .map_err(|e| miette::miette!("{e}"))?;
            tracing::info!(?report, "checker finished");
        }
    }

    Ok(())
}
