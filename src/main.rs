mod collectors;
mod config;
mod evaluate;
mod notify;

use clap::Parser;
use collectors::system::HostCollector;
use collectors::{collect, Collector, FailureMode, MetricError};
use config::{Config, ConfigError};
use evaluate::{evaluate, Thresholds};
use notify::{dispatch, ConsoleNotifier, Notifier, NotifyError, Outcome, SmtpNotifier};
use thiserror::Error;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hostwatch")]
#[command(version)]
#[command(about = "One-shot host health check that emails an alert when a threshold is breached")]
struct Cli {
    #[arg(long, default_value = "./config.json")]
    config: String,
    #[arg(long)]
    print_default_config: bool,
    /// Print the alert email instead of sending it.
    #[arg(long)]
    dry_run: bool,
    /// Report metrics that fail to collect as alerts instead of aborting.
    #[arg(long)]
    keep_going: bool,
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Collect(#[from] MetricError),
    #[error("could not send alert email: {0}")]
    Notify(#[from] NotifyError),
}

impl AppError {
    fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) => 1,
            AppError::Collect(_) => 2,
            AppError::Notify(_) => 3,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_json());
        return;
    }

    match run(&cli).await {
        Ok(Outcome::AllSafe) => info!("all metrics within safe range"),
        Ok(Outcome::Notified { alerts }) => info!(alerts, "alert dispatched"),
        Err(err) => {
            error!(error = %err, "health check aborted");
            std::process::exit(err.exit_code());
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: &Cli) -> Result<Outcome, AppError> {
    let cfg = Config::load_from_file(&cli.config)?;
    info!(config = %cli.config, smtp_host = %cfg.smtp_host, "configuration loaded");

    // Everything that can be rejected up front is built before the first reading.
    let mut collector = HostCollector::new(&cfg.collect)?;
    let notifier: Box<dyn Notifier> = if cli.dry_run {
        Box::new(ConsoleNotifier)
    } else {
        Box::new(SmtpNotifier::from_config(&cfg)?)
    };
    let mode = if cli.keep_going {
        FailureMode::KeepGoing
    } else {
        FailureMode::FailFast
    };

    check(&mut collector, &Thresholds::default(), notifier.as_ref(), mode).await
}

/// Collect, evaluate, notify. Safe readings go to stdout as they are judged.
async fn check<C, N>(
    collector: &mut C,
    thresholds: &Thresholds,
    notifier: &N,
    mode: FailureMode,
) -> Result<Outcome, AppError>
where
    C: Collector + ?Sized,
    N: Notifier + ?Sized,
{
    let readings = collect(collector, mode).await?;
    let evaluation = evaluate(&readings, thresholds);
    for line in evaluation.safe_lines() {
        println!("{line}");
    }

    let report = evaluation.report();
    if !report.is_empty() {
        info!(alerts = report.len(), "thresholds breached");
        for line in report.lines() {
            debug!(%line, "alert");
        }
    }
    Ok(dispatch(report, notifier).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::testing::FakeCollector;
    use crate::collectors::Metric;
    use crate::notify::testing::{BrokenNotifier, RecordingNotifier};

    #[tokio::test]
    async fn healthy_host_sends_nothing() {
        let mut fake = FakeCollector::healthy();
        let notifier = RecordingNotifier::default();
        let outcome = check(
            &mut fake,
            &Thresholds::default(),
            &notifier,
            FailureMode::FailFast,
        )
        .await
        .expect("check");

        assert_eq!(outcome, Outcome::AllSafe);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn breaches_are_sent_in_one_email() {
        let mut fake = FakeCollector::healthy();
        fake.cpu_usage = vec![95.0, 10.0, 81.0];
        fake.memory_usage = 85.0;
        let notifier = RecordingNotifier::default();
        let outcome = check(
            &mut fake,
            &Thresholds::default(),
            &notifier,
            FailureMode::FailFast,
        )
        .await
        .expect("check");

        assert_eq!(outcome, Outcome::Notified { alerts: 3 });
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].1,
            "Alert: CPU Core 0 usage is above 80%: 95.00%\n\
             Alert: CPU Core 2 usage is above 80%: 81.00%\n\
             Alert: Memory usage is above 80%: 85.00%\n"
        );
    }

    #[tokio::test]
    async fn collection_failure_aborts_without_email() {
        let mut fake = FakeCollector::healthy().failing(Metric::Temperature);
        fake.memory_usage = 99.0;
        let notifier = RecordingNotifier::default();
        let err = check(
            &mut fake,
            &Thresholds::default(),
            &notifier,
            FailureMode::FailFast,
        )
        .await
        .unwrap_err();

        assert_eq!(err.exit_code(), 2);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn keep_going_reports_the_failure() {
        let mut fake = FakeCollector::healthy().failing(Metric::Temperature);
        let notifier = RecordingNotifier::default();
        let outcome = check(
            &mut fake,
            &Thresholds::default(),
            &notifier,
            FailureMode::KeepGoing,
        )
        .await
        .expect("check");

        assert_eq!(outcome, Outcome::Notified { alerts: 1 });
        let sent = notifier.sent();
        assert!(sent[0]
            .1
            .starts_with("Alert: CPU temperature could not be collected:"));
    }

    #[tokio::test]
    async fn notify_failure_maps_to_its_exit_code() {
        let mut fake = FakeCollector::healthy();
        fake.disk_usage = 75.0;
        let err = check(
            &mut fake,
            &Thresholds::default(),
            &BrokenNotifier,
            FailureMode::FailFast,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Notify(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn missing_config_is_fatal_before_collection() {
        let cli = Cli {
            config: "/definitely/not/here/config.json".to_string(),
            print_default_config: false,
            dry_run: true,
            keep_going: false,
        };
        let err = run(&cli).await.unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn bad_smtp_port_is_a_config_error() {
        let mut file = tempfile::Builder::new()
            .suffix(".json")
            .tempfile()
            .expect("tempfile");
        std::io::Write::write_all(
            &mut file,
            br#"{
                "smtp_host": "smtp.example.com",
                "smtp_port": "seventy",
                "from_email": "monitor@example.com",
                "email_password": "secret",
                "to_email": "ops@example.com"
            }"#,
        )
        .expect("write");

        let cli = Cli {
            config: file.path().display().to_string(),
            print_default_config: false,
            dry_run: false,
            keep_going: false,
        };
        let err = run(&cli).await.unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::Validation(_))));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "hostwatch",
            "--config",
            "/etc/hostwatch.yaml",
            "--dry-run",
        ])
        .expect("parse");
        assert_eq!(cli.config, "/etc/hostwatch.yaml");
        assert!(cli.dry_run);
        assert!(!cli.keep_going);
    }
}
