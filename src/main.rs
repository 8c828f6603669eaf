use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{error, info, warn};

use mm_tc::configuration::config::{EnvironmentConfig, DEFAULT_OUTPUT_DIR};
use mm_tc::configuration::types::images;
use mm_tc::error_handling::types::OrchestratorError;
use mm_tc::health::{probe_health, RetryPolicy};
use mm_tc::orchestrator::{Orchestrator, StartSummary, UpgradeOutcome};
use mm_tc::runtime::DockerCli;

#[derive(Parser)]
#[command(name = "mm-tc")]
#[command(version = "0.1.0")]
#[command(about = "Disposable Mattermost test environments on Docker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a fresh test environment
    Start {
        /// Three clustered nodes behind a load balancer (needs MM_LICENSE)
        #[arg(long)]
        ha: bool,
        /// Seed the default administrator account
        #[arg(long)]
        admin: bool,
        /// Two servers under /mattermost1 and /mattermost2
        #[arg(long)]
        subpath: bool,
        /// Comma-separated dependencies: openldap, minio, elasticsearch
        #[arg(short = 'D', long = "dependencies", value_name = "LIST")]
        dependencies: Option<String>,
        /// Session output directory
        #[arg(short = 'o', long = "output-dir", default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,
        /// Server image tag
        #[arg(long, default_value = images::MATTERMOST_DEFAULT_TAG)]
        tag: String,
    },
    /// Stop the environment's containers, keeping all session files
    Stop {
        #[arg(short = 'o', long = "output-dir", default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,
    },
    /// Restart the environment's containers and refresh recorded URLs
    Restart {
        #[arg(short = 'o', long = "output-dir", default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,
    },
    /// Move the server container(s) to another image tag
    Upgrade {
        /// Target server image tag
        #[arg(long)]
        tag: String,
        #[arg(short = 'o', long = "output-dir", default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,
    },
    /// Remove the environment's containers and session directory
    Rm {
        #[arg(short = 'o', long = "output-dir", default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,
        /// Confirm the destructive removal
        #[arg(long)]
        yes: bool,
    },
    /// Remove every environment this tool created on the current daemon
    RmAll {
        /// Ignored: environments are discovered through their container labels
        #[arg(short = 'o', long = "output-dir", default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,
        /// Confirm the destructive removal
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format(|buf, record| writeln!(buf, "[tc] {}", record.args()))
        .init();

    let cli = Cli::parse();
    let orchestrator = Orchestrator::new(DockerCli::new());

    if let Err(e) = run(cli.command, &orchestrator).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(
    command: Command,
    orchestrator: &Orchestrator<DockerCli>,
) -> Result<(), OrchestratorError> {
    match command {
        Command::Start {
            ha,
            admin,
            subpath,
            dependencies,
            output_dir,
            tag,
        } => {
            let dependencies = match dependencies {
                Some(list) => EnvironmentConfig::parse_dependencies(&list)?,
                None => Vec::new(),
            };
            let config = EnvironmentConfig {
                ha,
                subpath,
                admin,
                dependencies,
                output_dir,
                tag,
            };
            let summary = orchestrator.start(&config).await?;

            for (label, url) in &summary.servers {
                info!("waiting for {} at {}", label, url);
                probe_health(url, RetryPolicy::default()).await?;
            }

            if let Some(admin) = &summary.admin {
                let policy = RetryPolicy::new(5, Duration::from_secs(2), 2);
                if let Err(e) = orchestrator
                    .seed_admin(&summary.output_dir, admin, policy)
                    .await
                {
                    warn!("admin user was not created: {}", e);
                }
            }

            print!("{}", start_report(&summary));
            Ok(())
        }
        Command::Stop { output_dir } => orchestrator.stop(&output_dir).await,
        Command::Restart { output_dir } => {
            let summary = orchestrator.restart(&output_dir).await?;
            for (label, url) in &summary.servers {
                println!("{}: {}", label, url);
            }
            Ok(())
        }
        Command::Upgrade { tag, output_dir } => {
            let config = EnvironmentConfig {
                tag,
                output_dir: output_dir.clone(),
                ..EnvironmentConfig::default()
            };
            match orchestrator.upgrade(&output_dir, &config).await? {
                UpgradeOutcome::AlreadyRunning => {}
                UpgradeOutcome::Upgraded => println!("Upgraded to tag {}", config.tag),
            }
            Ok(())
        }
        Command::Rm { output_dir, yes } => orchestrator.rm(&output_dir, yes).await,
        Command::RmAll {
            output_dir: _,
            yes,
        } => orchestrator.rm_all(yes).await,
    }
}

fn start_report(summary: &StartSummary) -> String {
    let mut out = String::from("Environment started successfully!\n");
    for (label, url) in &summary.servers {
        out.push_str(&format!("{}: {}\n", label, url));
    }
    out.push_str(&format!(
        "Session files: {}\n",
        summary.output_dir.display()
    ));
    if let Some(admin) = &summary.admin {
        out.push_str(&format!(
            "Admin user: {} / {} ({})\n",
            admin.username, admin.password, admin.email
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use mm_tc::configuration::types::AdminCredentials;

    fn summary(admin: Option<AdminCredentials>) -> StartSummary {
        StartSummary {
            servers: vec![("server".to_string(), "http://localhost:32768".to_string())],
            admin,
            output_dir: PathBuf::from("./mm-tc-session"),
        }
    }

    #[test]
    fn test_start_report_announces_environment_and_admin() {
        let report = start_report(&summary(Some(AdminCredentials::default())));

        assert!(report.starts_with("Environment started successfully!\n"));
        assert!(report.contains("server: http://localhost:32768\n"));
        assert!(report.contains("Session files: ./mm-tc-session\n"));
        assert!(report.contains(
            "Admin user: sysadmin / Sys@dmin-sample1 (sysadmin@sample.mattermost.com)\n"
        ));
    }

    #[test]
    fn test_start_report_omits_admin_line_without_credentials() {
        let report = start_report(&summary(None));

        assert!(report.starts_with("Environment started successfully!\n"));
        assert!(!report.contains("Admin user:"));
    }

    #[test]
    fn test_rm_all_accepts_and_ignores_output_dir() {
        let cli = Cli::try_parse_from(["mm-tc", "rm-all", "--yes", "-o", "elsewhere"])
            .expect("arguments should parse");

        match cli.command {
            Command::RmAll { yes, .. } => assert!(yes),
            _ => panic!("expected the rm-all subcommand"),
        }
    }
}
