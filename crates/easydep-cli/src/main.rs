use std::process::Command;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use easydep_auth::GithubAppCredentials;
use easydep_config::AgentConfig;
use easydep_core::{
    forward_chain, rollback_chain, GithubReleaseSource, LockFile, PathLayout, ReleaseFeed,
    ReleaseSource, ReleaseSupervisor, RepoFetcher,
};

#[derive(Parser, Debug)]
#[command(name = "easydep", version)]
#[command(about = "Polls a GitHub repo's releases and deploys accepted tags to a local filesystem layout")]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the long-lived deployment agent. Default if no subcommand is given.
    Run,
    /// Print the resolved configuration and basic diagnostics, then exit.
    Doctor,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Arc::new(AgentConfig::from_env().context("invalid easydep configuration")?);
    init_tracing(&config.log_level);

    match cli.cmd.unwrap_or(Commands::Run) {
        Commands::Run => run(config),
        Commands::Doctor => run_doctor(&config),
    }
}

fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(config: Arc<AgentConfig>) -> Result<()> {
    let layout = PathLayout::new(
        config.deploy_base_directory.clone(),
        config.deploy_link_directory.clone(),
    )
    .context("failed to build deployment path layout")?;
    layout
        .create_if_missing()
        .context("failed to create deployment root")?;

    let _lock = LockFile::acquire(&layout.lock_file())
        .context("another easydep agent instance holds the deployment lock")?;

    let credentials = Arc::new(GithubAppCredentials::new(
        config.github_app_id.clone(),
        config.github_app_private_key.clone(),
    ));
    let fetcher: Arc<dyn RepoFetcher> = credentials.clone();
    let source: Arc<dyn ReleaseSource> = Arc::new(GithubReleaseSource::new(
        credentials,
        config.github_repo_org.clone(),
        config.github_repo_name.clone(),
    ));

    let forward = forward_chain(&config, &layout, fetcher);
    let rollback = rollback_chain(&config, &layout);
    let supervisor = Arc::new(ReleaseSupervisor::new(layout.clone(), forward, rollback));

    let feed = ReleaseFeed::new(source, Arc::clone(&supervisor), config.release_pull_delay);
    let shutdown = feed.shutdown_flag();

    ctrlc::set_handler(move || {
        tracing::info!("shutdown signal received, stopping after the current poll tick");
        shutdown.store(true, Ordering::SeqCst);
    })
    .context("failed to install SIGINT/SIGTERM handler")?;

    if let Some(bind) = config.status_bind.clone() {
        let supervisor = Arc::clone(&supervisor);
        let started_at = Instant::now();
        std::thread::spawn(move || run_status_server(&bind, supervisor, started_at));
    }

    tracing::info!(
        root = %layout.root().display(),
        repo = %format!("{}/{}", config.github_repo_org, config.github_repo_name),
        "easydep agent starting"
    );
    feed.run();
    tracing::info!("easydep agent stopped");

    Ok(())
}

/// Read-only status endpoint: never has a control-plane side, per the
/// agent's single-instance-per-root safety model. A bind failure is
/// logged rather than fatal, since the agent itself still works without it.
fn run_status_server(bind: &str, supervisor: Arc<ReleaseSupervisor>, started_at: Instant) {
    let server = match tiny_http::Server::http(bind) {
        Ok(server) => server,
        Err(err) => {
            tracing::warn!(%err, bind, "failed to bind status endpoint, continuing without it");
            return;
        }
    };

    tracing::info!(bind, "status endpoint listening");

    for request in server.incoming_requests() {
        let body = serde_json::json!({
            "current_release_id": supervisor.current_release_id(),
            "uptime_secs": started_at.elapsed().as_secs(),
        })
        .to_string();
        let response = tiny_http::Response::from_string(body)
            .with_header(tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap());
        let _ = request.respond(response);
    }
}

fn run_doctor(config: &AgentConfig) -> Result<()> {
    println!("deploy_base_directory: {}", config.deploy_base_directory.display());
    println!("deploy_link_directory: {}", config.deploy_link_directory);
    println!("github_repo: {}/{}", config.github_repo_org, config.github_repo_name);
    println!(
        "max_stored_releases: {}",
        config
            .max_stored_releases
            .map(|n| n.to_string())
            .unwrap_or_else(|| "disabled".to_string())
    );
    println!("log_level: {}", config.log_level);
    println!(
        "status_bind: {}",
        config.status_bind.as_deref().unwrap_or("disabled")
    );
    println!();

    let key_parses = jsonwebtoken::EncodingKey::from_rsa_pem(config.github_app_private_key.as_bytes()).is_ok();
    println!("github_app_private_key parses as RSA PEM: {key_parses}");

    print_cmd_version("git");
    print_cmd_version("bash");

    Ok(())
}

fn print_cmd_version(cmd: &str) {
    match Command::new(cmd).arg("--version").output() {
        Ok(out) if out.status.success() => {
            let s = String::from_utf8_lossy(&out.stdout).trim().to_string();
            println!("{cmd}: {s}");
        }
        Ok(out) => {
            eprintln!(
                "[warn] {cmd} --version failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        Err(err) => {
            eprintln!("[warn] unable to run {cmd} --version: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_cmd_version_reports_missing_command() {
        print_cmd_version("definitely-not-a-real-command-easydep");
    }

    #[test]
    fn doctor_reports_invalid_pem_without_erroring() {
        let raw = easydep_config::RawEnv {
            github_app_id: Some("1".to_string()),
            github_app_private_key: Some("not-a-pem".to_string()),
            github_repo_org: Some("acme".to_string()),
            github_repo_name: Some("widgets".to_string()),
            deploy_base_directory: Some("/srv/deploys".to_string()),
            ..Default::default()
        };
        let config = AgentConfig::from_raw(raw).expect("valid config");
        run_doctor(&config).expect("doctor should not fail on a bad key, just report it");
    }
}
