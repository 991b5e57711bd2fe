mod bootstrap;
mod config;
mod error;
mod git;
mod github;
mod logging;
#[cfg(test)]
mod test_utils;

use bootstrap::{Outcome, SkipReason};
use clap::Parser;
use config::{Backend, Config, Overrides};
use git::repo::GitRepo;
use git::Vcs;
use github::client::GitHubClient;
use github::gh_cli::GhCli;
use std::path::PathBuf;
use tracing::{debug, info, info_span, warn, Instrument};

#[derive(Parser)]
#[command(
    name = "forkstrap",
    about = "Fork the checked-out repository under your GitHub account and repoint remotes"
)]
struct Cli {
    #[arg(long, short, help = "Path inside the git work tree")]
    repo: Option<PathBuf>,

    #[arg(long, help = "Branch to sync from upstream")]
    branch: Option<String>,

    #[arg(long, help = "Hosting domain, e.g. github.com")]
    host: Option<String>,

    #[arg(long, value_enum, help = "How to talk to GitHub")]
    backend: Option<Backend>,

    #[arg(long, help = "Repoint remotes but leave the branch alone")]
    no_sync: bool,
}

impl Cli {
    fn into_overrides(self) -> Overrides {
        Overrides {
            repo_path: self.repo,
            host: self.host,
            branch: self.branch,
            backend: self.backend,
            sync_branch: self.no_sync.then_some(false),
        }
    }
}

// Exits 0 on every outcome; runs as an environment setup hook.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    logging::init();
    let cli = Cli::parse();
    run(cli).instrument(info_span!("forkstrap")).await;
}

async fn run(cli: Cli) {
    let config = Config::load(cli.into_overrides());
    debug!(?config, "loaded configuration");

    let mut repo = GitRepo::open(&config.repo_path, config.token().map(String::from));

    let outcome = match config.backend {
        Backend::Gh => {
            let mut gh = GhCli::new(&config.gh_path, &config.host);
            bootstrap::run(&mut repo, &mut gh, &config).await
        }
        Backend::Api => match GitHubClient::new(&config.host) {
            Ok(mut client) => bootstrap::run(&mut repo, &mut client, &config).await,
            Err(e) => {
                warn!("warning: cannot build GitHub API client: {e}");
                Outcome::Skipped(SkipReason::HostClientMissing)
            }
        },
    };

    report(&outcome, &repo);
}

fn report(outcome: &Outcome, repo: &impl Vcs) {
    match outcome {
        Outcome::Aborted(_) => warn!("warning: {outcome}"),
        _ => info!("{outcome}"),
    }

    if outcome.remotes_changed() {
        dump_remotes(repo);
    }
}

fn dump_remotes(repo: &impl Vcs) {
    match repo.remotes() {
        Ok(remotes) => {
            for remote in remotes {
                info!("{remote}");
            }
        }
        Err(e) => warn!("warning: listing remotes failed: {e}"),
    }
}
