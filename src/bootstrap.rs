//! One-shot fork bootstrap.
//!
//! Detects a checkout of somebody else's repository, forks it under the
//! authenticated user, points `origin` at the fork and `upstream` at the
//! original, then force-syncs the fork's branch with upstream. Every stopping
//! point is reported as an [`Outcome`]; none of them is a process failure.

use crate::config::Config;
use crate::error::{ForkstrapError, Result};
use crate::git::url::RepoSlug;
use crate::git::Vcs;
use crate::github::HostingApi;
use std::fmt;
use tracing::{debug, info, warn};

pub const ORIGIN: &str = "origin";
pub const UPSTREAM: &str = "upstream";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Completed { upstream: RepoSlug, fork: RepoSlug },
    Skipped(SkipReason),
    Aborted(AbortReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    NotAWorkTree,
    HostClientMissing,
    AlreadyForked,
    AlreadySwitched,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AbortReason {
    MissingOrigin,
    UnrecognizedOrigin(String),
    ForkFailed(String),
    ForkOwnerUnknown,
    RemoteUpdateFailed(String),
    SyncFailed { step: SyncStep, message: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStep {
    Fetch,
    Checkout,
    Reset,
    Push,
}

impl Outcome {
    /// True once `origin` and `upstream` have been repointed, whether or not
    /// the branch sync that follows succeeded.
    pub fn remotes_changed(&self) -> bool {
        matches!(
            self,
            Outcome::Completed { .. } | Outcome::Aborted(AbortReason::SyncFailed { .. })
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Completed { upstream, fork } => {
                write!(f, "done: {ORIGIN} -> {fork}, {UPSTREAM} -> {upstream}")
            }
            Outcome::Skipped(reason) => write!(f, "nothing to do: {reason}"),
            Outcome::Aborted(reason) => write!(f, "stopped: {reason}"),
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            SkipReason::NotAWorkTree => "not inside a git work tree",
            SkipReason::HostClientMissing => "GitHub client not available",
            SkipReason::AlreadyForked => "origin already points at your repository",
            SkipReason::AlreadySwitched => "remotes were already switched",
        };
        f.write_str(msg)
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::MissingOrigin => write!(f, "no {ORIGIN} remote"),
            AbortReason::UnrecognizedOrigin(url) => write!(f, "unrecognised {ORIGIN} URL {url}"),
            AbortReason::ForkFailed(msg) => write!(f, "fork creation failed: {msg}"),
            AbortReason::ForkOwnerUnknown => write!(f, "could not tell who owns the fork"),
            AbortReason::RemoteUpdateFailed(msg) => write!(f, "updating remotes failed: {msg}"),
            AbortReason::SyncFailed { step, message } => {
                write!(f, "branch sync failed at {step}: {message}")
            }
        }
    }
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStep::Fetch => "fetch",
            SyncStep::Checkout => "checkout",
            SyncStep::Reset => "reset",
            SyncStep::Push => "push",
        };
        f.write_str(name)
    }
}

pub async fn run<V: Vcs, H: HostingApi>(vcs: &mut V, host: &mut H, config: &Config) -> Outcome {
    if !vcs.is_work_tree() {
        return Outcome::Skipped(SkipReason::NotAWorkTree);
    }
    if !host.is_available().await {
        return Outcome::Skipped(SkipReason::HostClientMissing);
    }

    authenticate(host, config).await;

    let origin_url = match vcs.remote_url(ORIGIN) {
        Ok(Some(url)) => url,
        Ok(None) => return Outcome::Aborted(AbortReason::MissingOrigin),
        Err(e) => {
            warn!("warning: reading {ORIGIN} failed: {e}");
            return Outcome::Aborted(AbortReason::MissingOrigin);
        }
    };
    let Some(upstream) = RepoSlug::parse(&origin_url, &config.host) else {
        return Outcome::Aborted(AbortReason::UnrecognizedOrigin(origin_url));
    };
    info!("{ORIGIN} is {upstream}");

    let identity = lookup_identity(host).await;

    if let Some(user) = &identity {
        if upstream.owner.eq_ignore_ascii_case(user) {
            return Outcome::Skipped(SkipReason::AlreadyForked);
        }
    }

    match vcs.remote_url(UPSTREAM) {
        Ok(Some(url)) if references(&url, &upstream, &config.host) => {
            return Outcome::Skipped(SkipReason::AlreadySwitched);
        }
        Ok(_) => {}
        Err(e) => warn!("warning: reading {UPSTREAM} failed: {e}"),
    }

    let fork_exists = match &identity {
        Some(user) => {
            let candidate = RepoSlug::new(user, &upstream.repo);
            match host.repo_exists(&candidate).await {
                Ok(exists) => exists,
                Err(e) => {
                    warn!("warning: could not check for {candidate}: {e}");
                    false
                }
            }
        }
        None => false,
    };

    let fork_owner = if fork_exists {
        info!("fork already exists");
        identity
    } else {
        info!("forking {upstream}");
        match host.create_fork(&upstream).await {
            Ok(reported) => identity.or(reported),
            Err(e) => return Outcome::Aborted(AbortReason::ForkFailed(e.to_string())),
        }
    };
    let Some(fork_owner) = fork_owner else {
        return Outcome::Aborted(AbortReason::ForkOwnerUnknown);
    };
    let fork = RepoSlug::new(&fork_owner, &upstream.repo);

    if let Err(e) = repoint_remotes(vcs, &upstream, &fork, &config.host) {
        return Outcome::Aborted(AbortReason::RemoteUpdateFailed(e.to_string()));
    }

    if !config.sync_branch {
        info!("branch sync disabled, leaving {} untouched", config.branch);
    } else if let Err(reason) = sync_branch(vcs, &config.branch) {
        return Outcome::Aborted(reason);
    }

    Outcome::Completed { upstream, fork }
}

async fn authenticate<H: HostingApi>(host: &mut H, config: &Config) {
    if host.is_authenticated().await {
        debug!("already authenticated");
        return;
    }
    match config.token() {
        Some(token) => match host.login_with_token(token).await {
            Ok(()) => info!("authenticated with token from environment"),
            Err(e) => warn!("warning: token login failed, continuing unauthenticated: {e}"),
        },
        None => warn!("warning: not authenticated and no GH_TOKEN or GITHUB_TOKEN set, continuing"),
    }
}

async fn lookup_identity<H: HostingApi>(host: &H) -> Option<String> {
    match host.current_user().await {
        Ok(login) if !login.trim().is_empty() => Some(login.trim().to_string()),
        Ok(_) => {
            warn!("warning: GitHub returned an empty login, continuing without identity");
            None
        }
        Err(e) => {
            warn!("warning: could not determine GitHub user, continuing without identity: {e}");
            None
        }
    }
}

fn references(url: &str, slug: &RepoSlug, host: &str) -> bool {
    match RepoSlug::parse(url, host) {
        Some(parsed) => parsed.same_repo(slug),
        None => slug.mentioned_in(url, host),
    }
}

fn repoint_remotes<V: Vcs>(
    vcs: &mut V,
    upstream: &RepoSlug,
    fork: &RepoSlug,
    host: &str,
) -> Result<()> {
    let upstream_url = upstream.https_url(host);
    let fork_url = fork.https_url(host);

    if vcs.remote_url(UPSTREAM)?.is_none() {
        vcs.rename_remote(ORIGIN, UPSTREAM)?;
        vcs.set_remote_url(UPSTREAM, &upstream_url)?;
        info!("{UPSTREAM} -> {upstream_url}");
    }

    if vcs.remote_url(ORIGIN)?.is_some() {
        vcs.set_remote_url(ORIGIN, &fork_url)?;
    } else {
        vcs.add_remote(ORIGIN, &fork_url)?;
    }
    info!("{ORIGIN} -> {fork_url}");
    Ok(())
}

// Unconditionally overwrites the local and fork branch with upstream.
fn sync_branch<V: Vcs>(vcs: &mut V, branch: &str) -> std::result::Result<(), AbortReason> {
    let tracking = format!("{UPSTREAM}/{branch}");
    let failed = |step: SyncStep| {
        move |e: ForkstrapError| AbortReason::SyncFailed {
            step,
            message: e.to_string(),
        }
    };

    info!("syncing {branch} with {tracking}");
    vcs.fetch_branch(UPSTREAM, branch)
        .map_err(failed(SyncStep::Fetch))?;
    vcs.checkout_branch(branch, &tracking)
        .map_err(failed(SyncStep::Checkout))?;
    vcs.reset_hard(&tracking).map_err(failed(SyncStep::Reset))?;
    vcs.force_push(ORIGIN, branch)
        .map_err(failed(SyncStep::Push))?;
    info!("{ORIGIN}/{branch} now matches {tracking}");
    Ok(())
}
