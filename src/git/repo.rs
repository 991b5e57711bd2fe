use crate::error::{ForkstrapError, Result};
use crate::git::types::RemoteInfo;
use crate::git::Vcs;
use git2::build::CheckoutBuilder;
use git2::{
    BranchType, Cred, CredentialType, ErrorCode, FetchOptions, PushOptions, RemoteCallbacks,
    Repository, ResetType,
};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const TOKEN_USERNAME: &str = "x-access-token";
const MAX_AUTH_ATTEMPTS: usize = 3;

pub fn open_repo(path: &Path) -> Result<Repository> {
    Repository::discover(path)
        .map_err(|e| ForkstrapError::NotARepo(format!("{}: {e}", path.display())))
}

/// libgit2-backed [`Vcs`]. Holds no repository when `path` is outside a work tree.
pub struct GitRepo {
    path: PathBuf,
    repo: Option<Repository>,
    token: Option<String>,
}

impl GitRepo {
    pub fn open(path: &Path, token: Option<String>) -> Self {
        let repo = match open_repo(path) {
            Ok(repo) => Some(repo),
            Err(e) => {
                debug!("{e}");
                None
            }
        };
        Self {
            path: path.to_path_buf(),
            repo,
            token,
        }
    }

    pub fn workdir(&self) -> Option<&Path> {
        self.repo.as_ref().and_then(|r| r.workdir())
    }

    fn repo(&self) -> Result<&Repository> {
        self.repo
            .as_ref()
            .ok_or_else(|| ForkstrapError::NotARepo(self.path.display().to_string()))
    }
}

impl Vcs for GitRepo {
    fn is_work_tree(&self) -> bool {
        self.workdir().is_some()
    }

    fn remote_url(&self, name: &str) -> Result<Option<String>> {
        match self.repo()?.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(String::from)),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remotes(&self) -> Result<Vec<RemoteInfo>> {
        let repo = self.repo()?;
        let mut out = Vec::new();
        for name in repo.remotes()?.iter().flatten() {
            let remote = repo.find_remote(name)?;
            out.push(RemoteInfo {
                name: name.to_string(),
                url: remote.url().unwrap_or_default().to_string(),
            });
        }
        Ok(out)
    }

    fn rename_remote(&mut self, from: &str, to: &str) -> Result<()> {
        let problems = self.repo()?.remote_rename(from, to)?;
        for refspec in problems.iter().flatten() {
            warn!("warning: refspec {refspec} was not renamed and may need manual attention");
        }
        Ok(())
    }

    fn set_remote_url(&mut self, name: &str, url: &str) -> Result<()> {
        self.repo()?.remote_set_url(name, url)?;
        Ok(())
    }

    fn add_remote(&mut self, name: &str, url: &str) -> Result<()> {
        self.repo()?.remote(name, url)?;
        Ok(())
    }

    fn fetch_branch(&mut self, remote: &str, branch: &str) -> Result<()> {
        let repo = self.repo()?;
        let config = repo.config()?;
        let mut handle = repo.find_remote(remote)?;
        let refspec = format!("+refs/heads/{branch}:refs/remotes/{remote}/{branch}");

        let mut opts = FetchOptions::new();
        opts.remote_callbacks(remote_callbacks(self.token.as_deref(), &config));
        handle.fetch(&[&refspec], Some(&mut opts), None)?;
        Ok(())
    }

    fn checkout_branch(&mut self, branch: &str, start_point: &str) -> Result<()> {
        let repo = self.repo()?;
        if repo.find_branch(branch, BranchType::Local).is_err() {
            let commit = repo.revparse_single(start_point)?.peel_to_commit()?;
            repo.branch(branch, &commit, false)?;
            debug!("created local branch {branch} at {start_point}");
        }

        // checkout before moving HEAD, otherwise the old tree is treated as local edits
        let refname = format!("refs/heads/{branch}");
        let target = repo.revparse_single(&refname)?;
        repo.checkout_tree(&target, Some(CheckoutBuilder::new().safe()))?;
        repo.set_head(&refname)?;
        Ok(())
    }

    fn reset_hard(&mut self, target: &str) -> Result<()> {
        let repo = self.repo()?;
        let object = repo.revparse_single(target)?;
        repo.reset(&object, ResetType::Hard, None)?;
        Ok(())
    }

    fn force_push(&mut self, remote: &str, branch: &str) -> Result<()> {
        let repo = self.repo()?;
        let config = repo.config()?;
        let mut handle = repo.find_remote(remote)?;
        let refspec = format!("+refs/heads/{branch}:refs/heads/{branch}");

        let mut rejected: Option<String> = None;
        {
            let mut callbacks = remote_callbacks(self.token.as_deref(), &config);
            callbacks.push_update_reference(|refname, status| {
                if let Some(msg) = status {
                    rejected = Some(format!("{refname}: {msg}"));
                }
                Ok(())
            });
            let mut opts = PushOptions::new();
            opts.remote_callbacks(callbacks);
            handle.push(&[&refspec], Some(&mut opts))?;
        }

        match rejected {
            Some(msg) => Err(ForkstrapError::Git(git2::Error::from_str(&format!(
                "push rejected: {msg}"
            )))),
            None => Ok(()),
        }
    }
}

// Token first (HTTPS), then the configured credential helper, then the SSH agent.
fn remote_callbacks<'a>(token: Option<&'a str>, config: &'a git2::Config) -> RemoteCallbacks<'a> {
    let mut attempts = 0usize;
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username_from_url, allowed| {
        attempts += 1;
        if attempts > MAX_AUTH_ATTEMPTS {
            return Err(git2::Error::from_str("authentication failed"));
        }
        if allowed.contains(CredentialType::SSH_KEY) {
            return Cred::ssh_key_from_agent(username_from_url.unwrap_or("git"));
        }
        if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
            return match token {
                Some(token) if attempts == 1 => Cred::userpass_plaintext(TOKEN_USERNAME, token),
                _ => Cred::credential_helper(config, url, username_from_url),
            };
        }
        Cred::default()
    });
    callbacks
}
