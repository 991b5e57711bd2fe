use crate::error::{ForkstrapError, Result};
use crate::git::url::RepoSlug;
use crate::github::HostingApi;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

const NOT_FOUND_MARKER: &str = "Could not resolve to a Repository";

/// [`HostingApi`] backed by the GitHub CLI (`gh`).
pub struct GhCli {
    program: PathBuf,
    host: String,
}

#[derive(Debug)]
struct GhOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl GhOutput {
    fn into_result(self, what: &str) -> Result<String> {
        if self.success {
            Ok(self.stdout)
        } else {
            Err(ForkstrapError::Command {
                program: format!("gh {what}"),
                message: self.stderr.trim().to_string(),
            })
        }
    }
}

impl GhCli {
    pub fn new(program: impl Into<PathBuf>, host: &str) -> Self {
        Self {
            program: program.into(),
            host: host.to_string(),
        }
    }

    fn qualified(&self, slug: &RepoSlug) -> String {
        format!("{}/{slug}", self.host)
    }

    async fn run(&self, args: &[&str], stdin: Option<&str>) -> Result<GhOutput> {
        let mut child = Command::new(&self.program)
            .args(args)
            .env("GH_PROMPT_DISABLED", "1")
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
            pipe.write_all(b"\n").await?;
        }

        let output = child.wait_with_output().await?;
        let result = GhOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !result.success {
            debug!(args = ?args, stderr = %result.stderr.trim(), "gh command failed");
        }
        Ok(result)
    }
}

impl HostingApi for GhCli {
    async fn is_available(&self) -> bool {
        match self.run(&["--version"], None).await {
            Ok(out) => out.success,
            Err(e) => {
                debug!("{} not usable: {e}", self.program.display());
                false
            }
        }
    }

    async fn is_authenticated(&self) -> bool {
        self.run(&["auth", "status", "--hostname", &self.host], None)
            .await
            .map(|out| out.success)
            .unwrap_or(false)
    }

    async fn login_with_token(&mut self, token: &str) -> Result<()> {
        self.run(
            &["auth", "login", "--hostname", &self.host, "--with-token"],
            Some(token),
        )
        .await?
        .into_result("auth login")?;
        Ok(())
    }

    async fn current_user(&self) -> Result<String> {
        let login = self
            .run(&["api", "user", "--hostname", &self.host, "--jq", ".login"], None)
            .await?
            .into_result("api user")?;
        Ok(login.trim().to_string())
    }

    async fn repo_exists(&self, slug: &RepoSlug) -> Result<bool> {
        let out = self
            .run(&["repo", "view", &self.qualified(slug), "--json", "name"], None)
            .await?;
        if out.success {
            Ok(true)
        } else if out.stderr.contains(NOT_FOUND_MARKER) {
            Ok(false)
        } else {
            out.into_result("repo view").map(|_| false)
        }
    }

    async fn create_fork(&self, upstream: &RepoSlug) -> Result<Option<String>> {
        let out = self
            .run(
                &[
                    "repo",
                    "fork",
                    &self.qualified(upstream),
                    "--clone=false",
                    "--remote=false",
                ],
                None,
            )
            .await?;
        // gh reports "Created fork alice/widgets" (or "alice/widgets already exists") on stderr
        let reported = format!("{}\n{}", out.stdout, out.stderr);
        out.into_result("repo fork")?;
        Ok(fork_owner(&reported, &upstream.repo))
    }
}

fn fork_owner(output: &str, repo: &str) -> Option<String> {
    let suffix = format!("/{repo}");
    output
        .split_whitespace()
        .filter_map(|word| word.trim_end_matches(['.', ',']).strip_suffix(&suffix))
        .map(|prefix| prefix.rsplit('/').next().unwrap_or(prefix))
        .find(|owner| !owner.is_empty())
        .map(String::from)
}
