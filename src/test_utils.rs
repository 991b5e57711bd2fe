#![cfg(test)]

use crate::error::{ForkstrapError, Result};
use crate::git::types::RemoteInfo;
use crate::git::url::RepoSlug;
use crate::git::Vcs;
use crate::github::HostingApi;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// In-memory repository. `servers` maps remote URLs to their branch tips so
/// fetch and push move commits between "hosts".
#[derive(Default)]
pub struct FakeVcs {
    pub work_tree: bool,
    pub remotes: Vec<RemoteInfo>,
    pub refs: BTreeMap<String, String>,
    pub head: Option<String>,
    pub servers: BTreeMap<String, BTreeMap<String, String>>,
    pub fail_on: Option<&'static str>,
    pub calls: Vec<String>,
}

impl FakeVcs {
    pub fn with_origin(url: &str) -> Self {
        Self {
            work_tree: true,
            remotes: vec![RemoteInfo {
                name: "origin".into(),
                url: url.into(),
            }],
            ..Self::default()
        }
    }

    pub fn with_remote(mut self, name: &str, url: &str) -> Self {
        self.remotes.push(RemoteInfo {
            name: name.into(),
            url: url.into(),
        });
        self
    }

    pub fn with_server_branch(mut self, url: &str, branch: &str, commit: &str) -> Self {
        self.servers
            .entry(url.into())
            .or_default()
            .insert(branch.into(), commit.into());
        self
    }

    pub fn url_of(&self, name: &str) -> Option<&str> {
        self.remotes
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.url.as_str())
    }

    pub fn server_tip(&self, url: &str, branch: &str) -> Option<&str> {
        self.servers
            .get(url)
            .and_then(|branches| branches.get(branch))
            .map(String::as_str)
    }

    fn record(&mut self, op: &'static str, detail: String) -> Result<()> {
        self.calls.push(format!("{op} {detail}"));
        if self.fail_on == Some(op) {
            return Err(ForkstrapError::Command {
                program: format!("git {op}"),
                message: "simulated failure".into(),
            });
        }
        Ok(())
    }

    fn remote_mut(&mut self, name: &str) -> Result<&mut RemoteInfo> {
        self.remotes
            .iter_mut()
            .find(|r| r.name == name)
            .ok_or_else(|| fake_err(format!("no such remote '{name}'")))
    }

    fn resolve(&self, target: &str) -> Option<String> {
        [
            target.to_string(),
            format!("refs/heads/{target}"),
            format!("refs/remotes/{target}"),
        ]
        .iter()
        .find_map(|name| self.refs.get(name).cloned())
    }
}

fn fake_err(message: String) -> ForkstrapError {
    ForkstrapError::Command {
        program: "git".into(),
        message,
    }
}

impl Vcs for FakeVcs {
    fn is_work_tree(&self) -> bool {
        self.work_tree
    }

    fn remote_url(&self, name: &str) -> Result<Option<String>> {
        Ok(self.url_of(name).map(String::from))
    }

    fn remotes(&self) -> Result<Vec<RemoteInfo>> {
        Ok(self.remotes.clone())
    }

    fn rename_remote(&mut self, from: &str, to: &str) -> Result<()> {
        self.record("rename", format!("{from} {to}"))?;
        if self.url_of(to).is_some() {
            return Err(fake_err(format!("remote '{to}' already exists")));
        }
        self.remote_mut(from)?.name = to.to_string();
        Ok(())
    }

    fn set_remote_url(&mut self, name: &str, url: &str) -> Result<()> {
        self.record("set-url", format!("{name} {url}"))?;
        self.remote_mut(name)?.url = url.to_string();
        Ok(())
    }

    fn add_remote(&mut self, name: &str, url: &str) -> Result<()> {
        self.record("add", format!("{name} {url}"))?;
        if self.url_of(name).is_some() {
            return Err(fake_err(format!("remote '{name}' already exists")));
        }
        self.remotes.push(RemoteInfo {
            name: name.into(),
            url: url.into(),
        });
        Ok(())
    }

    fn fetch_branch(&mut self, remote: &str, branch: &str) -> Result<()> {
        self.record("fetch", format!("{remote} {branch}"))?;
        let url = self
            .url_of(remote)
            .ok_or_else(|| fake_err(format!("no such remote '{remote}'")))?
            .to_string();
        let tip = self
            .server_tip(&url, branch)
            .ok_or_else(|| fake_err(format!("couldn't find remote ref {branch}")))?
            .to_string();
        self.refs
            .insert(format!("refs/remotes/{remote}/{branch}"), tip);
        Ok(())
    }

    fn checkout_branch(&mut self, branch: &str, start_point: &str) -> Result<()> {
        self.record("checkout", format!("{branch} {start_point}"))?;
        let local = format!("refs/heads/{branch}");
        if !self.refs.contains_key(&local) {
            let tip = self
                .resolve(start_point)
                .ok_or_else(|| fake_err(format!("invalid reference {start_point}")))?;
            self.refs.insert(local, tip);
        }
        self.head = Some(branch.to_string());
        Ok(())
    }

    fn reset_hard(&mut self, target: &str) -> Result<()> {
        self.record("reset", target.to_string())?;
        let tip = self
            .resolve(target)
            .ok_or_else(|| fake_err(format!("unknown revision {target}")))?;
        let head = self
            .head
            .clone()
            .ok_or_else(|| fake_err("HEAD is detached".into()))?;
        self.refs.insert(format!("refs/heads/{head}"), tip);
        Ok(())
    }

    fn force_push(&mut self, remote: &str, branch: &str) -> Result<()> {
        self.record("push", format!("{remote} {branch}"))?;
        let url = self
            .url_of(remote)
            .ok_or_else(|| fake_err(format!("no such remote '{remote}'")))?
            .to_string();
        let tip = self
            .resolve(&format!("refs/heads/{branch}"))
            .ok_or_else(|| fake_err(format!("src refspec {branch} does not match any")))?;
        self.servers
            .entry(url)
            .or_default()
            .insert(branch.to_string(), tip);
        Ok(())
    }
}

/// Scriptable hosting backend. `calls` records every request in order.
pub struct FakeHost {
    pub available: bool,
    pub authenticated: bool,
    pub accepted_token: Option<String>,
    pub user: Option<String>,
    pub existing: Vec<RepoSlug>,
    pub fork_error: Option<String>,
    pub fork_owner: Option<String>,
    pub calls: RefCell<Vec<String>>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self {
            available: true,
            authenticated: true,
            accepted_token: None,
            user: None,
            existing: Vec::new(),
            fork_error: None,
            fork_owner: None,
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl FakeHost {
    pub fn as_user(user: &str) -> Self {
        Self {
            user: Some(user.into()),
            fork_owner: Some(user.into()),
            ..Self::default()
        }
    }

    pub fn called(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

impl HostingApi for FakeHost {
    async fn is_available(&self) -> bool {
        self.record("available".into());
        self.available
    }

    async fn is_authenticated(&self) -> bool {
        self.record("auth-status".into());
        self.authenticated
    }

    async fn login_with_token(&mut self, token: &str) -> Result<()> {
        self.record(format!("login {token}"));
        if self.accepted_token.as_deref() == Some(token) {
            self.authenticated = true;
            Ok(())
        } else {
            Err(ForkstrapError::GitHub("bad credentials".into()))
        }
    }

    async fn current_user(&self) -> Result<String> {
        self.record("user".into());
        self.user
            .clone()
            .ok_or_else(|| ForkstrapError::GitHub("requires authentication".into()))
    }

    async fn repo_exists(&self, slug: &RepoSlug) -> Result<bool> {
        self.record(format!("exists {slug}"));
        Ok(self.existing.iter().any(|r| r.same_repo(slug)))
    }

    async fn create_fork(&self, upstream: &RepoSlug) -> Result<Option<String>> {
        self.record(format!("fork {upstream}"));
        match &self.fork_error {
            Some(msg) => Err(ForkstrapError::GitHub(msg.clone())),
            None => Ok(self.fork_owner.clone()),
        }
    }
}

/// Log sink shared between a test subscriber and the assertions.
#[derive(Clone, Default)]
pub struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl CapturedOutput {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedOutput {
    type Writer = CapturedOutput;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
