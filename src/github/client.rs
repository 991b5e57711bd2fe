use crate::error::{ForkstrapError, Result};
use crate::git::url::RepoSlug;
use crate::github::HostingApi;
use octocrab::Octocrab;

const PUBLIC_HOST: &str = "github.com";

/// [`HostingApi`] talking to the REST API directly. Needs a token for anything
/// beyond public reads.
#[derive(Clone)]
pub struct GitHubClient {
    octo: Octocrab,
    host: String,
    authenticated: bool,
}

impl GitHubClient {
    pub fn new(host: &str) -> Result<Self> {
        Ok(Self {
            octo: build_octocrab(host, None)?,
            host: host.to_string(),
            authenticated: false,
        })
    }
}

fn build_octocrab(host: &str, token: Option<&str>) -> Result<Octocrab> {
    let mut builder = Octocrab::builder();
    if !host.eq_ignore_ascii_case(PUBLIC_HOST) {
        builder = builder
            .base_uri(format!("https://{host}/api/v3"))
            .map_err(|e| ForkstrapError::GitHub(e.to_string()))?;
    }
    if let Some(token) = token {
        builder = builder.personal_token(token.to_string());
    }
    builder
        .build()
        .map_err(|e| ForkstrapError::GitHub(e.to_string()))
}

fn is_not_found(err: &octocrab::Error) -> bool {
    matches!(err, octocrab::Error::GitHub { source, .. } if source.status_code.as_u16() == 404)
}

impl HostingApi for GitHubClient {
    async fn is_available(&self) -> bool {
        true
    }

    async fn is_authenticated(&self) -> bool {
        self.authenticated && self.octo.current().user().await.is_ok()
    }

    async fn login_with_token(&mut self, token: &str) -> Result<()> {
        let octo = build_octocrab(&self.host, Some(token))?;
        octo.current()
            .user()
            .await
            .map_err(|e| ForkstrapError::GitHub(format!("token rejected: {e}")))?;
        self.octo = octo;
        self.authenticated = true;
        Ok(())
    }

    async fn current_user(&self) -> Result<String> {
        self.octo
            .current()
            .user()
            .await
            .map(|user| user.login)
            .map_err(|e| ForkstrapError::GitHub(e.to_string()))
    }

    async fn repo_exists(&self, slug: &RepoSlug) -> Result<bool> {
        match self.octo.repos(&slug.owner, &slug.repo).get().await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(ForkstrapError::GitHub(e.to_string())),
        }
    }

    async fn create_fork(&self, upstream: &RepoSlug) -> Result<Option<String>> {
        let fork = self
            .octo
            .repos(&upstream.owner, &upstream.repo)
            .create_fork()
            .send()
            .await
            .map_err(|e| ForkstrapError::GitHub(e.to_string()))?;
        Ok(fork.owner.map(|owner| owner.login))
    }
}
