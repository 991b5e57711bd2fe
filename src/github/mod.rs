pub mod client;
pub mod gh_cli;

use crate::error::Result;
use crate::git::url::RepoSlug;

/// Hosting platform operations the bootstrap needs.
pub trait HostingApi {
    /// Whether the backend can be used at all, e.g. its CLI binary resolves.
    async fn is_available(&self) -> bool;

    async fn is_authenticated(&self) -> bool;

    async fn login_with_token(&mut self, token: &str) -> Result<()>;

    /// Login of the authenticated user.
    async fn current_user(&self) -> Result<String>;

    async fn repo_exists(&self, slug: &RepoSlug) -> Result<bool>;

    /// Forks `upstream` without cloning it or touching local remotes.
    ///
    /// Returns the owner of the fork when the backend reports one.
    async fn create_fork(&self, upstream: &RepoSlug) -> Result<Option<String>>;
}
