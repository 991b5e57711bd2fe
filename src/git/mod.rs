pub mod repo;
pub mod types;
pub mod url;

use crate::error::Result;
use types::RemoteInfo;

/// Local repository operations the bootstrap needs.
pub trait Vcs {
    fn is_work_tree(&self) -> bool;

    fn remote_url(&self, name: &str) -> Result<Option<String>>;

    fn remotes(&self) -> Result<Vec<RemoteInfo>>;

    fn rename_remote(&mut self, from: &str, to: &str) -> Result<()>;

    fn set_remote_url(&mut self, name: &str, url: &str) -> Result<()>;

    fn add_remote(&mut self, name: &str, url: &str) -> Result<()>;

    /// Updates `refs/remotes/<remote>/<branch>` from the remote.
    fn fetch_branch(&mut self, remote: &str, branch: &str) -> Result<()>;

    /// Checks out local `branch`, creating it at `start_point` when absent.
    fn checkout_branch(&mut self, branch: &str, start_point: &str) -> Result<()>;

    fn reset_hard(&mut self, target: &str) -> Result<()>;

    fn force_push(&mut self, remote: &str, branch: &str) -> Result<()>;
}
