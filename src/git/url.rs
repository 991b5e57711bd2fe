use std::fmt;

/// `owner/repo` pair extracted from a remote URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
}

impl RepoSlug {
    pub fn new(owner: &str, repo: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        }
    }

    /// Parses SCP-style SSH, `ssh://` and `http(s)://` remote URLs pointing at `host`.
    ///
    /// A single trailing `.git` and trailing slashes are ignored. Returns `None`
    /// for any other shape, for a different host, or when the path is not exactly
    /// two non-empty segments.
    pub fn parse(url: &str, host: &str) -> Option<Self> {
        let url = url.trim();
        let (url_host, path) = if let Some(rest) = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .or_else(|| url.strip_prefix("ssh://"))
        {
            let (authority, path) = rest.split_once('/')?;
            let authority = authority.rsplit('@').next().unwrap_or(authority);
            let url_host = authority.split(':').next().unwrap_or(authority);
            (url_host, path)
        } else if let Some((user_host, path)) = url.split_once(':') {
            // scp-like syntax requires a user; bare `host:path` is a local path on some systems
            let (_, url_host) = user_host.split_once('@')?;
            if url_host.contains('/') {
                return None;
            }
            (url_host, path)
        } else {
            return None;
        };

        if !url_host.eq_ignore_ascii_case(host) {
            return None;
        }

        let path = path.trim_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        let (owner, repo) = path.split_once('/')?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return None;
        }
        Some(Self::new(owner, repo))
    }

    pub fn https_url(&self, host: &str) -> String {
        format!("https://{host}/{}/{}.git", self.owner, self.repo)
    }

    pub fn same_repo(&self, other: &RepoSlug) -> bool {
        self.owner.eq_ignore_ascii_case(&other.owner) && self.repo.eq_ignore_ascii_case(&other.repo)
    }

    /// Loose check for URLs `parse` rejects, e.g. with extra path prefixes.
    pub fn mentioned_in(&self, url: &str, host: &str) -> bool {
        let url = url.to_ascii_lowercase();
        let tail = format!("{}/{}", self.owner, self.repo).to_ascii_lowercase();
        let host = host.to_ascii_lowercase();
        url.contains(&format!("{host}/{tail}")) || url.contains(&format!("{host}:{tail}"))
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}
