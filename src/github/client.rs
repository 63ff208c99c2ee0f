//! Octocrab client wrapper scoped to the release repository.

use octocrab::Octocrab;

use crate::types::RepoId;

/// A GitHub API client scoped to one repository.
#[derive(Clone)]
pub struct GitHubClient {
    client: Octocrab,
    repo: RepoId,
}

impl GitHubClient {
    pub fn new(client: Octocrab, repo: RepoId) -> Self {
        Self { client, repo }
    }

    /// Creates a client, authenticated when a token is given.
    ///
    /// Public release assets are readable anonymously, but the anonymous
    /// rate limit is low enough that a busy watcher will hit it.
    pub fn from_token(token: Option<String>, repo: RepoId) -> Result<Self, octocrab::Error> {
        let builder = Octocrab::builder();
        let client = match token {
            Some(token) => builder.personal_token(token).build()?,
            None => builder.build()?,
        };
        Ok(Self::new(client, repo))
    }

    pub fn inner(&self) -> &Octocrab {
        &self.client
    }

    pub fn repo(&self) -> &RepoId {
        &self.repo
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}
