//! Local Git repository access via `git2`.

use std::path::Path;

use git2::Repository;
use tracing::debug;

use crate::errors::GitError;

/// Thin wrapper around the `git2::Repository` containing the project.
pub struct GitClient {
    repo: Repository,
}

impl GitClient {
    /// Open the repository containing `start`, searching parent directories.
    pub fn discover<P: AsRef<Path>>(start: P) -> Result<Self, GitError> {
        let start = start.as_ref();
        let repo = Repository::discover(start)
            .map_err(|_| GitError::RepositoryNotFound(start.display().to_string()))?;
        let repo_path = repo.workdir().unwrap_or_else(|| repo.path());
        debug!(start = %start.display(), repo = %repo_path.display(), "discovered git repository");
        Ok(Self { repo })
    }

    /// Short name of the branch HEAD points at.
    ///
    /// Works on an unborn branch (no commits yet). A detached HEAD is
    /// [`GitError::DetachedHead`].
    pub fn current_branch(&self) -> Result<String, GitError> {
        let head = self.repo.find_reference("HEAD")?;
        let target = head.symbolic_target().ok_or(GitError::DetachedHead)?;
        let branch = target.strip_prefix("refs/heads/").unwrap_or(target);
        debug!(branch, "resolved current branch");
        Ok(branch.to_string())
    }
}
