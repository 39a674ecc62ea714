//! Path filtering for archive construction

use crate::config::TargetSettings;
use std::path::{Component, Path, PathBuf};

/// Version-control metadata directories skipped when `exclude_vcs` is set
pub const VCS_DIRS: &[&str] = &[".git", ".hg", ".svn", ".bzr", "_darcs", "CVS"];

/// Decides whether a path takes part in an archive
#[derive(Debug, Clone)]
pub struct PathFilter {
    exclude_vcs: bool,
    /// Exclusion entries with a trailing separator, matched anywhere in the path
    exclude_dirs: Vec<String>,
    skip: Vec<PathBuf>,
}

impl PathFilter {
    pub fn new(exclude_vcs: bool, exclude_dirs: &[String]) -> Self {
        let exclude_dirs = exclude_dirs
            .iter()
            .map(|dir| dir.trim_end_matches('/'))
            .filter(|dir| !dir.is_empty())
            .map(|dir| format!("{}/", dir))
            .collect();

        Self {
            exclude_vcs,
            exclude_dirs,
            skip: Vec::new(),
        }
    }

    pub fn for_target(settings: &TargetSettings) -> Self {
        Self::new(settings.exclude_vcs, &settings.exclude_dirs)
    }

    /// Exclude everything below `dir` (used for the run's own workdir)
    pub fn skip_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.skip.push(dir.into());
        self
    }

    /// Whether a regular file at `path` belongs in the archive
    pub fn includes(&self, path: &Path) -> bool {
        self.check(path, false)
    }

    /// Whether the walk should descend into the directory at `path`
    pub fn includes_dir(&self, path: &Path) -> bool {
        self.check(path, true)
    }

    fn check(&self, path: &Path, is_dir: bool) -> bool {
        if self.exclude_vcs && path.components().any(is_vcs_component) {
            return false;
        }

        if !self.exclude_dirs.is_empty() {
            let mut text = path.to_string_lossy().into_owned();
            if !text.starts_with('/') {
                text.insert(0, '/');
            }
            if is_dir && !text.ends_with('/') {
                text.push('/');
            }
            if self.exclude_dirs.iter().any(|dir| text.contains(dir.as_str())) {
                return false;
            }
        }

        !self.skip.iter().any(|dir| path.starts_with(dir))
    }
}

fn is_vcs_component(component: Component<'_>) -> bool {
    match component {
        Component::Normal(name) => VCS_DIRS.iter().any(|vcs| name == *vcs),
        _ => false,
    }
}
