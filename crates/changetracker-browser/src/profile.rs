use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Lock files a browser leaves in its profile when it exits uncleanly
const SINGLETON_ARTIFACTS: [&str; 3] = ["SingletonLock", "SingletonSocket", "SingletonCookie"];

/// Manages the persistent browser profile that keeps the portal sign-in
pub struct ProfileManager {
    path: PathBuf,
}

impl ProfileManager {
    /// Create or use a persistent profile at the given path
    ///
    /// A leading `~` is expanded to the home directory.
    pub fn persistent(path: PathBuf) -> Result<Self> {
        let path = expand_home(path);

        if !path.exists() {
            std::fs::create_dir_all(&path).map_err(Error::Io)?;
            tracing::info!("Created browser profile at {}", path.display());
        }

        Ok(Self { path })
    }

    /// Get the profile directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove singleton lock artifacts left behind by a crashed browser
    ///
    /// Returns the number of artifacts removed.
    pub fn clear_stale_locks(&self) -> usize {
        let mut removed = 0;
        for name in SINGLETON_ARTIFACTS {
            let artifact = self.path.join(name);
            // Symlinks with dangling targets report false from exists()
            if artifact.symlink_metadata().is_err() {
                continue;
            }
            match std::fs::remove_file(&artifact) {
                Ok(()) => removed += 1,
                Err(e) => tracing::debug!("Could not remove {}: {}", artifact.display(), e),
            }
        }
        if removed > 0 {
            tracing::debug!("Removed {} stale profile lock artifacts", removed);
        }
        removed
    }
}

fn expand_home(path: PathBuf) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or(path),
        Err(_) => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistent_profile_is_not_deleted() {
        let temp_dir = tempfile::tempdir().unwrap();
        let profile_path = temp_dir.path().join("edge-profile");

        let profile = ProfileManager::persistent(profile_path.clone()).unwrap();
        assert!(profile_path.exists());

        drop(profile);

        assert!(profile_path.exists());
    }

    #[test]
    fn test_persistent_profile_creates_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let profile_path = temp_dir.path().join("nested").join("new-profile");

        assert!(!profile_path.exists());

        let profile = ProfileManager::persistent(profile_path.clone()).unwrap();
        assert!(profile_path.is_dir());
        assert_eq!(profile.path(), profile_path.as_path());
    }

    #[test]
    fn test_clear_stale_locks_removes_only_artifacts() {
        let temp_dir = tempfile::tempdir().unwrap();
        let profile = ProfileManager::persistent(temp_dir.path().to_path_buf()).unwrap();

        std::fs::write(temp_dir.path().join("SingletonLock"), "").unwrap();
        std::fs::write(temp_dir.path().join("SingletonCookie"), "").unwrap();
        std::fs::write(temp_dir.path().join("Preferences"), "{}").unwrap();

        assert_eq!(profile.clear_stale_locks(), 2);
        assert!(!temp_dir.path().join("SingletonLock").exists());
        assert!(temp_dir.path().join("Preferences").exists());
        assert_eq!(profile.clear_stale_locks(), 0);
    }

    #[test]
    fn test_home_prefix_is_expanded() {
        let expanded = expand_home(PathBuf::from("~/edge-profile"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("edge-profile"));
        }
        assert_eq!(expand_home(PathBuf::from("edge-profile")), PathBuf::from("edge-profile"));
    }
}
