//! On-disk layout for submission attachments.
//!
//! Attachments live under `<private_root>/submissions/<id as 32 hex>/` with a
//! random stored name that keeps the original extension. Rows store the path
//! relative to the private root, always with `/` separators.

use rand::{RngCore, rngs::OsRng};
use std::{
    io,
    path::{Component, Path, PathBuf},
};
use uuid::Uuid;

use crate::cli::commands::storage::Options as StorageOptions;

const SUBMISSIONS_DIR: &str = "submissions";
const MAX_EXTENSION_LEN: usize = 16;

#[derive(Clone, Debug)]
pub struct StoragePaths {
    pub private_root: PathBuf,
    pub public_root: PathBuf,
}

impl From<&StorageOptions> for StoragePaths {
    fn from(options: &StorageOptions) -> Self {
        Self {
            private_root: options.private_root.clone(),
            public_root: options.public_root.clone(),
        }
    }
}

impl StoragePaths {
    #[must_use]
    pub fn submission_dir(&self, id: Uuid) -> PathBuf {
        self.private_root
            .join(SUBMISSIONS_DIR)
            .join(id.simple().to_string())
    }

    /// Map a stored relative path onto the private root, refusing anything
    /// that could escape it.
    #[must_use]
    pub fn resolve_private(&self, relative: &str) -> Option<PathBuf> {
        let relative = Path::new(relative);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        (safe && relative.components().next().is_some()).then(|| self.private_root.join(relative))
    }

    /// Remove a submission's attachment directory; a missing directory is fine.
    ///
    /// # Errors
    /// Returns the I/O error for anything other than `NotFound`.
    pub async fn remove_submission_dir(&self, id: Uuid) -> io::Result<()> {
        match tokio::fs::remove_dir_all(self.submission_dir(id)).await {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

#[must_use]
pub fn random_hex() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Extension of the client-supplied name, including the dot, when it is short
/// and alphanumeric; otherwise empty.
#[must_use]
pub fn safe_extension(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    match base.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|ch| ch.is_ascii_alphanumeric()) =>
        {
            format!(".{ext}")
        }
        _ => String::new(),
    }
}

#[must_use]
pub fn stored_file_name(original: &str) -> String {
    format!("{}{}", random_hex(), safe_extension(original))
}

#[must_use]
pub fn relative_path(id: Uuid, stored_name: &str) -> String {
    format!("{SUBMISSIONS_DIR}/{}/{stored_name}", id.simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn paths(root: &Path) -> StoragePaths {
        StoragePaths {
            private_root: root.join("private"),
            public_root: root.join("public"),
        }
    }

    #[test]
    fn extension_is_kept_when_plain() {
        assert_eq!(safe_extension("demo.MP3"), ".MP3");
        assert_eq!(safe_extension("C:\\music\\take.2.wav"), ".wav");
        assert_eq!(safe_extension("noext"), "");
        assert_eq!(safe_extension(".bashrc"), "");
        assert_eq!(safe_extension("evil.p/hp"), "");
        assert_eq!(safe_extension("a.tar gz"), "");
    }

    #[test]
    fn stored_names_are_random_hex() {
        let first = stored_file_name("photo.jpg");
        let second = stored_file_name("photo.jpg");
        assert_ne!(first, second);
        assert_eq!(first.len(), 36);
        assert!(first.ends_with(".jpg"));
        assert!(first[..32].chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn relative_path_uses_simple_uuid() {
        let id = Uuid::nil();
        assert_eq!(
            relative_path(id, "abc.wav"),
            "submissions/00000000000000000000000000000000/abc.wav"
        );
    }

    #[test]
    fn resolve_refuses_escapes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let paths = paths(dir.path());
        assert_eq!(
            paths.resolve_private("submissions/x/file.wav"),
            Some(dir.path().join("private/submissions/x/file.wav"))
        );
        assert_eq!(paths.resolve_private("../secret"), None);
        assert_eq!(paths.resolve_private("submissions/../../secret"), None);
        assert_eq!(paths.resolve_private("/etc/passwd"), None);
        assert_eq!(paths.resolve_private(""), None);
        Ok(())
    }

    #[tokio::test]
    async fn removing_a_missing_directory_is_ok() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let paths = paths(dir.path());
        let id = Uuid::new_v4();
        paths.remove_submission_dir(id).await?;

        tokio::fs::create_dir_all(paths.submission_dir(id)).await?;
        tokio::fs::write(paths.submission_dir(id).join("a.txt"), b"x").await?;
        paths.remove_submission_dir(id).await?;
        assert!(!paths.submission_dir(id).exists());
        Ok(())
    }
}
