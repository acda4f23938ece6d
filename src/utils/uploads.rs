//! Stored files (module videos, resource documents) live under the uploads
//! directory and are referenced by relative paths.

use std::path::{Component, Path, PathBuf};

/// Joins `relative` onto `base`, refusing anything that could escape it.
pub fn resolve_asset(base: &Path, relative: &str) -> Option<PathBuf> {
    let relative = relative.trim_start_matches('/');
    if relative.is_empty() {
        return None;
    }

    let path = Path::new(relative);
    let safe = path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    safe.then(|| base.join(path))
}

/// Best-effort removal: failures are logged and otherwise ignored.
pub async fn remove_asset(base: &Path, relative: &str) {
    let Some(path) = resolve_asset(base, relative) else {
        tracing::warn!(asset = relative, "refusing to remove asset outside of uploads");
        return;
    };

    match tokio::fs::remove_file(&path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "asset removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "asset already gone")
        }
        Err(e) => crate::error::log_error(&e),
    }
}

pub async fn remove_assets(base: &Path, assets: &[String]) {
    for asset in assets {
        remove_asset(base, asset).await;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn resolve_rejects_traversal() {
        let base = Path::new("/srv/uploads");
        assert_eq!(
            resolve_asset(base, "resources/guide.pdf"),
            Some(PathBuf::from("/srv/uploads/resources/guide.pdf"))
        );
        assert_eq!(
            resolve_asset(base, "/videos/intro.mp4"),
            Some(PathBuf::from("/srv/uploads/videos/intro.mp4"))
        );
        assert_eq!(resolve_asset(base, "../etc/passwd"), None);
        assert_eq!(resolve_asset(base, "videos/../../secret"), None);
        assert_eq!(resolve_asset(base, ""), None);
    }

    #[tokio::test]
    async fn remove_asset_deletes_file_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.pdf");
        std::fs::write(&file, b"pdf").unwrap();

        remove_asset(dir.path(), "doc.pdf").await;
        assert!(!file.exists());

        // second removal only logs
        remove_asset(dir.path(), "doc.pdf").await;
    }
}
