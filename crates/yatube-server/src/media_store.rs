use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;
use yatube_shared::constants::POST_IMAGE_SUBDIR;
use yatube_shared::forms::CleanedImage;
use yatube_shared::upload::ImageKind;

use crate::error::ServerError;

/// Attempts at finding a free file name before giving up.
const MAX_NAME_ATTEMPTS: usize = 8;

/// Verify that a resolved path stays within the expected base directory.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, ServerError> {
    let canonical_base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    let mut resolved = canonical_base.clone();
    for component in target
        .strip_prefix(base)
        .or_else(|_| target.strip_prefix(&canonical_base))
        .unwrap_or(target)
        .components()
    {
        match component {
            std::path::Component::Normal(c) => resolved.push(c),
            std::path::Component::ParentDir => {
                return Err(ServerError::BadRequest(
                    "Path traversal detected".to_string(),
                ));
            }
            _ => {}
        }
    }
    if !resolved.starts_with(&canonical_base) {
        return Err(ServerError::BadRequest(
            "Path traversal detected".to_string(),
        ));
    }
    Ok(resolved)
}

/// Reduce an uploaded file name to a safe basename ending in an extension
/// that matches the detected image format.
pub fn sanitize_file_name(raw: &str, kind: ImageKind) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or("");
    let mut cleaned = String::with_capacity(base.len());
    for c in base.chars() {
        // `..` never survives, so stored names pass the traversal check.
        if c == '.' && cleaned.ends_with('.') {
            continue;
        }
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            cleaned.push(c);
        } else {
            cleaned.push('_');
        }
    }

    let (stem, ext) = match cleaned.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (cleaned.as_str(), None),
    };
    let stem = stem.trim_start_matches('.');
    let stem = if stem.is_empty() { "image" } else { stem };

    match ext.and_then(ImageKind::from_extension) {
        Some(found) if found == kind => format!("{stem}.{}", ext.unwrap_or(kind.extension())),
        _ => format!("{stem}.{}", kind.extension()),
    }
}

/// Uploaded images on local disk, addressed by `posts/<name>` paths.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub async fn new(root: PathBuf) -> Result<Self, ServerError> {
        let images = root.join(POST_IMAGE_SUBDIR);
        fs::create_dir_all(&images).await.map_err(|e| {
            ServerError::Media(format!(
                "Failed to create media directory '{}': {}",
                images.display(),
                e
            ))
        })?;

        info!(path = %root.display(), "Media store initialized");

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a validated image under `posts/` and return its relative path.
    ///
    /// The original name is kept when free; otherwise a short random suffix
    /// is appended to the stem.
    pub async fn save_post_image(&self, image: &CleanedImage) -> Result<String, ServerError> {
        let name = sanitize_file_name(&image.file_name, image.info.kind);
        let (stem, ext) = name.rsplit_once('.').unwrap_or((name.as_str(), ""));

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let candidate = if attempt == 0 {
                name.clone()
            } else {
                let suffix = Uuid::new_v4().simple().to_string();
                format!("{stem}_{}.{ext}", &suffix[..7])
            };
            let path = self.safe_subpath(POST_IMAGE_SUBDIR, &candidate)?;

            let mut file = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(ServerError::Media(format!(
                        "Failed to create {}: {}",
                        path.display(),
                        e
                    )))
                }
            };

            file.write_all(&image.data).await.map_err(|e| {
                ServerError::Media(format!("Failed to write {}: {}", path.display(), e))
            })?;
            file.flush().await.map_err(|e| {
                ServerError::Media(format!("Failed to flush {}: {}", path.display(), e))
            })?;

            let relative = format!("{POST_IMAGE_SUBDIR}/{candidate}");
            debug!(path = %relative, size = image.data.len(), "Stored image");
            return Ok(relative);
        }

        Err(ServerError::Media(format!(
            "No free file name for '{name}' after {MAX_NAME_ATTEMPTS} attempts"
        )))
    }

    /// Read a stored post image together with its format.
    pub async fn read_post_image(&self, name: &str) -> Result<(Vec<u8>, ImageKind), ServerError> {
        let kind = name
            .rsplit_once('.')
            .and_then(|(_, ext)| ImageKind::from_extension(ext))
            .ok_or(ServerError::NotFound)?;
        let path = self
            .safe_subpath(POST_IMAGE_SUBDIR, name)
            .map_err(|_| ServerError::NotFound)?;

        match fs::read(&path).await {
            Ok(data) => Ok((data, kind)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ServerError::NotFound),
            Err(e) => Err(ServerError::Media(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Remove a stored file by its relative path, e.g. `posts/a.gif`.
    pub async fn delete(&self, relative: &str) -> Result<bool, ServerError> {
        let Some((subdir, name)) = relative.split_once('/') else {
            return Err(ServerError::BadRequest(format!("Bad media path '{relative}'")));
        };
        let path = self.safe_subpath(subdir, name)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %relative, "Deleted image");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ServerError::Media(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn safe_subpath(&self, subdir: &str, filename: &str) -> Result<PathBuf, ServerError> {
        if subdir.is_empty()
            || filename.is_empty()
            || subdir.contains('/')
            || subdir.contains('\\')
            || subdir.contains("..")
            || filename.contains('/')
            || filename.contains('\\')
            || filename.contains("..")
        {
            return Err(ServerError::BadRequest(
                "Path traversal detected".to_string(),
            ));
        }
        let target = self.root.join(subdir).join(filename);
        ensure_within(&self.root, &target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use yatube_shared::upload::inspect_image;

    use crate::test_support::SMALL_GIF;

    async fn test_store() -> (MediaStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = MediaStore::new(dir.path().to_path_buf()).await.unwrap();
        (store, dir)
    }

    fn gif(name: &str) -> CleanedImage {
        CleanedImage {
            file_name: name.to_string(),
            data: SMALL_GIF.to_vec(),
            info: inspect_image(SMALL_GIF, 1024).unwrap(),
        }
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("small.gif", ImageKind::Gif), "small.gif");
        assert_eq!(sanitize_file_name("../../etc/passwd", ImageKind::Png), "passwd.png");
        assert_eq!(sanitize_file_name("C:\\pics\\my cat.GIF", ImageKind::Gif), "my_cat.GIF");
        assert_eq!(sanitize_file_name(".gif", ImageKind::Gif), "image.gif");
        assert_eq!(sanitize_file_name("", ImageKind::Jpeg), "image.jpg");
        assert_eq!(sanitize_file_name("photo.png", ImageKind::Gif), "photo.gif");
        assert_eq!(sanitize_file_name("my..photo.gif", ImageKind::Gif), "my.photo.gif");
        assert_eq!(sanitize_file_name("a...b..gif", ImageKind::Gif), "a.b.gif");
    }

    #[tokio::test]
    async fn test_double_dot_name_is_saved() {
        let (store, _dir) = test_store().await;

        let path = store.save_post_image(&gif("my..photo.gif")).await.unwrap();
        assert_eq!(path, "posts/my.photo.gif");
        assert!(store.read_post_image("my.photo.gif").await.is_ok());
    }

    #[tokio::test]
    async fn test_save_and_read() {
        let (store, _dir) = test_store().await;

        let path = store.save_post_image(&gif("small.gif")).await.unwrap();
        assert_eq!(path, "posts/small.gif");

        let (data, kind) = store.read_post_image("small.gif").await.unwrap();
        assert_eq!(data, SMALL_GIF);
        assert_eq!(kind, ImageKind::Gif);
    }

    #[tokio::test]
    async fn test_name_collision_gets_suffix() {
        let (store, _dir) = test_store().await;

        let first = store.save_post_image(&gif("small.gif")).await.unwrap();
        let second = store.save_post_image(&gif("small.gif")).await.unwrap();

        assert_eq!(first, "posts/small.gif");
        assert_ne!(first, second);
        assert!(second.starts_with("posts/small_"));
        assert!(second.ends_with(".gif"));
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, _dir) = test_store().await;
        let path = store.save_post_image(&gif("gone.gif")).await.unwrap();

        assert!(store.delete(&path).await.unwrap());
        assert!(!store.delete(&path).await.unwrap());
        assert!(matches!(
            store.read_post_image("gone.gif").await,
            Err(ServerError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.read_post_image("..%2Fsecret.gif").await,
            Err(ServerError::NotFound)
        ));
        assert!(matches!(
            store.read_post_image("../secret.gif").await,
            Err(ServerError::NotFound)
        ));
        assert!(store.delete("posts/../../x.gif").await.is_err());
    }
}
