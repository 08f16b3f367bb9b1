//! Local disk adapter.
//!
//! A thin pass-through to `tokio::fs` below a base directory. The OS
//! provides real directories, so nothing is emulated here; the only logic is
//! mapping [`StoragePath`]s to host paths and io errors to the storage
//! taxonomy.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::{Error as IoError, ErrorKind};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio_util::sync::CancellationToken;

use super::traits::{
    ContentVisitor, DEFAULT_CONTENT_TYPE, DirectoryInfo, FileContent, FileInfo, StorageAdapter,
};
use super::{cancellable, ensure_active};
use crate::error::{Error, Result};
use crate::path::StoragePath;

/// Storage adapter over a local directory.
pub struct DiskAdapter {
    base: PathBuf,
}

/// Map an io error: `NotFound` keeps its meaning, anything else is a
/// provider failure.
fn map_io<'a>(path: &'a StoragePath, operation: &'static str) -> impl FnOnce(IoError) -> Error + 'a {
    move |err| match err.kind() {
        ErrorKind::NotFound => Error::not_found(path),
        _ => Error::provider(operation)(err),
    }
}

impl DiskAdapter {
    /// Create an adapter rooted at `base`. The directory is created on
    /// first write if missing.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Base directory on the host.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn resolve(&self, path: &StoragePath) -> PathBuf {
        let relative = path.normalized().trim_end_matches('/');
        if relative.is_empty() {
            self.base.clone()
        } else {
            self.base.join(relative)
        }
    }

    async fn metadata(&self, path: &StoragePath) -> Result<Option<std::fs::Metadata>> {
        match fs::metadata(self.resolve(path)).await {
            Ok(meta) => Ok(Some(meta)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::provider("metadata")(err)),
        }
    }

    async fn is_file(&self, path: &StoragePath) -> Result<bool> {
        Ok(self.metadata(path).await?.is_some_and(|meta| meta.is_file()))
    }

    /// The root counts as a directory even before the base directory exists.
    async fn is_dir(&self, path: &StoragePath) -> Result<bool> {
        let meta = self.metadata(path).await?;
        if path.is_root() {
            return Ok(meta.is_none_or(|meta| meta.is_dir()));
        }
        Ok(meta.is_some_and(|meta| meta.is_dir()))
    }

    async fn file_info(&self, path: &StoragePath) -> Result<FileInfo> {
        let meta = self
            .metadata(path)
            .await?
            .filter(|meta| meta.is_file())
            .ok_or_else(|| Error::not_found(path))?;
        Ok(FileInfo {
            path: path.clone(),
            size: meta.len(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    async fn create_parent(&self, path: &StoragePath) -> Result<()> {
        if let Some(parent) = self.resolve(path).parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(Error::provider("create_dir_all"))?;
        }
        Ok(())
    }

    async fn transfer_checks(
        &self,
        source: &StoragePath,
        destination: &StoragePath,
        overwrite: bool,
    ) -> Result<()> {
        if !self.is_file(source).await? {
            return Err(Error::not_found(source));
        }
        if !overwrite && self.is_file(destination).await? {
            return Err(Error::already_exists(destination));
        }
        self.create_parent(destination).await
    }

    async fn directory_transfer_checks(
        &self,
        source: &StoragePath,
        destination: &StoragePath,
    ) -> Result<()> {
        if !self.is_dir(source).await? {
            return Err(Error::not_found(source));
        }
        if self.metadata(destination).await?.is_some() {
            return Err(Error::already_exists(destination));
        }
        self.create_parent(destination).await
    }

    async fn copy_tree(&self, source: &StoragePath, destination: &StoragePath) -> Result<()> {
        let mut pending = vec![(self.resolve(source), self.resolve(destination))];
        while let Some((from, to)) = pending.pop() {
            fs::create_dir_all(&to)
                .await
                .map_err(Error::provider("create_dir_all"))?;
            let mut entries = fs::read_dir(&from)
                .await
                .map_err(Error::provider("read_dir"))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(Error::provider("read_dir"))?
            {
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(Error::provider("file_type"))?;
                let target = to.join(entry.file_name());
                if file_type.is_dir() {
                    pending.push((entry.path(), target));
                } else {
                    fs::copy(entry.path(), target)
                        .await
                        .map_err(Error::provider("copy"))?;
                }
            }
        }
        Ok(())
    }

    /// Entries of one directory, split into files and subdirectories, each
    /// sorted by name.
    async fn read_level(&self, dir: &StoragePath) -> Result<(Vec<StoragePath>, Vec<StoragePath>)> {
        let mut files = Vec::new();
        let mut directories = Vec::new();
        let mut entries = match fs::read_dir(self.resolve(dir)).await {
            Ok(entries) => entries,
            Err(err) if dir.is_root() && err.kind() == ErrorKind::NotFound => {
                return Ok((files, directories));
            }
            Err(err) => return Err(map_io(dir, "read_dir")(err)),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(Error::provider("read_dir"))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry
                .file_type()
                .await
                .map_err(Error::provider("file_type"))?
                .is_dir();
            let raw = if is_dir {
                format!("{}{}/", dir.normalized(), name)
            } else {
                format!("{}{}", dir.normalized(), name)
            };
            match StoragePath::parse(&raw) {
                Ok(path) if is_dir => directories.push(path),
                Ok(path) => files.push(path),
                Err(err) => tracing::warn!(entry = %raw, error = %err, "skipping disk entry"),
            }
        }
        files.sort();
        directories.sort();
        Ok((files, directories))
    }
}

#[async_trait]
impl StorageAdapter for DiskAdapter {
    async fn file_exists(&self, path: &StoragePath, cancel: &CancellationToken) -> Result<bool> {
        cancellable(cancel, self.is_file(path)).await
    }

    async fn get_file(&self, path: &StoragePath, cancel: &CancellationToken) -> Result<FileInfo> {
        cancellable(cancel, self.file_info(path)).await
    }

    async fn touch_file(
        &self,
        path: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<FileInfo> {
        cancellable(cancel, async {
            self.create_parent(path).await?;
            // Truncates an existing file.
            fs::File::create(self.resolve(path))
                .await
                .map_err(Error::provider("create"))?;
            self.file_info(path).await
        })
        .await
    }

    async fn read_file(
        &self,
        path: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<FileContent> {
        cancellable(cancel, async {
            let info = self.file_info(path).await?;
            let content = fs::read(self.resolve(path))
                .await
                .map_err(map_io(path, "read"))?;
            Ok(FileContent { info, content })
        })
        .await
    }

    async fn write_file(
        &self,
        path: &StoragePath,
        content: Vec<u8>,
        content_type: Option<&str>,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<FileInfo> {
        cancellable(cancel, async {
            if !overwrite && self.is_file(path).await? {
                return Err(Error::already_exists(path));
            }
            self.create_parent(path).await?;
            fs::write(self.resolve(path), &content)
                .await
                .map_err(Error::provider("write"))?;
            let mut info = self.file_info(path).await?;
            if let Some(content_type) = content_type {
                info.content_type = content_type.to_string();
            }
            Ok(info)
        })
        .await
    }

    async fn copy_file(
        &self,
        source: &StoragePath,
        destination: &StoragePath,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<FileInfo> {
        cancellable(cancel, async {
            self.transfer_checks(source, destination, overwrite).await?;
            fs::copy(self.resolve(source), self.resolve(destination))
                .await
                .map_err(map_io(source, "copy"))?;
            self.file_info(destination).await
        })
        .await
    }

    async fn move_file(
        &self,
        source: &StoragePath,
        destination: &StoragePath,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<FileInfo> {
        cancellable(cancel, async {
            self.transfer_checks(source, destination, overwrite).await?;
            fs::rename(self.resolve(source), self.resolve(destination))
                .await
                .map_err(map_io(source, "rename"))?;
            self.file_info(destination).await
        })
        .await
    }

    async fn delete_file(&self, path: &StoragePath, cancel: &CancellationToken) -> Result<()> {
        cancellable(cancel, async {
            if !self.is_file(path).await? {
                return Err(Error::not_found(path));
            }
            fs::remove_file(self.resolve(path))
                .await
                .map_err(map_io(path, "remove_file"))
        })
        .await
    }

    async fn directory_exists(
        &self,
        path: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        cancellable(cancel, self.is_dir(path)).await
    }

    async fn create_directory(
        &self,
        path: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<DirectoryInfo> {
        cancellable(cancel, async {
            // A file and a directory at the same location share one host path.
            if self.metadata(path).await?.is_some() {
                return Err(Error::already_exists(path));
            }
            fs::create_dir_all(self.resolve(path))
                .await
                .map_err(Error::provider("create_dir_all"))?;
            Ok(DirectoryInfo::new(path.clone()))
        })
        .await
    }

    async fn delete_directory(
        &self,
        path: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<()> {
        cancellable(cancel, async {
            if !self.is_dir(path).await? {
                return Err(Error::not_found(path));
            }
            let target = self.resolve(path);
            match fs::remove_dir_all(&target).await {
                Err(err) if path.is_root() && err.kind() == ErrorKind::NotFound => {}
                result => result.map_err(map_io(path, "remove_dir_all"))?,
            }
            if path.is_root() {
                fs::create_dir_all(&target)
                    .await
                    .map_err(Error::provider("create_dir_all"))?;
            }
            Ok(())
        })
        .await
    }

    async fn copy_directory(
        &self,
        source: &StoragePath,
        destination: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<DirectoryInfo> {
        cancellable(cancel, async {
            self.directory_transfer_checks(source, destination).await?;
            self.copy_tree(source, destination).await?;
            Ok(DirectoryInfo::new(destination.clone()))
        })
        .await
    }

    async fn move_directory(
        &self,
        source: &StoragePath,
        destination: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<DirectoryInfo> {
        cancellable(cancel, async {
            self.directory_transfer_checks(source, destination).await?;
            fs::rename(self.resolve(source), self.resolve(destination))
                .await
                .map_err(map_io(source, "rename"))?;
            Ok(DirectoryInfo::new(destination.clone()))
        })
        .await
    }

    async fn iterate_contents(
        &self,
        path: &StoragePath,
        visitor: &mut ContentVisitor<'_>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !cancellable(cancel, self.is_dir(path)).await? {
            return Err(Error::not_found(path));
        }

        // Pre-order walk: directory, its files, then each subdirectory.
        let mut pending = vec![path.clone()];
        while let Some(dir) = pending.pop() {
            ensure_active(cancel)?;
            if !dir.is_root() && visitor(dir.clone()).is_break() {
                return Ok(());
            }
            let (files, directories) = cancellable(cancel, self.read_level(&dir)).await?;
            for file in files {
                if let ControlFlow::Break(()) = visitor(file) {
                    return Ok(());
                }
            }
            pending.extend(directories.into_iter().rev());
        }
        Ok(())
    }

    async fn public_url(
        &self,
        path: &StoragePath,
        _expiry: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if !cancellable(cancel, self.is_file(path)).await? {
            return Err(Error::not_found(path));
        }
        let absolute =
            std::path::absolute(self.resolve(path)).map_err(Error::provider("public_url"))?;
        let url = url::Url::from_file_path(&absolute).map_err(|()| {
            Error::provider("public_url")(IoError::other(format!(
                "cannot express {} as a file url",
                absolute.display()
            )))
        })?;
        Ok(url.to_string())
    }
}
