use crate::core::interfaces::FileSystemService;
use crate::utils::{DuplexError, Result};
use std::path::Path;
use tokio::fs;

pub struct TokioFileSystemService;

#[async_trait::async_trait]
impl FileSystemService for TokioFileSystemService {
    async fn read_file(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).await.map_err(DuplexError::Io)
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            self.create_directory(parent).await?;
        }

        fs::write(path, content).await.map_err(DuplexError::Io)
    }

    async fn create_directory(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).await.map_err(DuplexError::Io)
    }

    async fn remove_directory(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        fs::remove_dir_all(path).await.map_err(DuplexError::Io)
    }

    async fn copy_directory(&self, from: &Path, to: &Path) -> Result<usize> {
        let mut copied = 0;
        let mut pending = vec![(from.to_path_buf(), to.to_path_buf())];

        while let Some((src_dir, dst_dir)) = pending.pop() {
            fs::create_dir_all(&dst_dir).await.map_err(DuplexError::Io)?;
            let mut entries = fs::read_dir(&src_dir).await.map_err(DuplexError::Io)?;

            while let Some(entry) = entries.next_entry().await.map_err(DuplexError::Io)? {
                let src = entry.path();
                let dst = dst_dir.join(entry.file_name());
                let file_type = entry.file_type().await.map_err(DuplexError::Io)?;

                if file_type.is_dir() {
                    pending.push((src, dst));
                } else if file_type.is_file() {
                    fs::copy(&src, &dst).await.map_err(DuplexError::Io)?;
                    copied += 1;
                }
            }
        }

        Ok(copied)
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn dir_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }
}
