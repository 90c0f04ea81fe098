//! The `scanfix open` command: show corrected scans in the file manager.

use anyhow::Context;
use clap::Args;
use scanfix_core::FileConfigStore;
use std::path::{Path, PathBuf};

/// Opens a path in the platform file manager.
pub trait FileManager {
    fn open(&self, path: &Path) -> std::io::Result<()>;
}

/// Uses the desktop's default handler via the `open` crate.
pub struct SystemFileManager;

impl FileManager for SystemFileManager {
    fn open(&self, path: &Path) -> std::io::Result<()> {
        open::that(path)
    }
}

/// Arguments for the `open` command.
#[derive(Args, Debug)]
pub struct OpenArgs {
    /// Folder to open (defaults to the configured output directory)
    pub path: Option<PathBuf>,
}

/// Execute the open command.
pub async fn execute(args: OpenArgs, config_path: &Path) -> anyhow::Result<()> {
    let target = match args.path {
        Some(path) => path,
        None => FileConfigStore::open(config_path)?
            .config()
            .full_output_dir()
            .context("No watch directory configured; pass a folder to open")?,
    };
    reveal(&SystemFileManager, &target)
}

fn reveal(file_manager: &dyn FileManager, path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("{} does not exist yet", path.display());
    }
    file_manager
        .open(path)
        .with_context(|| format!("Cannot open {}", path.display()))?;
    tracing::info!("Opened {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingFileManager {
        opened: RefCell<Vec<PathBuf>>,
    }

    impl FileManager for RecordingFileManager {
        fn open(&self, path: &Path) -> std::io::Result<()> {
            self.opened.borrow_mut().push(path.to_path_buf());
            Ok(())
        }
    }

    #[test]
    fn reveal_opens_existing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let fm = RecordingFileManager::default();

        reveal(&fm, dir.path()).unwrap();
        assert_eq!(fm.opened.borrow().as_slice(), [dir.path().to_path_buf()]);
    }

    #[test]
    fn reveal_rejects_missing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let fm = RecordingFileManager::default();

        assert!(reveal(&fm, &dir.path().join("fixed")).is_err());
        assert!(fm.opened.borrow().is_empty());
    }

    #[tokio::test]
    async fn execute_without_watch_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = execute(OpenArgs { path: None }, &dir.path().join("config.toml"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No watch directory"));
    }
}
