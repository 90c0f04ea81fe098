//! File discovery for batch runs over a scan directory.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::codec::is_supported;

/// Information about a discovered file.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Full path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

/// Finds supported images directly inside a directory.
pub struct FileDiscovery;

impl FileDiscovery {
    /// Discover all supported image files at a path.
    ///
    /// If path is a file, returns it if supported. If path is a directory,
    /// returns the supported files it contains; subdirectories (including the
    /// output directory) are not descended into.
    pub fn discover(path: &Path) -> Vec<DiscoveredFile> {
        if path.is_file() {
            if is_supported(path) {
                if let Ok(meta) = std::fs::metadata(path) {
                    return vec![DiscoveredFile {
                        path: path.to_path_buf(),
                        size: meta.len(),
                    }];
                }
            }
            return vec![];
        }

        let mut files: Vec<DiscoveredFile> = WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|entry| entry.file_type().is_file() && is_supported(entry.path()))
            .filter_map(|entry| {
                let size = entry.metadata().ok()?.len();
                Some(DiscoveredFile {
                    path: entry.into_path(),
                    size,
                })
            })
            .collect();

        // Sort by path for deterministic ordering
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    /// Get total size of all discovered files.
    pub fn total_size(files: &[DiscoveredFile]) -> u64 {
        files.iter().map(|f| f.size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.TIF", "a.jpg", "notes.txt", "c.png"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let fixed = dir.path().join("fixed");
        std::fs::create_dir(&fixed).unwrap();
        std::fs::write(fixed.join("old.jpg"), b"x").unwrap();

        let files = FileDiscovery::discover(dir.path());
        let names: Vec<_> = files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.TIF"]);
    }

    #[test]
    fn test_discover_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.jpeg");
        std::fs::write(&path, b"12345").unwrap();

        let files = FileDiscovery::discover(&path);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].size, 5);

        let txt = dir.path().join("readme.txt");
        std::fs::write(&txt, b"x").unwrap();
        assert!(FileDiscovery::discover(&txt).is_empty());
    }

    #[test]
    fn test_total_size() {
        let files = vec![
            DiscoveredFile {
                path: PathBuf::from("a.jpg"),
                size: 100,
            },
            DiscoveredFile {
                path: PathBuf::from("b.tif"),
                size: 200,
            },
        ];

        assert_eq!(FileDiscovery::total_size(&files), 300);
    }
}
