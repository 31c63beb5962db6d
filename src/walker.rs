//! Lazy, depth-first enumeration of files below a directory.
//!
//! Directories are listed only when the walk reaches them, using an explicit
//! stack of pending listings rather than recursion. Entries of one directory
//! are visited in file-name order, so a walk over an unchanged tree always
//! produces the same sequence. Symbolic links to files are yielded; links to
//! directories are not followed.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

/// Iterator over the files below a root directory.
#[derive(Debug, Clone)]
pub struct FileWalker {
    root: PathBuf,
    extension: Option<String>,
    started: bool,
    stack: Vec<std::vec::IntoIter<PathBuf>>,
}

impl FileWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: None,
            started: false,
            stack: Vec::new(),
        }
    }

    /// Only yield files whose extension matches `extension` (case-insensitive).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start over from the root.
    pub fn restart(&mut self) {
        self.started = false;
        self.stack.clear();
    }

    fn matches(&self, path: &Path) -> bool {
        match &self.extension {
            None => true,
            Some(wanted) => path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(wanted)),
        }
    }

    fn list(dir: &Path) -> Option<std::vec::IntoIter<PathBuf>> {
        match fs::read_dir(dir) {
            Ok(entries) => {
                let mut paths: Vec<PathBuf> = entries
                    .filter_map(|entry| match entry {
                        Ok(entry) => Some(entry.path()),
                        Err(e) => {
                            warn!("[FileWalker] Cannot read entry in {}: {}", dir.display(), e);
                            None
                        }
                    })
                    .collect();
                paths.sort();
                Some(paths.into_iter())
            }
            Err(e) => {
                warn!("[FileWalker] Cannot list {}: {}", dir.display(), e);
                None
            }
        }
    }
}

impl Iterator for FileWalker {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        if !self.started {
            self.started = true;
            if self.root.is_file() {
                return self.matches(&self.root).then(|| self.root.clone());
            }
            self.stack.extend(Self::list(&self.root));
        }

        while let Some(listing) = self.stack.last_mut() {
            let Some(path) = listing.next() else {
                self.stack.pop();
                continue;
            };
            let file_type = match fs::symlink_metadata(&path) {
                Ok(meta) => meta.file_type(),
                Err(e) => {
                    warn!("[FileWalker] Cannot stat {}: {}", path.display(), e);
                    continue;
                }
            };
            if file_type.is_dir() {
                self.stack.extend(Self::list(&path));
            } else if file_type.is_symlink() && path.is_dir() {
                debug!("[FileWalker] Not following directory link {}", path.display());
            } else if self.matches(&path) {
                return Some(path);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn relative(root: &Path, paths: Vec<PathBuf>) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_depth_first_in_name_order() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "b.json");
        touch(temp.path(), "a/2.json");
        touch(temp.path(), "a/1.json");
        touch(temp.path(), "a/sub/0.json");
        touch(temp.path(), "c.json");

        let files: Vec<_> = FileWalker::new(temp.path()).collect();
        assert_eq!(
            relative(temp.path(), files),
            vec!["a/1.json", "a/2.json", "a/sub/0.json", "b.json", "c.json"]
        );
    }

    #[test]
    fn test_extension_filter() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "run.GPX");
        touch(temp.path(), "notes.txt");
        touch(temp.path(), "x/ride.gpx");

        let files: Vec<_> = FileWalker::new(temp.path()).with_extension("gpx").collect();
        assert_eq!(relative(temp.path(), files), vec!["run.GPX", "x/ride.gpx"]);
    }

    #[test]
    fn test_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let mut walker = FileWalker::new(temp.path().join("nope"));
        assert!(walker.next().is_none());
    }

    #[test]
    fn test_restart_replays_sequence() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "1.json");
        touch(temp.path(), "2.json");

        let mut walker = FileWalker::new(temp.path());
        let first: Vec<_> = walker.by_ref().collect();
        assert!(walker.next().is_none());
        walker.restart();
        let second: Vec<_> = walker.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_single_file_root() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "only.json");
        let files: Vec<_> = FileWalker::new(temp.path().join("only.json")).collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    #[cfg(unix)]
    fn test_directory_links_are_not_followed() {
        use std::os::unix::fs::symlink;

        let temp = TempDir::new().unwrap();
        touch(temp.path(), "a/1.json");
        touch(temp.path(), "target.json");
        symlink(temp.path(), temp.path().join("a/loop")).unwrap();
        symlink(temp.path().join("target.json"), temp.path().join("a/link.json")).unwrap();

        let files: Vec<_> = FileWalker::new(temp.path()).with_extension("json").collect();
        assert_eq!(
            relative(temp.path(), files),
            vec!["a/1.json", "a/link.json", "target.json"]
        );
    }
}
