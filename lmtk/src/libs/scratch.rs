use std::path::{Path, PathBuf};

use crate::io::push_to_output;

/// Directory and filename prefix for the files handed to an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchSpace {
    pub dir: PathBuf,
    pub prefix: Option<String>,
    pub keep: bool,
}

impl Default for ScratchSpace {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir(),
            prefix: Some(format!("lmtk_{}", std::process::id())),
            keep: false,
        }
    }
}

impl ScratchSpace {
    pub fn new(dir: PathBuf, prefix: Option<String>) -> Self {
        Self {
            dir,
            prefix,
            keep: false,
        }
    }

    pub fn file(&self, name: &str, suffix: &str) -> ScratchFile {
        let mut path = self.dir.clone();
        push_to_output(&self.prefix, &mut path, name, suffix);
        ScratchFile {
            path,
            keep: self.keep,
        }
    }
}

/// Removes its file when dropped unless the scratch space keeps files
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    keep: bool,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if self.keep || !self.path.exists() {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!("Failed to remove scratch file {:?}: {e}", self.path);
        }
    }
}

#[cfg(test)]
#[rustfmt::skip]
mod tests {
    use super::*;

    #[test]
    fn removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let space = ScratchSpace::new(dir.path().to_path_buf(), Some("run".to_string()));
        let path = {
            let file = space.file("p1", "raw");
            std::fs::write(file.path(), "data").unwrap();
            assert!(file.path().exists());
            file.path().to_path_buf()
        };
        assert_eq!(path, dir.path().join("run_p1.raw"));
        assert!(!path.exists());
    }

    #[test]
    fn removed_on_error_path() {
        fn failing(space: &ScratchSpace) -> crate::error::Result<()> {
            let file = space.file("p2", "raw");
            std::fs::write(file.path(), "data")?;
            Err(crate::error::Error::engine("boom"))
        }
        let dir = tempfile::tempdir().unwrap();
        let space = ScratchSpace::new(dir.path().to_path_buf(), None);
        assert!(failing(&space).is_err());
        assert!(!dir.path().join("p2.raw").exists());
    }

    #[test]
    fn kept_on_request() {
        let dir = tempfile::tempdir().unwrap();
        let space = ScratchSpace { keep: true, ..ScratchSpace::new(dir.path().to_path_buf(), None) };
        {
            let file = space.file("p1", "raw");
            std::fs::write(file.path(), "data").unwrap();
        }
        assert!(dir.path().join("p1.raw").exists());
    }
}
