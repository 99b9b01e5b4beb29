//! Per-environment output directory on the local filesystem

use controller::client::OutputDir;
use controller::{Error, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// [`OutputDir`] rooted at `<output>/<environment>`
///
/// Paths are relative to the root and may not leave it.
pub struct LocalOutputDir {
    root: PathBuf,
}

impl LocalOutputDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative: &Path) -> Result<PathBuf> {
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || relative.as_os_str().is_empty() {
            return Err(Error::Other(format!(
                "{} is not a path inside the output directory",
                relative.display()
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl OutputDir for LocalOutputDir {
    fn exists(&self, relative: &Path) -> bool {
        self.resolve(relative).is_ok_and(|path| path.exists())
    }

    fn read(&self, relative: &Path) -> Result<Vec<u8>> {
        let path = self.resolve(relative)?;
        fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::not_found(path.display().to_string())
            } else {
                Error::Io(e)
            }
        })
    }

    fn write(&self, relative: &Path, contents: &[u8]) -> Result<()> {
        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        log::debug!("Wrote {}", path.display());
        Ok(())
    }

    fn remove(&self, relative: &Path) -> Result<()> {
        let path = self.resolve(relative)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("Removed {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}
