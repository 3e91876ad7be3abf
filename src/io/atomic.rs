//! Scoped all-or-nothing file rewrite.
//!
//! A temp file is created next to the target. The caller writes the new
//! content through [`AtomicRewrite::writer`], then either
//!
//! - [`commit`](AtomicRewrite::commit)s, which renames the temp file over the
//!   target, or
//! - [`divert`](AtomicRewrite::divert)s, which keeps the partial content under
//!   another name and leaves the target untouched.
//!
//! Dropping the guard without either removes the temp file.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{CalibError, Result};

pub struct AtomicRewrite {
    target: PathBuf,
    out: BufWriter<NamedTempFile>,
}

impl AtomicRewrite {
    /// Start rewriting `target`. The temp file lives in the same directory so
    /// the final rename never crosses a filesystem.
    pub fn begin(target: &Path) -> Result<Self> {
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let temp = tempfile::Builder::new()
            .prefix(".magcal-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| CalibError::io(dir, e))?;
        Ok(Self {
            target: target.to_path_buf(),
            out: BufWriter::new(temp),
        })
    }

    pub fn writer(&mut self) -> &mut impl Write {
        &mut self.out
    }

    /// Replace the target with the written content.
    pub fn commit(self) -> Result<()> {
        let target = self.target.clone();
        let temp = self.finish()?;
        // Keep the original's permissions; the temp file is created 0600.
        if let Ok(meta) = fs::metadata(&target) {
            temp.as_file()
                .set_permissions(meta.permissions())
                .map_err(|e| CalibError::io(&target, e))?;
        }
        temp.persist(&target).map_err(|e| CalibError::io(&target, e.error))?;
        Ok(())
    }

    /// Keep the written content as `path` and leave the target untouched.
    pub fn divert(self, path: &Path) -> Result<()> {
        let temp = self.finish()?;
        temp.persist(path).map_err(|e| CalibError::io(path, e.error))?;
        Ok(())
    }

    fn finish(self) -> Result<NamedTempFile> {
        let temp = self
            .out
            .into_inner()
            .map_err(|e| CalibError::io(&self.target, e.into_error()))?;
        temp.as_file().sync_all().map_err(|e| CalibError::io(&self.target, e))?;
        Ok(temp)
    }
}

/// Write `content` to `path` through an [`AtomicRewrite`].
pub fn write_atomically(path: &Path, content: &str) -> Result<()> {
    let mut rewrite = AtomicRewrite::begin(path)?;
    rewrite
        .writer()
        .write_all(content.as_bytes())
        .map_err(|e| CalibError::io(path, e))?;
    rewrite.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn commit_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out00001.dat");
        fs::write(&target, "old\n").unwrap();

        let mut rw = AtomicRewrite::begin(&target).unwrap();
        writeln!(rw.writer(), "new").unwrap();
        rw.commit().unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "new\n");
        assert_eq!(dir_entries(dir.path()), vec!["out00001.dat"]);
    }

    #[test]
    fn drop_leaves_target_and_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out00002.dat");
        fs::write(&target, "old\n").unwrap();

        {
            let mut rw = AtomicRewrite::begin(&target).unwrap();
            writeln!(rw.writer(), "partial").unwrap();
        }

        assert_eq!(fs::read_to_string(&target).unwrap(), "old\n");
        assert_eq!(dir_entries(dir.path()), vec!["out00002.dat"]);
    }

    #[test]
    fn divert_keeps_partial_output_elsewhere() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out00003.dat");
        let debug = dir.path().join("out00003.dat.tmp_emergency_stop_debug");
        fs::write(&target, "old\n").unwrap();

        let mut rw = AtomicRewrite::begin(&target).unwrap();
        writeln!(rw.writer(), "partial").unwrap();
        rw.divert(&debug).unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "old\n");
        assert_eq!(fs::read_to_string(&debug).unwrap(), "partial\n");
    }

    #[test]
    fn write_atomically_creates_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("calib.txt_param");
        write_atomically(&target, "1 0 0 1 2.5\n").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "1 0 0 1 2.5\n");
    }
}
