use crate::error::{BrcError, Result};
use memmap2::Mmap;
use std::fs::{self, File};
use std::path::Path;

pub fn open_input(path: impl AsRef<Path>) -> Result<File> {
    let path = path.as_ref();
    File::open(path).map_err(|e| BrcError::io(format!("open input {}", path.display()), e))
}

/// Map the input read-only. Empty files are not mapped and yield `None`.
pub fn map_input(path: impl AsRef<Path>) -> Result<Option<Mmap>> {
    let path = path.as_ref();
    let file = open_input(path)?;
    let len = file.metadata().map_err(|e| BrcError::io(format!("stat {}", path.display()), e))?.len();
    if len == 0 {
        return Ok(None);
    }
    // SAFETY: the input is treated as read-only for the whole run
    let map = unsafe { Mmap::map(&file) }.map_err(|e| BrcError::io(format!("mmap {}", path.display()), e))?;
    Ok(Some(map))
}

/// Overwrite `path` with the raw bytes of a chunk that failed to parse.
pub fn dump_chunk(path: impl AsRef<Path>, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, bytes)
}
