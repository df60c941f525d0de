//! Load text sources as immutable byte buffers.
//!
//! The counting engine never touches storage itself; it receives buffers from
//! this crate. Callers choose at runtime between memory-mapping each file and
//! reading it into an owned buffer via [`LoadMode`]. Either way the result is
//! a [`SourceBuffer`] that derefs to `&[u8]` and is read-only for its lifetime.
//!
//! # Example
//! ```no_run
//! use wordfreq_source::{LoadMode, SourceFile};
//!
//! # fn main() -> anyhow::Result<()> {
//! let source = SourceFile::new("paper1", LoadMode::Mmap);
//! let buffer = source.load()?;
//! println!("{} is {} bytes", source.display_name(), buffer.len());
//! # Ok(()) }
//! ```

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use memmap2::Mmap;

/// File names the classic benchmark run counts when no files are given.
pub const DEFAULT_CORPUS: [&str; 7] = [
    "bib", "paper1", "paper2", "progc", "progl", "progp", "trans",
];

/// Strategy for loading source files.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LoadMode {
    /// Memory-map the file (fast, zero-copy).
    #[default]
    Mmap,
    /// Read the file into an owned buffer (portable fallback).
    Owned,
}

impl LoadMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadMode::Mmap => "mmap",
            LoadMode::Owned => "owned",
        }
    }
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadMode {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "mmap" => Ok(LoadMode::Mmap),
            "owned" => Ok(LoadMode::Owned),
            other => anyhow::bail!("unknown load mode {other:?} (expected mmap or owned)"),
        }
    }
}

enum Buffer {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

/// Immutable bytes of one loaded source.
pub struct SourceBuffer {
    inner: Buffer,
}

impl SourceBuffer {
    pub fn as_slice(&self) -> &[u8] {
        match &self.inner {
            Buffer::Mmap(m) => m.as_ref(),
            Buffer::Owned(v) => v.as_slice(),
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self.inner, Buffer::Mmap(_))
    }
}

impl Deref for SourceBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsRef<[u8]> for SourceBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for SourceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceBuffer")
            .field("len", &self.len())
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

/// A file on disk plus the strategy used to load it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SourceFile {
    path: PathBuf,
    mode: LoadMode,
    name: String,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, mode: LoadMode) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self { path, mode, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> LoadMode {
        self.mode
    }

    /// Name used in logs and error messages.
    pub fn display_name(&self) -> &str {
        &self.name
    }

    pub fn load(&self) -> Result<SourceBuffer> {
        load_file(&self.path, self.mode)
    }
}

/// Build [`SourceFile`]s for `paths`, falling back to [`DEFAULT_CORPUS`] in
/// the current directory when `paths` is empty.
pub fn source_files(paths: &[PathBuf], mode: LoadMode) -> Vec<SourceFile> {
    if paths.is_empty() {
        return DEFAULT_CORPUS
            .iter()
            .map(|name| SourceFile::new(Path::new(".").join(name), mode))
            .collect();
    }
    paths
        .iter()
        .map(|path| SourceFile::new(path.clone(), mode))
        .collect()
}

/// Load one file with the requested strategy.
///
/// Zero-length files always come back as an empty owned buffer.
pub fn load_file(path: impl AsRef<Path>, mode: LoadMode) -> Result<SourceBuffer> {
    let path = path.as_ref();
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let len = file
        .metadata()
        .with_context(|| format!("stat {}", path.display()))?
        .len();
    if len == 0 {
        return Ok(SourceBuffer {
            inner: Buffer::Owned(Vec::new()),
        });
    }

    let inner = match mode {
        LoadMode::Mmap => {
            let map = unsafe { Mmap::map(&file) }
                .with_context(|| format!("mmap {}", path.display()))?;
            Buffer::Mmap(map)
        }
        LoadMode::Owned => {
            let mut buf = Vec::with_capacity(len as usize);
            file.read_to_end(&mut buf)
                .with_context(|| format!("read {}", path.display()))?;
            Buffer::Owned(buf)
        }
    };
    Ok(SourceBuffer { inner })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_load_modes() {
        assert_eq!("mmap".parse::<LoadMode>().unwrap(), LoadMode::Mmap);
        assert_eq!("OWNED".parse::<LoadMode>().unwrap(), LoadMode::Owned);
        assert!("mapped".parse::<LoadMode>().is_err());
    }

    #[test]
    fn empty_path_list_uses_default_corpus() {
        let files = source_files(&[], LoadMode::Owned);
        assert_eq!(files.len(), DEFAULT_CORPUS.len());
        assert!(files[0].path().ends_with("bib"));
        assert!(files.iter().all(|f| f.mode() == LoadMode::Owned));
    }
}
