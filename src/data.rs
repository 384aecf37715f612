//! Rinse - Upload sources
//!
//! An [`Upload`] is the raw byte stream handed to the loader: a
//! memory-mapped file, a stdin buffer, or bytes received over the wire.
//! Each upload carries a fingerprint so a session can tell a new file from
//! the one it already holds.

use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Storage backend for the upload bytes
enum UploadStorage {
    /// Memory-mapped file
    Mmap(Mmap),
    /// In-memory buffer (stdin or network payloads)
    InMemory(Vec<u8>),
}

impl UploadStorage {
    fn as_bytes(&self) -> &[u8] {
        match self {
            UploadStorage::Mmap(m) => m.as_ref(),
            UploadStorage::InMemory(v) => v.as_slice(),
        }
    }
}

/// Raw uploaded file
pub struct Upload {
    storage: UploadStorage,
    /// Display name (file path, `<stdin>`, or a caller-supplied name)
    pub name: String,
}

impl Upload {
    /// Memory-map a file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let file = File::open(path_ref)
            .with_context(|| format!("Failed to open file: {}", path_ref.display()))?;

        // Zero-length files cannot be mapped on every platform
        let len = file.metadata()?.len();
        let storage = if len == 0 {
            UploadStorage::InMemory(Vec::new())
        } else {
            let mmap = unsafe { Mmap::map(&file)? };
            UploadStorage::Mmap(mmap)
        };

        Ok(Self {
            storage,
            name: path_ref.display().to_string(),
        })
    }

    /// Read the whole of stdin: `cat data.csv | rinse clean -`
    pub fn from_stdin() -> Result<Self> {
        let mut buffer = Vec::new();
        io::stdin()
            .lock()
            .read_to_end(&mut buffer)
            .context("Failed to read from stdin")?;
        Ok(Self::from_bytes("<stdin>", buffer))
    }

    /// Wrap bytes that are already in memory.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            storage: UploadStorage::InMemory(bytes),
            name: name.into(),
        }
    }

    /// Open `path`, or stdin when `path` is `-`.
    pub fn from_arg(path: &str) -> Result<Self> {
        if path == "-" {
            Self::from_stdin()
        } else {
            Self::open(path)
        }
    }

    pub fn bytes(&self) -> &[u8] {
        self.storage.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identity of this upload: FNV-1a over the name and the content.
    pub fn fingerprint(&self) -> u64 {
        let h = fnv1a(FNV_OFFSET, self.name.as_bytes());
        // Separator so ("ab", "c") and ("a", "bc") differ
        let h = fnv1a(h, &[0xff]);
        fnv1a(h, self.bytes())
    }

    /// Formatted size string
    pub fn size_human(&self) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        let size = self.len() as u64;
        if size >= GB {
            format!("{:.2} GB", size as f64 / GB as f64)
        } else if size >= MB {
            format!("{:.2} MB", size as f64 / MB as f64)
        } else if size >= KB {
            format!("{:.2} KB", size as f64 / KB as f64)
        } else {
            format!("{} B", size)
        }
    }
}

pub(crate) const FNV_OFFSET: u64 = 0xcbf29ce484222325;

/// FNV-1a 64-bit, continuing from `h`.
#[inline(always)]
pub(crate) fn fnv1a(mut h: u64, data: &[u8]) -> u64 {
    for &b in data {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}
