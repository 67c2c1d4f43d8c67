//! Byte sources for the reader
//!
//! Regular files are memory mapped when the `mmap` feature is on and the
//! caller asks for it; everything else goes through a buffered reader.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, StdinLock};
use std::path::Path;

#[cfg(feature = "mmap")]
use memmap2::{Mmap, MmapOptions};
#[cfg(feature = "mmap")]
use std::io::Cursor;

/// Input for an [`SddsReader`](crate::SddsReader) opened by path or on stdin
pub enum Source {
    #[cfg(feature = "mmap")]
    Mapped(Cursor<Mmap>),
    Buffered(BufReader<File>),
    Stdin(StdinLock<'static>),
}

impl Source {
    /// Open `path`, mapping it into memory when `use_mmap` is set
    ///
    /// Files that cannot be mapped, such as empty files or pipes, fall back
    /// to buffered reads.
    pub fn open<P: AsRef<Path>>(path: P, use_mmap: bool) -> io::Result<Self> {
        let file = File::open(path.as_ref())?;
        #[cfg(feature = "mmap")]
        if use_mmap && file.metadata().map(|m| m.is_file() && m.len() > 0).unwrap_or(false) {
            // SAFETY: the mapping is read-only and owned by the source; the
            // file must not be truncated by another process while it is open.
            match unsafe { MmapOptions::new().map(&file) } {
                Ok(mmap) => {
                    log::debug!("mapped {} ({} bytes)", path.as_ref().display(), mmap.len());
                    return Ok(Source::Mapped(Cursor::new(mmap)));
                }
                Err(err) => log::debug!("mmap of {} failed: {err}", path.as_ref().display()),
            }
        }
        #[cfg(not(feature = "mmap"))]
        let _ = use_mmap;
        Ok(Source::Buffered(BufReader::new(file)))
    }

    pub fn stdin() -> Self {
        Source::Stdin(io::stdin().lock())
    }

    pub fn is_mapped(&self) -> bool {
        #[cfg(feature = "mmap")]
        if let Source::Mapped(_) = self {
            return true;
        }
        false
    }
}

impl Read for Source {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            #[cfg(feature = "mmap")]
            Source::Mapped(cursor) => cursor.read(buf),
            Source::Buffered(reader) => reader.read(buf),
            Source::Stdin(stdin) => stdin.read(buf),
        }
    }
}

impl BufRead for Source {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            #[cfg(feature = "mmap")]
            Source::Mapped(cursor) => cursor.fill_buf(),
            Source::Buffered(reader) => reader.fill_buf(),
            Source::Stdin(stdin) => stdin.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            #[cfg(feature = "mmap")]
            Source::Mapped(cursor) => cursor.consume(amt),
            Source::Buffered(reader) => reader.consume(amt),
            Source::Stdin(stdin) => stdin.consume(amt),
        }
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            #[cfg(feature = "mmap")]
            Source::Mapped(_) => "mapped",
            Source::Buffered(_) => "buffered",
            Source::Stdin(_) => "stdin",
        };
        f.debug_tuple("Source").field(&kind).finish()
    }
}
