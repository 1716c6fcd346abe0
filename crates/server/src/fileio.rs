//! File collaborator for http file responses
//!
//! File serving goes through a narrow seam so the servicing path never
//! depends on `std::fs` directly: [`FileOpener`] resolves a path to a
//! [`FileSource`], which reports its total size and hands out sequential
//! fragments. [`StdFileOpener`] is the stock filesystem-backed implementation.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// An open file being issued down an http connection, one fragment at a time.
pub trait FileSource {
    /// Total length in bytes, fixed at open time and used for `Content-Length`.
    fn size(&self) -> u64;

    /// Reads the next fragment into `buf`, returning the byte count.
    fn read_fragment(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Resolves paths to open [`FileSource`]s.
pub trait FileOpener {
    fn open(&self, path: &Path) -> io::Result<Box<dyn FileSource>>;
}

/// [`FileOpener`] backed by the local filesystem.
#[derive(Debug, Default)]
pub struct StdFileOpener;

struct StdFileSource {
    file: File,
    len: u64,
}

impl FileSource for StdFileSource {
    fn size(&self) -> u64 {
        self.len
    }

    fn read_fragment(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl FileOpener for StdFileOpener {
    fn open(&self, path: &Path) -> io::Result<Box<dyn FileSource>> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Box::new(StdFileSource { file, len }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    #[test]
    fn test_open_reports_size() {
        let path = temp_file("micro_server_fileio_size.txt", b"hello world");
        let source = StdFileOpener.open(&path).unwrap();
        assert_eq!(source.size(), 11);
    }

    #[test]
    fn test_read_fragments_until_empty() {
        let path = temp_file("micro_server_fileio_frag.txt", b"abcdefgh");
        let mut source = StdFileOpener.open(&path).unwrap();

        let mut buf = [0u8; 5];
        let n = source.read_fragment(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"abcde");

        let n = source.read_fragment(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"fgh");

        assert_eq!(source.read_fragment(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = StdFileOpener.open(Path::new("/definitely/not/here.html")).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
