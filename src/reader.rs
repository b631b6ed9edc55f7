use std::io;
use std::path::Path;

/// Reads whole files as text.
///
/// Used for both the trust-anchor file and the lease database, so tests can
/// serve either from memory. Closures of the right shape implement it.
pub trait FileReader {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// [`FileReader`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReader;

impl FileReader for FsReader {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

impl<F> FileReader for F
where
    F: Fn(&Path) -> io::Result<String>,
{
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self(path)
    }
}
