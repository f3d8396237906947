/*!
    File-backed data source.
*/

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use log::debug;

use capture_types::Result;

use crate::data_source::DataSource;

/**
    A [`DataSource`] reading from a regular file. Always seekable; the size
    is cached at open time.
*/
pub struct FileSource {
    file: File,
    path: PathBuf,
    size: u64,
}

impl FileSource {
    /**
        Open a file for reading.
    */
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let size = file.metadata()?.len();
        debug!("opened file source {:?} ({} bytes)", path, size);
        Ok(Self { file, path, size })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSource for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.file.read(buf)?)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        Ok(self.file.seek(pos)?)
    }

    fn size(&self) -> Option<u64> {
        Some(self.size)
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn reads_sequentially_until_eof() {
        let f = temp_file(b"hello world");
        let mut source = FileSource::open(f.path()).unwrap();

        let mut buf = [0u8; 5];
        assert_eq!(source.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");

        let mut rest = [0u8; 16];
        assert_eq!(source.read(&mut rest).unwrap(), 6);
        assert_eq!(source.read(&mut rest).unwrap(), 0); // EOF
    }

    #[test]
    fn reports_size_and_seekability() {
        let f = temp_file(b"0123456789");
        let mut source = FileSource::open(f.path()).unwrap();
        assert!(source.is_seekable());
        assert_eq!(source.size(), Some(10));

        assert_eq!(source.seek(SeekFrom::End(-2)).unwrap(), 8);
        let mut buf = [0u8; 4];
        assert_eq!(source.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"89");
    }

    #[test]
    fn open_missing_file_fails() {
        assert!(FileSource::open("/definitely/not/here.mp4").is_err());
    }
}
