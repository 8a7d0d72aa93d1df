// Direct positioned reads over an OS file handle (spec §4.1, layer 1).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use super::ByteSource;
use crate::util::status::{Fault, FaultKind};

/// Owns the OS file handle for one logical file's byte source (spec §5:
/// acquired in the constructor, released deterministically on close).
pub struct RawFile {
    file: File,
    len: u64,
}

impl RawFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Fault> {
        let file = File::open(path.as_ref()).map_err(|e| {
            Fault::new(
                FaultKind::EnvelopeNotFound,
                Some(format!("could not open '{}': {}", path.as_ref().display(), e)),
            )
        })?;
        let len = file
            .metadata()
            .map_err(|e| Fault::new(FaultKind::Truncated, Some(e.to_string())))?
            .len();
        Ok(Self { file, len })
    }

    pub fn len(&self) -> u64 {
        self.len
    }
}

impl ByteSource for RawFile {
    fn seek(&mut self, abs: u64) -> Result<(), Fault> {
        self.file
            .seek(SeekFrom::Start(abs))
            .map_err(|e| Fault::new(FaultKind::Truncated, Some(e.to_string())))?;
        Ok(())
    }

    fn read(&mut self, n: usize) -> Result<Vec<u8>, Fault> {
        let mut buf = vec![0u8; n];
        let mut filled = 0;
        while filled < n {
            let read = self
                .file
                .read(&mut buf[filled..])
                .map_err(|e| Fault::new(FaultKind::Truncated, Some(e.to_string())))?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        buf.truncate(filled);
        Ok(buf)
    }

    fn ptell(&mut self) -> Result<u64, Fault> {
        self.file
            .stream_position()
            .map_err(|e| Fault::new(FaultKind::Truncated, Some(e.to_string())))
    }

    fn eof(&mut self) -> Result<bool, Fault> {
        Ok(self.ptell()? >= self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_and_seeks() {
        let mut path = std::env::temp_dir();
        path.push(format!("dlis_rawfile_test_{}", std::process::id()));
        {
            let mut f = File::create(&path).unwrap();
            f.write_all(b"0123456789").unwrap();
        }
        let mut raw = RawFile::open(&path).unwrap();
        assert_eq!(raw.read(4).unwrap(), b"0123");
        raw.seek(8).unwrap();
        assert_eq!(raw.read(4).unwrap(), b"89");
        assert!(raw.eof().unwrap());
        std::fs::remove_file(&path).ok();
    }
}
