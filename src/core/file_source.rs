use super::buffer_source::BufferSource;
use super::error::{SigError, SigResult};
use super::source::{Source, out_of_bounds};
use log::debug;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Files below this size are read into memory once at open time.
pub const BUFFERING_THRESHOLD: u64 = 64 * 1024;

enum Backing {
    /// Small file, slurped at open time
    Buffered(BufferSource),
    /// Large file, random-access reads against the handle
    Seekable { file: File, len: u64, pos: u64 },
}

/// A file-backed source.
///
/// Small files (below [`BUFFERING_THRESHOLD`]) are slurped into memory
/// once; larger files are served by seek-and-read against the handle.
/// The distinction is a policy of this type only, behavior is identical
/// either way.
pub struct FileSource {
    backing: Backing,
}

impl FileSource {
    /// Opens a PDF file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> SigResult<Self> {
        let file = File::open(path)?;
        Self::from_file(file)
    }

    /// Wraps an already-open read-only file handle.
    pub fn from_file(mut file: File) -> SigResult<Self> {
        let len = file.seek(SeekFrom::End(0))?;
        file.seek(SeekFrom::Start(0))?;

        let backing = if len < BUFFERING_THRESHOLD {
            debug!("slurping {} byte file into memory", len);
            let mut bytes = Vec::new();
            bytes.try_reserve_exact(len as usize)?;
            file.read_to_end(&mut bytes)?;
            if bytes.len() as u64 != len {
                return Err(SigError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "file shrank while reading",
                )));
            }
            Backing::Buffered(BufferSource::new(bytes))
        } else {
            Backing::Seekable { file, len, pos: 0 }
        };

        Ok(FileSource { backing })
    }
}

impl Source for FileSource {
    fn len(&self) -> u64 {
        match &self.backing {
            Backing::Buffered(buf) => buf.len(),
            Backing::Seekable { len, .. } => *len,
        }
    }

    fn pos(&self) -> u64 {
        match &self.backing {
            Backing::Buffered(buf) => buf.pos(),
            Backing::Seekable { pos, .. } => *pos,
        }
    }

    fn seek(&mut self, pos: u64) -> SigResult<()> {
        match &mut self.backing {
            Backing::Buffered(buf) => buf.seek(pos),
            Backing::Seekable { len, pos: cur, .. } => {
                if pos > *len {
                    return Err(out_of_bounds(pos, *len));
                }
                // The OS seek is deferred until the next read
                *cur = pos;
                Ok(())
            }
        }
    }

    fn read_byte(&mut self) -> SigResult<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> SigResult<()> {
        match &mut self.backing {
            Backing::Buffered(src) => src.read_exact(buf),
            Backing::Seekable { file, len, pos } => {
                let end = *pos + buf.len() as u64;
                if end > *len {
                    return Err(out_of_bounds(end, *len));
                }
                file.seek(SeekFrom::Start(*pos))?;
                file.read_exact(buf)?;
                *pos = end;
                Ok(())
            }
        }
    }
}
