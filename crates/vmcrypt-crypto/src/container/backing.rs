//! Byte storage underneath an encrypted container
//!
//! A container only needs positional reads and writes, a size query and a
//! flush. Seekable objects support all of them at any offset; sequential
//! streams only move forward and support one direction.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

pub trait Backing {
    /// Fill `buf` from `offset`. Returns fewer bytes only at end of data.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()>;

    /// Current size in bytes. For streams this is the known total length.
    fn len(&mut self) -> io::Result<u64>;

    fn is_empty(&mut self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    fn flush(&mut self) -> io::Result<()>;

    fn is_seekable(&self) -> bool;

    fn is_writable(&self) -> bool {
        true
    }
}

impl<B: Backing + ?Sized> Backing for &mut B {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_at(offset, buf)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        (**self).write_at(offset, data)
    }

    fn len(&mut self) -> io::Result<u64> {
        (**self).len()
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn is_seekable(&self) -> bool {
        (**self).is_seekable()
    }

    fn is_writable(&self) -> bool {
        (**self).is_writable()
    }
}

fn unsupported(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, what.to_string())
}

fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// In-memory storage, mostly for tests and small payloads.
#[derive(Debug, Default, Clone)]
pub struct MemoryBacking {
    data: Vec<u8>,
}

impl MemoryBacking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl Backing for MemoryBacking {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        let start = usize::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset exceeds memory"))?;
        let end = start
            .checked_add(data.len())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "offset overflow"))?;
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn len(&mut self) -> io::Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

/// Any `Read + Write + Seek` object, e.g. a [`File`] or a `Cursor<Vec<u8>>`.
#[derive(Debug)]
pub struct SeekableBacking<T> {
    inner: T,
}

pub type FileBacking = SeekableBacking<File>;

impl<T: Read + Write + Seek> SeekableBacking<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read + Write + Seek> Backing for SeekableBacking<T> {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.seek(SeekFrom::Start(offset))?;
        read_full(&mut self.inner, buf)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.inner.write_all(data)
    }

    fn len(&mut self) -> io::Result<u64> {
        self.inner.seek(SeekFrom::End(0))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

/// Forward-only reader with a caller-supplied total length.
///
/// Skipping ahead discards bytes; reading behind the position fails.
#[derive(Debug)]
pub struct StreamSource<R> {
    inner: R,
    position: u64,
    len: u64,
}

impl<R: Read> StreamSource<R> {
    pub fn new(inner: R, len: u64) -> Self {
        Self {
            inner,
            position: 0,
            len,
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Backing for StreamSource<R> {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset < self.position {
            return Err(unsupported("stream cannot read backwards"));
        }
        if offset > self.position {
            let gap = offset - self.position;
            let skipped = io::copy(&mut (&mut self.inner).take(gap), &mut io::sink())?;
            self.position += skipped;
            if skipped < gap {
                return Ok(0);
            }
        }
        let n = read_full(&mut self.inner, buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn write_at(&mut self, _offset: u64, _data: &[u8]) -> io::Result<()> {
        Err(unsupported("stream source is read-only"))
    }

    fn len(&mut self) -> io::Result<u64> {
        Ok(self.len)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn is_writable(&self) -> bool {
        false
    }
}

/// Append-only writer. Every write must land exactly at the current end.
#[derive(Debug)]
pub struct StreamSink<W> {
    inner: W,
    position: u64,
}

impl<W: Write> StreamSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Backing for StreamSink<W> {
    fn read_at(&mut self, _offset: u64, _buf: &mut [u8]) -> io::Result<usize> {
        Err(unsupported("stream sink is write-only"))
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        if offset != self.position {
            return Err(unsupported("stream sink only appends"));
        }
        self.inner.write_all(data)?;
        self.position += data.len() as u64;
        Ok(())
    }

    fn len(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    fn is_seekable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_memory_backing_extends_and_reads_short() {
        let mut mem = MemoryBacking::new();
        mem.write_at(4, b"abcd").unwrap();
        assert_eq!(mem.as_slice(), b"\0\0\0\0abcd");
        mem.write_at(6, b"XYZW").unwrap();
        assert_eq!(mem.len().unwrap(), 10);

        let mut buf = [0u8; 8];
        assert_eq!(mem.read_at(5, &mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"bXYZW");
        assert_eq!(mem.read_at(100, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_seekable_backing_over_cursor() {
        let mut backing = SeekableBacking::new(Cursor::new(Vec::new()));
        assert!(backing.is_empty().unwrap());
        backing.write_at(0, b"hello world").unwrap();
        backing.write_at(6, b"there").unwrap();

        let mut buf = [0u8; 11];
        assert_eq!(backing.read_at(0, &mut buf).unwrap(), 11);
        assert_eq!(&buf, b"hello there");
        assert_eq!(backing.len().unwrap(), 11);
        assert_eq!(backing.into_inner().into_inner(), b"hello there");
    }

    #[test]
    fn test_file_backing() {
        let file = tempfile::tempfile().unwrap();
        let mut backing = FileBacking::new(file);
        backing.write_at(0, &[7u8; 300]).unwrap();
        backing.flush().unwrap();

        let mut buf = [0u8; 400];
        assert_eq!(backing.read_at(100, &mut buf).unwrap(), 200);
        assert!(buf[..200].iter().all(|&b| b == 7));
    }

    #[test]
    fn test_stream_source_forward_only() {
        let data: Vec<u8> = (0u8..100).collect();
        let mut source = StreamSource::new(&data[..], 100);
        assert!(!source.is_seekable());
        assert!(!source.is_writable());

        let mut buf = [0u8; 10];
        assert_eq!(source.read_at(0, &mut buf).unwrap(), 10);
        assert_eq!(buf[0], 0);
        assert_eq!(source.read_at(50, &mut buf).unwrap(), 10);
        assert_eq!(buf[0], 50);

        let err = source.read_at(5, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);

        assert_eq!(source.read_at(95, &mut buf).unwrap(), 5);
        assert_eq!(source.read_at(200, &mut buf).unwrap(), 0);
        assert!(source.write_at(100, b"x").is_err());
    }

    #[test]
    fn test_stream_sink_append_only() {
        let mut sink = StreamSink::new(Vec::new());
        sink.write_at(0, b"abc").unwrap();
        sink.write_at(3, b"def").unwrap();
        assert_eq!(sink.len().unwrap(), 6);

        let err = sink.write_at(1, b"z").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        assert!(sink.read_at(0, &mut [0u8; 1]).is_err());
        assert_eq!(sink.into_inner(), b"abcdef");
    }
}
