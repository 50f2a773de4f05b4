//! Chunked encrypted container
//!
//! On-disk layout:
//! ```text
//! [64 bytes: header][leading padding][chunk 0][chunk 1]...[chunk N-1][trailing padding]
//! ```
//!
//! Every chunk is one whole-message encryption of
//! `[4 bytes: LE length, top bit = end of stream][payload][random filler]`
//! with the chunk id (8 bytes, LE) as associated data, so an authenticated
//! cipher rejects chunks moved to another position. Leading plus trailing
//! padding always adds up to one chunk width; the leading share is
//! derived from the header bytes under the DEK.
//!
//! Two buffers cache plaintext: the append chunk (the last one, still being
//! extended) and a current chunk for random access to everything before it.
//! A dirty current chunk is written back before another chunk is loaded.

pub mod backing;
pub mod header;

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use secrecy::SecretString;
use vmcrypt_core::config::ContainerConfig;
use vmcrypt_core::{CryptoError, CryptoResult};

use crate::context::CryptoContext;
use crate::secret::fill_random;

pub use backing::{Backing, FileBacking, MemoryBacking, SeekableBacking, StreamSink, StreamSource};
pub use header::{FileHeader, HEADER_SIZE, MAX_UNIT_SIZE};

/// Size of the per-chunk length word.
pub const LENGTH_SIZE: usize = 4;

/// Length-word flag marking the last chunk.
pub const EOS_FLAG: u32 = 0x8000_0000;

#[derive(Debug, Clone, Copy)]
struct Geometry {
    /// Encrypted chunk width.
    unit: usize,
    /// Payload bytes per chunk.
    payload: usize,
    /// Offset of chunk 0.
    data_start: u64,
}

impl Geometry {
    fn chunk_offset(&self, id: u64) -> u64 {
        self.data_start + id * self.unit as u64
    }

    /// Map a logical offset to (chunk id, offset within the chunk payload).
    fn locate(&self, pos: u64) -> (u64, usize) {
        let payload = self.payload as u64;
        (pos / payload, (pos % payload) as usize)
    }
}

#[derive(Debug)]
struct ChunkBuffer {
    id: u64,
    /// Always `Geometry::payload` bytes; only `..len` is meaningful.
    payload: Vec<u8>,
    len: usize,
    eos: bool,
    dirty: bool,
}

impl ChunkBuffer {
    fn empty(id: u64, payload: usize) -> CryptoResult<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(payload)?;
        buf.resize(payload, 0);
        Ok(Self {
            id,
            payload: buf,
            len: 0,
            eos: false,
            dirty: false,
        })
    }
}

fn seal_chunk<B: Backing>(
    ctx: &mut CryptoContext,
    backing: &mut B,
    geometry: &Geometry,
    chunk: &ChunkBuffer,
    eos: bool,
) -> CryptoResult<()> {
    let mut plain = Vec::new();
    plain.try_reserve_exact(LENGTH_SIZE + geometry.payload)?;
    let word = chunk.len as u32 | if eos { EOS_FLAG } else { 0 };
    plain.extend_from_slice(&word.to_le_bytes());
    plain.extend_from_slice(&chunk.payload[..chunk.len]);
    plain.resize(LENGTH_SIZE + geometry.payload, 0);
    fill_random(&mut plain[LENGTH_SIZE + chunk.len..]);

    let sealed = ctx.encrypt(None, &plain, &chunk.id.to_le_bytes())?;
    backing.write_at(geometry.chunk_offset(chunk.id), &sealed)?;
    tracing::debug!(chunk = chunk.id, eos, "sealed chunk");
    Ok(())
}

fn open_chunk<B: Backing>(
    ctx: &mut CryptoContext,
    backing: &mut B,
    geometry: &Geometry,
    id: u64,
) -> CryptoResult<ChunkBuffer> {
    let mut sealed = Vec::new();
    sealed.try_reserve_exact(geometry.unit)?;
    sealed.resize(geometry.unit, 0);
    let n = backing.read_at(geometry.chunk_offset(id), &mut sealed)?;
    if n < geometry.unit {
        return Err(CryptoError::Format(format!(
            "chunk {id} truncated: {n} of {} bytes",
            geometry.unit
        )));
    }

    let mut plain = ctx.decrypt(&sealed, &id.to_le_bytes())?;
    if plain.len() != LENGTH_SIZE + geometry.payload {
        return Err(CryptoError::Format(format!(
            "chunk {id} decrypted to {} bytes",
            plain.len()
        )));
    }
    let word = u32::from_le_bytes([plain[0], plain[1], plain[2], plain[3]]);
    let len = (word & !EOS_FLAG) as usize;
    if len > geometry.payload {
        return Err(CryptoError::Format(format!(
            "chunk {id} claims {len} payload bytes"
        )));
    }

    Ok(ChunkBuffer {
        id,
        payload: plain.split_off(LENGTH_SIZE),
        len,
        eos: word & EOS_FLAG != 0,
        dirty: false,
    })
}

/// An encrypted file of arbitrary length, accessed through its plaintext.
///
/// Dropping a container without [`close`](Self::close) still finishes it,
/// but any error is only logged.
pub struct EncryptedContainer<B: Backing> {
    /// `None` once closed.
    backing: Option<B>,
    ctx: CryptoContext,
    header: FileHeader,
    geometry: Geometry,
    leading: usize,
    seekable: bool,
    writable: bool,
    /// Logical payload size. Approximate for non-seekable sources until the
    /// last chunk has been read.
    payload_size: u64,
    position: u64,
    current: Option<ChunkBuffer>,
    append: ChunkBuffer,
    append_id: u64,
    /// Trailing padding must be (re)written on close.
    pad_end: bool,
}

impl<B: Backing> EncryptedContainer<B> {
    /// Start a new container in empty storage.
    ///
    /// `chunk_size` is the plaintext size of one chunk including the length
    /// word. The header and leading padding are written immediately.
    pub fn create(mut backing: B, ctx: CryptoContext, chunk_size: usize) -> CryptoResult<Self> {
        if !backing.is_writable() {
            return Err(CryptoError::InvalidOperation(
                "cannot create a container in read-only storage".into(),
            ));
        }
        if !backing.is_empty()? {
            return Err(CryptoError::InvalidArgument(
                "container storage must be empty".into(),
            ));
        }
        if chunk_size <= LENGTH_SIZE {
            return Err(CryptoError::InvalidArgument(format!(
                "chunk size {chunk_size} leaves no room for payload"
            )));
        }
        let unit = ctx.query_encrypted_size(chunk_size)?;
        if unit > MAX_UNIT_SIZE {
            return Err(CryptoError::InvalidArgument(format!(
                "chunk width {unit} exceeds {MAX_UNIT_SIZE} bytes"
            )));
        }

        let header = FileHeader::new(unit as u32);
        let raw = header.to_bytes();
        let leading = ctx.padding_split(unit, &raw)?;
        let mut padding = vec![0u8; leading];
        fill_random(&mut padding);

        backing.write_at(0, &raw)?;
        backing.write_at(HEADER_SIZE as u64, &padding)?;

        let geometry = Geometry {
            unit,
            payload: chunk_size - LENGTH_SIZE,
            data_start: (HEADER_SIZE + leading) as u64,
        };
        tracing::debug!(cipher = ctx.cipher().name, unit, "created encrypted container");

        let seekable = backing.is_seekable();
        Ok(Self {
            backing: Some(backing),
            append: ChunkBuffer::empty(0, geometry.payload)?,
            ctx,
            header,
            geometry,
            leading,
            seekable,
            writable: true,
            payload_size: 0,
            position: 0,
            current: None,
            append_id: 0,
            pad_end: true,
        })
    }

    /// Open an existing container.
    ///
    /// Seekable storage gets its exact size from the last chunk, which also
    /// becomes the append chunk. Streams only get an estimate from the
    /// chunk count.
    pub fn open(mut backing: B, mut ctx: CryptoContext) -> CryptoResult<Self> {
        let mut raw = [0u8; HEADER_SIZE];
        let n = backing.read_at(0, &mut raw)?;
        let header = FileHeader::parse(&raw[..n])?;

        let unit = header.unit_size as usize;
        let payload = ctx
            .query_decrypted_size(unit)?
            .checked_sub(LENGTH_SIZE)
            .filter(|&p| p > 0)
            .ok_or_else(|| {
                CryptoError::Format(format!(
                    "chunk width {unit} is too small for {}",
                    ctx.cipher().name
                ))
            })?;
        let leading = ctx.padding_split(unit, &raw)?;
        let geometry = Geometry {
            unit,
            payload,
            data_start: (HEADER_SIZE + leading) as u64,
        };

        let total = backing.len()?;
        let body = total
            .checked_sub(geometry.data_start + (unit - leading) as u64)
            .ok_or_else(|| {
                CryptoError::Format(format!("container of {total} bytes is truncated"))
            })?;
        let chunks = body.div_ceil(unit as u64);

        let seekable = backing.is_seekable();
        let (payload_size, append_id, append) = if !seekable {
            tracing::warn!(
                chunks,
                "size of a streamed container is approximate until its last chunk is read"
            );
            (
                chunks * payload as u64,
                chunks,
                ChunkBuffer::empty(chunks, payload)?,
            )
        } else if body % unit as u64 != 0 {
            return Err(CryptoError::Format(format!(
                "container body of {body} bytes is not a whole number of {unit}-byte chunks"
            )));
        } else if chunks == 0 {
            (0, 0, ChunkBuffer::empty(0, payload)?)
        } else {
            let last = chunks - 1;
            let chunk = open_chunk(&mut ctx, &mut backing, &geometry, last)?;
            if !chunk.eos {
                return Err(CryptoError::Format(format!(
                    "last chunk {last} has no end-of-stream marker"
                )));
            }
            (last * payload as u64 + chunk.len as u64, last, chunk)
        };

        tracing::debug!(
            cipher = ctx.cipher().name,
            unit,
            chunks,
            payload_size,
            "opened encrypted container"
        );

        let writable = backing.is_writable();
        Ok(Self {
            backing: Some(backing),
            ctx,
            header,
            geometry,
            leading,
            seekable,
            writable,
            payload_size,
            position: 0,
            current: None,
            append,
            append_id,
            pad_end: false,
        })
    }

    /// Logical payload size in bytes.
    pub fn len(&self) -> u64 {
        self.payload_size
    }

    pub fn is_empty(&self) -> bool {
        self.payload_size == 0
    }

    /// Cursor used by the `std::io` implementations.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Encrypted bytes per chunk.
    pub fn unit_size(&self) -> usize {
        self.geometry.unit
    }

    /// Payload bytes per chunk.
    pub fn chunk_payload(&self) -> usize {
        self.geometry.payload
    }

    /// Random bytes between the header and chunk 0.
    pub fn leading_padding(&self) -> usize {
        self.leading
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn is_seekable(&self) -> bool {
        self.seekable
    }

    pub fn context(&self) -> &CryptoContext {
        &self.ctx
    }

    /// Read up to `buf.len()` bytes at `offset`.
    ///
    /// Returns the number of bytes copied, which is short at the end of the
    /// payload. Starting at or past the end is `EndOfStream`.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> CryptoResult<usize> {
        self.ensure_open()?;
        if buf.is_empty() {
            return Ok(0);
        }
        if self.seekable && offset >= self.payload_size {
            return Err(CryptoError::EndOfStream);
        }

        let mut done = 0;
        while done < buf.len() {
            let pos = offset + done as u64;
            let (id, within) = self.geometry.locate(pos);
            if id > self.append_id {
                break;
            }
            let chunk = if id == self.append_id {
                &self.append
            } else {
                self.load_current(id)?;
                match &self.current {
                    Some(chunk) => chunk,
                    None => break,
                }
            };
            if within >= chunk.len {
                break;
            }

            let n = (chunk.len - within).min(buf.len() - done);
            buf[done..done + n].copy_from_slice(&chunk.payload[within..within + n]);
            done += n;

            if chunk.eos && within + n == chunk.len {
                let end = id * self.geometry.payload as u64 + chunk.len as u64;
                if !self.seekable && self.payload_size != end {
                    tracing::debug!(payload_size = end, "reached end of streamed container");
                    self.payload_size = end;
                }
                break;
            }
        }

        if done == 0 {
            return Err(CryptoError::EndOfStream);
        }
        Ok(done)
    }

    /// Write all of `data` at `offset`.
    ///
    /// Writing past the end first fills the gap with zeros. Streams only
    /// accept writes at or after the current end.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> CryptoResult<()> {
        self.ensure_open()?;
        if !self.writable {
            return Err(CryptoError::InvalidOperation("container is read-only".into()));
        }
        if !self.seekable && offset < self.payload_size {
            return Err(CryptoError::InvalidOperation(
                "streamed container can only be appended to".into(),
            ));
        }
        if data.is_empty() {
            return Ok(());
        }

        if offset > self.payload_size {
            let zeros = vec![0u8; self.geometry.payload];
            while self.payload_size < offset {
                let n = (offset - self.payload_size).min(zeros.len() as u64) as usize;
                self.write_span(self.payload_size, &zeros[..n])?;
            }
        }
        self.write_span(offset, data)
    }

    /// Copy `data` into chunk buffers. `offset` must not exceed the payload size.
    fn write_span(&mut self, offset: u64, data: &[u8]) -> CryptoResult<()> {
        let mut done = 0;
        while done < data.len() {
            let pos = offset + done as u64;
            let (id, within) = self.geometry.locate(pos);
            let n = (self.geometry.payload - within).min(data.len() - done);
            let piece = &data[done..done + n];

            if id > self.append_id {
                debug_assert_eq!(id, self.append_id + 1);
                debug_assert_eq!(self.append.len, self.geometry.payload);
                self.advance_append()?;
            }

            let chunk = if id == self.append_id {
                &mut self.append
            } else {
                self.load_current(id)?;
                match self.current.as_mut() {
                    Some(chunk) => chunk,
                    None => {
                        return Err(CryptoError::InvalidOperation(format!(
                            "chunk {id} is not loaded"
                        )))
                    }
                }
            };
            chunk.payload[within..within + n].copy_from_slice(piece);
            chunk.len = chunk.len.max(within + n);
            chunk.dirty = true;

            done += n;
            self.payload_size = self.payload_size.max(pos + n as u64);
        }
        Ok(())
    }

    /// Seal the full append chunk as an interior chunk and start the next one.
    fn advance_append(&mut self) -> CryptoResult<()> {
        let backing = self.backing.as_mut().ok_or(CryptoError::UseAfterClose)?;
        seal_chunk(&mut self.ctx, backing, &self.geometry, &self.append, false)?;
        self.append_id += 1;
        self.append = ChunkBuffer::empty(self.append_id, self.geometry.payload)?;
        self.pad_end = true;
        Ok(())
    }

    /// Make chunk `id` (which lies before the append chunk) the current chunk.
    fn load_current(&mut self, id: u64) -> CryptoResult<()> {
        if self.current.as_ref().is_some_and(|c| c.id == id) {
            return Ok(());
        }
        self.flush_current()?;

        let backing = self.backing.as_mut().ok_or(CryptoError::UseAfterClose)?;
        let chunk = open_chunk(&mut self.ctx, backing, &self.geometry, id)?;
        if !chunk.eos && chunk.len != self.geometry.payload {
            return Err(CryptoError::Format(format!(
                "interior chunk {id} holds only {} bytes",
                chunk.len
            )));
        }
        if chunk.eos && self.seekable {
            return Err(CryptoError::Format(format!(
                "chunk {id} is marked end-of-stream before the last chunk"
            )));
        }
        self.current = Some(chunk);
        Ok(())
    }

    fn flush_current(&mut self) -> CryptoResult<()> {
        let Some(chunk) = self.current.as_mut().filter(|c| c.dirty) else {
            return Ok(());
        };
        let backing = self.backing.as_mut().ok_or(CryptoError::UseAfterClose)?;
        seal_chunk(&mut self.ctx, backing, &self.geometry, chunk, false)?;
        chunk.dirty = false;
        Ok(())
    }

    /// Write out buffered chunks and flush the storage.
    ///
    /// On seekable storage this also seals the append chunk as the last
    /// chunk and writes the trailing padding, so the file is complete on
    /// disk. Later writes simply reseal it.
    pub fn flush_dirty(&mut self) -> CryptoResult<()> {
        self.ensure_open()?;
        self.flush_current()?;
        if self.seekable {
            self.seal_tail()?;
        }
        self.backing
            .as_mut()
            .ok_or(CryptoError::UseAfterClose)?
            .flush()?;
        Ok(())
    }

    fn seal_tail(&mut self) -> CryptoResult<()> {
        let backing = self.backing.as_mut().ok_or(CryptoError::UseAfterClose)?;
        if self.append.dirty {
            seal_chunk(&mut self.ctx, backing, &self.geometry, &self.append, true)?;
            self.append.dirty = false;
            self.pad_end = true;
        }
        if self.pad_end {
            let id = self.append_id + u64::from(self.append.len > 0);
            let mut padding = vec![0u8; self.geometry.unit - self.leading];
            fill_random(&mut padding);
            backing.write_at(self.geometry.chunk_offset(id), &padding)?;
            self.pad_end = false;
        }
        Ok(())
    }

    /// Move the cursor. Only seekable containers support this.
    pub fn seek_to(&mut self, pos: SeekFrom) -> CryptoResult<u64> {
        self.ensure_open()?;
        if !self.seekable {
            return Err(CryptoError::InvalidOperation(
                "streamed container cannot seek".into(),
            ));
        }
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(delta) => self.payload_size.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        self.position = target.ok_or_else(|| {
            CryptoError::InvalidArgument(format!("seek to {pos:?} is out of range"))
        })?;
        Ok(self.position)
    }

    fn ensure_open(&self) -> CryptoResult<()> {
        if self.backing.is_none() {
            return Err(CryptoError::UseAfterClose);
        }
        Ok(())
    }

    fn finish(&mut self) -> CryptoResult<()> {
        self.flush_current()?;
        self.seal_tail()?;
        self.backing
            .as_mut()
            .ok_or(CryptoError::UseAfterClose)?
            .flush()?;
        if !self.ctx.is_closed() {
            self.ctx.destroy()?;
        }
        Ok(())
    }

    /// Flush everything, write the trailing padding, wipe the DEK and hand
    /// back the storage.
    pub fn close(mut self) -> CryptoResult<B> {
        let result = self.finish();
        let backing = self.backing.take().ok_or(CryptoError::UseAfterClose)?;
        result.map(|()| backing)
    }
}

impl<B: Backing> Drop for EncryptedContainer<B> {
    fn drop(&mut self) {
        if self.backing.is_some() {
            if let Err(e) = self.finish() {
                tracing::warn!(error = %e, "failed to finish encrypted container on drop");
            }
        }
    }
}

impl<B: Backing> std::fmt::Debug for EncryptedContainer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedContainer")
            .field("cipher", &self.ctx.cipher().name)
            .field("unit", &self.geometry.unit)
            .field("len", &self.payload_size)
            .field("position", &self.position)
            .field("seekable", &self.seekable)
            .field("closed", &self.backing.is_none())
            .finish()
    }
}

impl<B: Backing> Read for EncryptedContainer<B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.read_at(self.position, buf) {
            Ok(n) => {
                self.position += n as u64;
                Ok(n)
            }
            Err(CryptoError::EndOfStream) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

impl<B: Backing> Write for EncryptedContainer<B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_at(self.position, buf)?;
        self.position += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.flush_dirty()?)
    }
}

impl<B: Backing> Seek for EncryptedContainer<B> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.seek_to(pos)?)
    }
}

impl<T: Read + Write + Seek> EncryptedContainer<SeekableBacking<T>> {
    /// Open `inner` as a container, or create one if it is empty.
    pub fn from_seekable(
        inner: T,
        keystore: &str,
        password: &SecretString,
        config: &ContainerConfig,
    ) -> CryptoResult<Self> {
        let mut backing = SeekableBacking::new(inner);
        let ctx = CryptoContext::load(keystore, password)?;
        if backing.is_empty()? {
            Self::create(backing, ctx, config.chunk_size)
        } else {
            Self::open(backing, ctx)
        }
    }
}

impl EncryptedContainer<FileBacking> {
    /// Open `file` as a container, or create one if it is empty.
    ///
    /// The file must be opened for both reading and writing.
    pub fn from_file(
        file: File,
        keystore: &str,
        password: &SecretString,
        config: &ContainerConfig,
    ) -> CryptoResult<Self> {
        Self::from_seekable(file, keystore, password, config)
    }
}

/// Encrypt into a sequential writer. Only appending writes are accepted.
pub fn encrypt_stream<W: Write>(
    sink: W,
    keystore: &str,
    password: &SecretString,
    config: &ContainerConfig,
) -> CryptoResult<EncryptedContainer<StreamSink<W>>> {
    let ctx = CryptoContext::load(keystore, password)?;
    EncryptedContainer::create(StreamSink::new(sink), ctx, config.chunk_size)
}

/// Decrypt from a sequential reader holding `len` bytes of container.
///
/// The payload size is an estimate until the final chunk is reached.
pub fn decrypt_stream<R: Read>(
    source: R,
    len: u64,
    keystore: &str,
    password: &SecretString,
) -> CryptoResult<EncryptedContainer<StreamSource<R>>> {
    let ctx = CryptoContext::load(keystore, password)?;
    EncryptedContainer::open(StreamSource::new(source, len), ctx)
}
