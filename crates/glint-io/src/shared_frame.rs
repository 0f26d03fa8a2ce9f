//! Fixed-size frame block shared between a worker and its device writer.
//!
//! One file per device, preferably on a tmpfs such as `/dev/shm`. Only a
//! small `Show { seq }` token travels through the message queue; the pixels
//! go through this block.
//!
//! ## Layout
//!
//! ```text
//! offset  size  field
//! 0       4     magic "GLNT"
//! 4       4     pixels (u32 LE)
//! 8       4     rows   (u32 LE)
//! 12      4     reserved
//! 16      8     begin  (u64 LE)  sequence of the write in progress
//! 24      8     end    (u64 LE)  sequence of the last completed write
//! 32      12*N  red, green, blue rows of f32 LE
//! ```
//!
//! A writer stores `begin`, then the payload, then `end`. A reader loads
//! `end`, the payload and then `begin`; the copy is consistent when the two
//! match.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use glint_core::{OutputSize, PixelBuffer};

use crate::{DeviceError, Result};

const MAGIC: &[u8; 4] = b"GLNT";

/// Bytes before the pixel payload.
pub const HEADER_LEN: u64 = 32;

const BEGIN_OFFSET: u64 = 16;
const END_OFFSET: u64 = 24;

/// Read attempts before giving up with [`DeviceError::TornFrame`].
const READ_ATTEMPTS: usize = 8;

/// Handle on a shared frame block.
///
/// The creating handle owns the file and removes it on drop; handles from
/// [`SharedFrame::open`] leave it in place.
#[derive(Debug)]
pub struct SharedFrame {
    file: File,
    path: PathBuf,
    size: OutputSize,
    owner: bool,
}

impl SharedFrame {
    /// Create (or truncate) a block for `size` at `path`.
    pub fn create(path: impl Into<PathBuf>, size: OutputSize) -> Result<Self> {
        let path = path.into();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        let mut header = [0u8; HEADER_LEN as usize];
        header[0..4].copy_from_slice(MAGIC);
        header[4..8].copy_from_slice(&to_u32(size.pixels)?.to_le_bytes());
        header[8..12].copy_from_slice(&to_u32(size.rows)?.to_le_bytes());
        file.write_all(&header)?;
        file.set_len(HEADER_LEN + payload_len(size.pixels))?;

        tracing::debug!(path = %path.display(), pixels = size.pixels, rows = size.rows, "created shared frame");
        Ok(Self {
            file,
            path,
            size,
            owner: true,
        })
    }

    /// Open an existing block, taking the size from its header.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        let mut header = [0u8; HEADER_LEN as usize];
        file.read_exact(&mut header)?;
        if &header[0..4] != MAGIC {
            return Err(DeviceError::BadHeader(format!("{} has no frame magic", path.display())));
        }
        let pixels = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let rows = u32::from_le_bytes([header[8], header[9], header[10], header[11]]) as usize;
        let expected = HEADER_LEN + payload_len(pixels);
        let actual = file.metadata()?.len();
        if actual < expected {
            return Err(DeviceError::BadHeader(format!(
                "{} is {actual} bytes, header needs {expected}",
                path.display()
            )));
        }
        Ok(Self {
            file,
            path,
            size: OutputSize::new(pixels, rows),
            owner: false,
        })
    }

    /// File backing the block.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frame size the block holds.
    pub fn size(&self) -> OutputSize {
        self.size
    }

    /// Store `frame` under sequence number `seq`.
    pub fn write(&mut self, seq: u64, frame: &PixelBuffer) -> Result<()> {
        if frame.len() != self.size.pixels {
            return Err(DeviceError::FrameSize {
                expected: self.size.pixels,
                got: frame.len(),
            });
        }
        let mut payload = Vec::with_capacity(payload_len(self.size.pixels) as usize);
        for channel in frame.channels() {
            for value in channel {
                payload.extend_from_slice(&value.to_le_bytes());
            }
        }

        self.write_at(BEGIN_OFFSET, &seq.to_le_bytes())?;
        self.write_at(HEADER_LEN, &payload)?;
        self.write_at(END_OFFSET, &seq.to_le_bytes())?;
        Ok(())
    }

    /// Sequence number of the last completed write; 0 when never written.
    pub fn last_seq(&self) -> Result<u64> {
        self.read_u64(END_OFFSET)
    }

    /// Latest complete frame and its sequence number, or `None` if nothing
    /// has been written yet.
    pub fn read(&self) -> Result<Option<(u64, PixelBuffer)>> {
        let mut payload = vec![0u8; payload_len(self.size.pixels) as usize];
        for _ in 0..READ_ATTEMPTS {
            let end = self.read_u64(END_OFFSET)?;
            if end == 0 && self.read_u64(BEGIN_OFFSET)? == 0 {
                return Ok(None);
            }
            self.read_at(HEADER_LEN, &mut payload)?;
            let begin = self.read_u64(BEGIN_OFFSET)?;
            if begin == end {
                return Ok(Some((end, self.decode(&payload))));
            }
            std::thread::yield_now();
        }
        Err(DeviceError::TornFrame)
    }

    fn decode(&self, payload: &[u8]) -> PixelBuffer {
        let n = self.size.pixels;
        let mut values = payload
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]));
        let channels: [Vec<f32>; 3] =
            std::array::from_fn(|_| values.by_ref().take(n).collect());
        PixelBuffer::from_channels(channels, self.size.rows)
            .unwrap_or_else(|| PixelBuffer::new(self.size))
    }

    fn write_at(&self, offset: u64, bytes: &[u8]) -> Result<()> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(bytes)?;
        Ok(())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn read_u64(&self, offset: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_at(offset, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}

impl Drop for SharedFrame {
    fn drop(&mut self) {
        if self.owner {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!(path = %self.path.display(), "failed to remove shared frame: {e}");
            }
        }
    }
}

fn payload_len(pixels: usize) -> u64 {
    3 * 4 * pixels as u64
}

fn to_u32(n: usize) -> Result<u32> {
    u32::try_from(n).map_err(|_| DeviceError::BadHeader(format!("size {n} does not fit the header")))
}
