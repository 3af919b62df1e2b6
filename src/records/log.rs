//! Append-only journal of committed write batches.
//!
//! Layout: a 5-byte header (magic + version) followed by one frame per
//! batch: `len: u32 | crc32: u32 | body`, where body is the MessagePack
//! encoding of the batch. A frame is only considered committed once it
//! has been fully written and synced.

use super::WriteBatch;
use crate::error::{HistoryError, Result};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Magic bytes for the journal file.
const JOURNAL_MAGIC: &[u8; 4] = b"AHJ\0";

/// Current journal format version.
const JOURNAL_VERSION: u8 = 1;

const HEADER: [u8; 5] = [
    JOURNAL_MAGIC[0],
    JOURNAL_MAGIC[1],
    JOURNAL_MAGIC[2],
    JOURNAL_MAGIC[3],
    JOURNAL_VERSION,
];

const HEADER_SIZE: u64 = HEADER.len() as u64;

/// Frame header size (length + checksum).
const FRAME_HEADER_SIZE: usize = 8;

struct JournalFile {
    file: File,
    /// Offset of the end of the last complete frame.
    size: u64,
    /// Set when a failed append could not be rolled back.
    poisoned: bool,
}

/// Append-only batch journal.
pub struct RecordJournal {
    inner: Mutex<JournalFile>,
}

impl RecordJournal {
    /// Open or create a journal, returning it together with every committed batch.
    ///
    /// An incomplete final frame (a write interrupted by a crash) is
    /// truncated away, as is a header cut short before any frame was
    /// written. A complete frame with a bad checksum is corruption.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<WriteBatch>)> {
        let path = path.as_ref();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let len = file.metadata()?.len();
        let (batches, size) = if len < HEADER_SIZE {
            Self::init(&mut file, path, len)?;
            (Vec::new(), HEADER_SIZE)
        } else {
            Self::replay(&mut file, len)?
        };

        if size < len {
            tracing::warn!(
                path = %path.display(),
                valid_bytes = size,
                file_bytes = len,
                "truncating incomplete journal frame"
            );
            file.set_len(size)?;
            file.sync_all()?;
        }

        Ok((
            Self {
                inner: Mutex::new(JournalFile {
                    file,
                    size,
                    poisoned: false,
                }),
            },
            batches,
        ))
    }

    /// Append a batch and sync it to disk.
    ///
    /// If the write fails and the partial frame cannot be removed, the
    /// journal refuses further appends until it is reopened.
    pub fn append(&self, batch: &WriteBatch) -> Result<()> {
        let body = rmp_serde::to_vec(batch)?;
        let len = u32::try_from(body.len())
            .map_err(|_| HistoryError::Serialization("batch exceeds 4 GiB".into()))?;

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + body.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&body).to_le_bytes());
        frame.extend_from_slice(&body);

        let mut inner = self.inner.lock();
        if inner.poisoned {
            return Err(HistoryError::Corruption(
                "journal holds an unrolled-back frame; reopen the store".into(),
            ));
        }
        let start = inner.size;

        if let Err(e) = write_frame(&mut inner.file, start, &frame) {
            // Drop whatever part of the frame reached the file.
            if let Err(rollback) = inner.file.set_len(start) {
                tracing::error!(
                    offset = start,
                    write_error = %e,
                    rollback_error = %rollback,
                    "cannot roll back failed journal append"
                );
                inner.poisoned = true;
            }
            return Err(e.into());
        }

        inner.size = start + frame.len() as u64;
        Ok(())
    }

    /// Bytes of committed data, header included.
    pub fn size(&self) -> u64 {
        self.inner.lock().size
    }

    /// Write a fresh header over an empty file or a partially written header.
    fn init(file: &mut File, path: &Path, len: u64) -> Result<()> {
        if len > 0 {
            let mut existing = Vec::with_capacity(len as usize);
            file.seek(SeekFrom::Start(0))?;
            file.read_to_end(&mut existing)?;
            if !HEADER.starts_with(&existing) {
                return Err(HistoryError::InvalidFormat("Invalid journal magic".into()));
            }
            tracing::warn!(
                path = %path.display(),
                file_bytes = len,
                "rewriting incomplete journal header"
            );
        }

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&HEADER)?;
        file.sync_all()?;
        Ok(())
    }

    fn replay(file: &mut File, len: u64) -> Result<(Vec<WriteBatch>, u64)> {
        file.seek(SeekFrom::Start(0))?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != JOURNAL_MAGIC {
            return Err(HistoryError::InvalidFormat("Invalid journal magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != JOURNAL_VERSION {
            return Err(HistoryError::InvalidFormat(format!(
                "Unsupported journal version: {}",
                version[0]
            )));
        }

        let mut batches = Vec::new();
        let mut offset = HEADER_SIZE;

        while offset + FRAME_HEADER_SIZE as u64 <= len {
            let mut header = [0u8; FRAME_HEADER_SIZE];
            file.read_exact(&mut header)?;
            let body_len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as u64;
            let expected = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            let end = offset + FRAME_HEADER_SIZE as u64 + body_len;
            if end > len {
                break;
            }

            let mut body = vec![0u8; body_len as usize];
            file.read_exact(&mut body)?;

            let got = crc32fast::hash(&body);
            if got != expected {
                return Err(HistoryError::ChecksumMismatch { expected, got });
            }

            batches.push(rmp_serde::from_slice(&body)?);
            offset = end;
        }

        Ok((batches, offset))
    }
}

fn write_frame(file: &mut File, start: u64, frame: &[u8]) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(start))?;
    file.write_all(frame)?;
    file.sync_data()
}
