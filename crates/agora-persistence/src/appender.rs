//! The rotating file appender.
//!
//! Owned by the writer thread. Before each batch it rotates the output
//! file if the configured wall-time interval elapsed (there is no size
//! trigger), then writes each blob framed as magic ∥ size ∥ crc32 ∥
//! payload ∥ zero padding to the next multiple of 8. A failed open or
//! write means durability is gone, so it logs and aborts the process.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use agora_core::frame::{FRAME_PREFIX_SIZE, MAGIC_PREFIX, crc32, padding_required};
use convi::ExpectInto as _;
use snafu::Snafu;
use tracing::error;

use crate::LOG_TARGET;
use crate::pipeline::Blob;

#[derive(Debug, Snafu)]
pub enum AppenderError {
    #[snafu(display("The destination folder does not exist or is not a folder: {}", path.display()))]
    NotAFolder { path: PathBuf },
}

pub struct FileAppender {
    destination_folder: PathBuf,
    refresh_every_seconds: i64,
    current_file_name: PathBuf,
    last_file_name_created_at: i64,
}

impl FileAppender {
    pub fn new(
        destination_folder: impl Into<PathBuf>,
        refresh_every_seconds: i64,
    ) -> Result<Self, AppenderError> {
        let destination_folder = destination_folder.into();
        if !destination_folder.is_dir() {
            return NotAFolderSnafu {
                path: destination_folder,
            }
            .fail();
        }
        Ok(Self {
            destination_folder,
            refresh_every_seconds,
            current_file_name: PathBuf::new(),
            last_file_name_created_at: 0,
        })
    }

    pub fn append(&mut self, blobs: &[Blob]) {
        if blobs.is_empty() {
            return;
        }
        self.update_current_file_if_needed(agora_core::Timestamp::now().as_secs());

        if let Err(err) = self.write_blobs(blobs) {
            error!(
                target: LOG_TARGET,
                file = %self.current_file_name.display(),
                %err,
                "Could not persist blobs to file"
            );
            std::process::abort();
        }
    }

    pub fn current_file(&self) -> &Path {
        &self.current_file_name
    }

    fn write_blobs(&self, blobs: &[Blob]) -> std::io::Result<()> {
        static PADDING: [u8; 8] = [0u8; 8];

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.current_file_name)?;

        let mut prefix = [0u8; FRAME_PREFIX_SIZE];
        for blob in blobs {
            let payload = blob.as_slice();
            let size: u32 = payload.len().expect_into();
            prefix[..8].copy_from_slice(&MAGIC_PREFIX.to_le_bytes());
            prefix[8..12].copy_from_slice(&size.to_le_bytes());
            prefix[12..16].copy_from_slice(&crc32(payload).to_le_bytes());

            file.write_all(&prefix)?;
            file.write_all(payload)?;
            let padding_needed = padding_required(payload.len());
            if padding_needed > 0 {
                file.write_all(&PADDING[..padding_needed])?;
            }
        }
        file.flush()
    }

    fn update_current_file_if_needed(&mut self, now: i64) {
        if (self.last_file_name_created_at + self.refresh_every_seconds) < now {
            self.current_file_name = self
                .destination_folder
                .join(format!("forum-{now}.events"));
            self.last_file_name_created_at = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use agora_core::frame::BLOB_PADDING_BYTES;

    use super::*;

    #[test_log::test]
    fn frames_are_aligned_and_checksummed() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut appender = FileAppender::new(dir.path(), 3600).expect("valid folder");

        let payload_a = vec![1u8; 49];
        let payload_b = vec![2u8; 64];
        appender.append(&[
            Blob::from_vec(payload_a.clone()),
            Blob::from_vec(payload_b.clone()),
        ]);

        let bytes = std::fs::read(appender.current_file()).expect("reads");
        assert_eq!(bytes.len() % BLOB_PADDING_BYTES, 0);

        // Frame one
        assert_eq!(&bytes[..8], &MAGIC_PREFIX.to_le_bytes());
        assert_eq!(&bytes[8..12], &49u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &crc32(&payload_a).to_le_bytes());
        assert_eq!(&bytes[16..65], payload_a.as_slice());
        // 49 bytes of payload pad to 56
        assert_eq!(&bytes[65..72], &[0u8; 7]);

        // Frame two starts 8-byte-aligned, no padding needed for 64
        assert_eq!(&bytes[72..80], &MAGIC_PREFIX.to_le_bytes());
        assert_eq!(&bytes[80..84], &64u32.to_le_bytes());
        assert_eq!(bytes.len(), 72 + 16 + 64);
    }

    #[test_log::test]
    fn appends_accumulate_in_one_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut appender = FileAppender::new(dir.path(), 3600).expect("valid folder");

        appender.append(&[Blob::from_vec(vec![0u8; 8])]);
        let first = appender.current_file().to_path_buf();
        appender.append(&[Blob::from_vec(vec![0u8; 8])]);
        assert_eq!(appender.current_file(), first);

        let bytes = std::fs::read(first).expect("reads");
        assert_eq!(bytes.len(), 2 * (16 + 8));
    }

    #[test_log::test]
    fn rotation_by_wall_time() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut appender = FileAppender::new(dir.path(), 3600).expect("valid folder");

        appender.update_current_file_if_needed(1_000_000);
        let first = appender.current_file().to_path_buf();
        assert!(
            first
                .file_name()
                .and_then(|n| n.to_str())
                .expect("utf-8 name")
                .starts_with("forum-1000000.")
        );

        // Within the interval the file stays
        appender.update_current_file_if_needed(1_003_600);
        assert_eq!(appender.current_file(), first);

        // Past it a new file name is chosen
        appender.update_current_file_if_needed(1_003_601);
        assert_ne!(appender.current_file(), first);
    }

    #[test_log::test]
    fn missing_folder_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("nope");
        assert!(FileAppender::new(&missing, 3600).is_err());
    }
}
