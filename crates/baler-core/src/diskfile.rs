//! Scratch overflow files for the disk tier.
//!
//! One file per compressible relation, written in fixed-size frames large
//! enough for one padded native tuple. Opened with the OS page cache
//! bypassed where the platform supports it; all transfers go through one
//! reused block-aligned bounce buffer. Single-threaded access is assumed
//! by construction: the buffer is owned by the file, the file by its
//! tiered store.

use std::alloc::{self, Layout};
use std::fs::{File, OpenOptions};
use std::ops::{Deref, DerefMut};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::slice;

use tracing::warn;

use crate::error::StorageError;
use crate::types::BLOCK_SIZE;

/// Heap buffer aligned to `BLOCK_SIZE`, as direct I/O requires.
struct AlignedBuf {
    ptr: *mut u8,
    len: usize,
}

impl AlignedBuf {
    fn zeroed(len: usize) -> Self {
        let layout = Layout::from_size_align(len, BLOCK_SIZE).expect("bad bounce buffer layout");
        // SAFETY: layout has non-zero size; alloc_zeroed returns either a
        // valid allocation or null, which we turn into an abort.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            alloc::handle_alloc_error(layout);
        }
        Self { ptr, len }
    }
}

impl Deref for AlignedBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: ptr/len describe one live allocation owned by self.
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }
}

impl DerefMut for AlignedBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, and &mut self guarantees uniqueness.
        unsafe { slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

impl Drop for AlignedBuf {
    fn drop(&mut self) {
        let layout = Layout::from_size_align(self.len, BLOCK_SIZE).unwrap();
        // SAFETY: ptr was allocated with exactly this layout.
        unsafe { alloc::dealloc(self.ptr, layout) };
    }
}

fn open_direct(path: &Path) -> std::io::Result<File> {
    #[cfg(target_os = "linux")]
    {
        use std::os::unix::fs::OpenOptionsExt;
        let mut direct = OpenOptions::new();
        direct
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .custom_flags(libc::O_DIRECT);
        match direct.open(path) {
            Ok(file) => return Ok(file),
            // Filesystems like tmpfs reject O_DIRECT; fall through to a
            // buffered descriptor.
            Err(_) => {}
        }
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

/// Append/rewrite/read scratch file with fixed-size frames.
///
/// The file is deleted on drop; the disk tier is scratch space, not a
/// durability story.
pub struct PageFile {
    file: File,
    path: PathBuf,
    frame_size: usize,
    frames: u64,
    bounce: AlignedBuf,
}

impl PageFile {
    /// Create (or truncate) the scratch file at `path`, sized for tuples
    /// of `tuple_size` bytes. The frame is the smallest multiple of
    /// `BLOCK_SIZE` that fits one tuple.
    pub fn create(path: impl Into<PathBuf>, tuple_size: usize) -> Result<Self, StorageError> {
        let path = path.into();
        let frame_size = tuple_size.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
        let file = open_direct(&path)?;
        Ok(Self {
            file,
            path,
            frame_size,
            frames: 0,
            bounce: AlignedBuf::zeroed(frame_size),
        })
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Sequential write of one tuple into a fresh frame. Returns the
    /// frame index.
    pub fn append(&mut self, tuple: &[u8]) -> Result<u64, StorageError> {
        let frame = self.frames;
        self.write_frame(frame, tuple)?;
        self.frames += 1;
        Ok(frame)
    }

    /// Random rewrite of an existing frame.
    pub fn write_at(&mut self, frame: u64, tuple: &[u8]) -> Result<(), StorageError> {
        if frame >= self.frames {
            return Err(StorageError::FrameOutOfBounds { frame, total_frames: self.frames });
        }
        self.write_frame(frame, tuple)
    }

    /// Random read of one frame; `out` receives the leading
    /// `out.len() <= frame_size` bytes of the frame.
    pub fn read_at(&mut self, frame: u64, out: &mut [u8]) -> Result<(), StorageError> {
        if frame >= self.frames {
            return Err(StorageError::FrameOutOfBounds { frame, total_frames: self.frames });
        }
        if out.len() > self.frame_size {
            return Err(StorageError::TupleTooLarge { tuple: out.len(), frame: self.frame_size });
        }
        let offset = frame * self.frame_size as u64;
        self.file.read_exact_at(&mut self.bounce, offset)?;
        out.copy_from_slice(&self.bounce[..out.len()]);
        Ok(())
    }

    fn write_frame(&mut self, frame: u64, tuple: &[u8]) -> Result<(), StorageError> {
        if tuple.len() > self.frame_size {
            return Err(StorageError::TupleTooLarge { tuple: tuple.len(), frame: self.frame_size });
        }
        self.bounce[..tuple.len()].copy_from_slice(tuple);
        self.bounce[tuple.len()..].fill(0);
        let offset = frame * self.frame_size as u64;
        self.file.write_all_at(&self.bounce, offset)?;
        Ok(())
    }
}

impl Drop for PageFile {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to unlink scratch file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_frame_size_rounds_up_to_blocks() {
        let dir = tempdir().unwrap();
        let f = PageFile::create(dir.path().join("a.bin"), 325).unwrap();
        assert_eq!(f.frame_size(), BLOCK_SIZE);
        let f = PageFile::create(dir.path().join("b.bin"), BLOCK_SIZE + 1).unwrap();
        assert_eq!(f.frame_size(), 2 * BLOCK_SIZE);
    }

    #[test]
    fn test_append_read_roundtrip() {
        let dir = tempdir().unwrap();
        let mut f = PageFile::create(dir.path().join("t.bin"), 64).unwrap();

        for i in 0u8..10 {
            let frame = f.append(&[i; 64]).unwrap();
            assert_eq!(frame, i as u64);
        }
        let mut out = [0u8; 64];
        f.read_at(7, &mut out).unwrap();
        assert_eq!(out, [7u8; 64]);
        f.read_at(0, &mut out).unwrap();
        assert_eq!(out, [0u8; 64]);
    }

    #[test]
    fn test_rewrite_same_frame() {
        let dir = tempdir().unwrap();
        let mut f = PageFile::create(dir.path().join("t.bin"), 64).unwrap();
        let frame = f.append(&[1u8; 64]).unwrap();
        f.append(&[2u8; 64]).unwrap();

        f.write_at(frame, &[9u8; 64]).unwrap();
        let mut out = [0u8; 64];
        f.read_at(frame, &mut out).unwrap();
        assert_eq!(out, [9u8; 64]);
        // The neighbour is untouched.
        f.read_at(1, &mut out).unwrap();
        assert_eq!(out, [2u8; 64]);
    }

    #[test]
    fn test_out_of_bounds() {
        let dir = tempdir().unwrap();
        let mut f = PageFile::create(dir.path().join("t.bin"), 64).unwrap();
        f.append(&[0u8; 64]).unwrap();

        let mut out = [0u8; 64];
        match f.read_at(5, &mut out) {
            Err(StorageError::FrameOutOfBounds { frame: 5, total_frames: 1 }) => {}
            other => panic!("expected FrameOutOfBounds, got {other:?}"),
        }
        assert!(f.write_at(1, &[0u8; 64]).is_err());
    }

    #[test]
    fn test_oversized_tuple_rejected() {
        let dir = tempdir().unwrap();
        let mut f = PageFile::create(dir.path().join("t.bin"), 64).unwrap();
        assert!(f.append(&vec![0u8; BLOCK_SIZE + 1]).is_err());
    }

    #[test]
    fn test_scratch_file_unlinked_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.bin");
        {
            let mut f = PageFile::create(&path, 64).unwrap();
            f.append(&[0u8; 64]).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
