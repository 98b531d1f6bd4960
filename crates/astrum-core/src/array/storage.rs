//! Physical storage for array elements: heap or mapped file.
//!
//! [`Buf`] is a tagged union over the two backends. The variant chosen at
//! allocation time is the single source of truth for teardown: the `Drop`
//! impl matches on it exhaustively, so "mixing tags" is structurally
//! impossible.
//!
//! Mapped storage backs the element buffer with a uniquely-named temporary
//! file in a process-local scratch directory, letting arrays exceed physical
//! RAM via the OS page cache. The file is a raw, headerless dump of the
//! element bytes and lives exactly as long as the buffer does.

use std::fs;
use std::io::{Seek, SeekFrom, Write};
use std::mem;
use std::path::{Path, PathBuf};
use std::slice;

use log::{debug, warn};
use memmap2::MmapMut;

use crate::error::{CoreError, Result};
use crate::kind::Element;

/// Scratch directory used for mapped backing files when the caller does not
/// override it. Created on the first mapped allocation, never removed at
/// process level; only per-file cleanup happens, at buffer drop time.
pub const DEFAULT_SCRATCH_DIR: &str = ".astrum";

/// Which physical backend holds an array's elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// A single contiguous heap allocation.
    Heap,
    /// A memory-mapped temporary file in the scratch directory.
    Mapped,
}

/// Owned element storage for one array.
#[derive(Debug)]
#[doc(hidden)]
pub enum Buf<T: Element> {
    Heap(Vec<T>),
    Mapped {
        map: MmapMut,
        path: PathBuf,
        len: usize,
    },
}

impl<T: Element> Buf<T> {
    /// Allocate `len` zero-initialized elements on the heap.
    ///
    /// Allocation failure surfaces as [`CoreError::OutOfMemory`] instead of
    /// aborting the process.
    pub(crate) fn heap(len: usize) -> Result<Self> {
        let mut data: Vec<T> = Vec::new();
        data.try_reserve_exact(len).map_err(|_| CoreError::OutOfMemory {
            bytes: len * mem::size_of::<T>(),
        })?;
        data.resize(len, T::zero());
        Ok(Buf::Heap(data))
    }

    /// Allocate `len` elements backed by a fresh mapped file under `scratch`.
    ///
    /// The scratch directory is created if absent. The file is extended to
    /// the required byte length with a seek-then-write-one-byte (portable
    /// sparse extension), mapped read/write shared, and its descriptor
    /// closed immediately afterwards. Sparse pages read back as zero, so the
    /// buffer starts zero-initialized like the heap variant.
    pub(crate) fn mapped(len: usize, scratch: &Path) -> Result<Self> {
        let bytes = len * mem::size_of::<T>();

        fs::create_dir_all(scratch)?;

        let (mut file, path) = tempfile::Builder::new()
            .prefix("mmap-")
            .tempfile_in(scratch)
            .map_err(CoreError::StorageBackend)?
            .keep()
            .map_err(|e| CoreError::StorageBackend(e.error))?;

        // Seek past the end and write a single byte so the kernel allocates
        // the address range without us touching every page.
        file.seek(SeekFrom::Start(bytes as u64))?;
        file.write_all(&[0u8])?;

        // Safety: the file is exclusively ours (uniquely named, just
        // created) and stays on disk until this Buf is dropped.
        let map = unsafe { memmap2::MmapOptions::new().len(bytes).map_mut(&file)? };
        drop(file);

        debug!("mapped {bytes} byte array buffer onto {}", path.display());
        Ok(Buf::Mapped { map, path, len })
    }

    /// Allocate `len` zero-initialized elements under the requested backend.
    ///
    /// This is the one entry point for producers that fill elementwise
    /// afterwards (duplication, conversion): the destination lives under its
    /// final backend from the start, so a mapped result is written straight
    /// into its backing file instead of through a transient heap copy.
    pub(crate) fn alloc(len: usize, mapped: bool, scratch: &Path) -> Result<Self> {
        if mapped {
            Self::mapped(len, scratch)
        } else {
            Self::heap(len)
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Buf::Heap(data) => data.len(),
            Buf::Mapped { len, .. } => *len,
        }
    }

    pub(crate) fn backend(&self) -> StorageBackend {
        match self {
            Buf::Heap(_) => StorageBackend::Heap,
            Buf::Mapped { .. } => StorageBackend::Mapped,
        }
    }

    /// Scratch directory holding the backing file, for mapped buffers.
    pub(crate) fn scratch_dir(&self) -> Option<PathBuf> {
        match self {
            Buf::Heap(_) => None,
            Buf::Mapped { path, .. } => path.parent().map(Path::to_path_buf),
        }
    }

    pub(crate) fn as_slice(&self) -> &[T] {
        match self {
            Buf::Heap(data) => data,
            // Safety: the mapping is page-aligned (stricter than any element
            // alignment), `len * size_of::<T>()` bytes long, and lives as
            // long as `self`.
            Buf::Mapped { map, len, .. } => unsafe {
                slice::from_raw_parts(map.as_ptr().cast::<T>(), *len)
            },
        }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [T] {
        match self {
            Buf::Heap(data) => data,
            // Safety: as in `as_slice`, plus exclusive access through `&mut`.
            Buf::Mapped { map, len, .. } => unsafe {
                slice::from_raw_parts_mut(map.as_mut_ptr().cast::<T>(), *len)
            },
        }
    }
}

impl<T: Element> Drop for Buf<T> {
    fn drop(&mut self) {
        if let Buf::Mapped { path, .. } = self {
            // Unlinking while still mapped is fine on POSIX; the pages go
            // away when the mapping itself drops right after this.
            debug!("removing mapped backing file {}", path.display());
            if let Err(err) = fs::remove_file(&path) {
                warn!("could not remove backing file {}: {err}", path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_is_zero_initialized() {
        let buf = Buf::<f64>::heap(16).unwrap();
        assert_eq!(buf.len(), 16);
        assert_eq!(buf.backend(), StorageBackend::Heap);
        assert!(buf.as_slice().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_mapped_round_trip_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let path;
        {
            let mut buf = Buf::<i32>::mapped(8, dir.path()).unwrap();
            assert_eq!(buf.len(), 8);
            assert_eq!(buf.backend(), StorageBackend::Mapped);
            assert!(buf.as_slice().iter().all(|&x| x == 0));

            buf.as_mut_slice().copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
            assert_eq!(buf.as_slice()[7], 8);

            path = match &buf {
                Buf::Mapped { path, .. } => path.clone(),
                Buf::Heap(_) => unreachable!(),
            };
            assert!(path.exists(), "backing file must exist while live");
        }
        assert!(!path.exists(), "backing file must be removed on drop");
    }

    #[test]
    fn test_mapped_creates_scratch_dir() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        assert!(!scratch.exists());
        let buf = Buf::<u8>::mapped(4, &scratch).unwrap();
        assert!(scratch.exists());
        assert_eq!(buf.scratch_dir().unwrap(), scratch);
    }

    #[test]
    fn test_alloc_honors_backend_choice() {
        let dir = tempfile::tempdir().unwrap();
        let heap = Buf::<u16>::alloc(3, false, dir.path()).unwrap();
        assert_eq!(heap.backend(), StorageBackend::Heap);

        let mut mapped = Buf::<u16>::alloc(3, true, dir.path()).unwrap();
        assert_eq!(mapped.backend(), StorageBackend::Mapped);
        mapped.as_mut_slice().copy_from_slice(&[1, 2, 3]);
        assert_eq!(mapped.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn test_heap_drop_touches_no_files() {
        let dir = tempfile::tempdir().unwrap();
        drop(Buf::<f32>::heap(4).unwrap());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
