use memmap2::MmapOptions;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use treediff_common::{CompareError, CompareMethod};

/// Whole-file byte equality for two files of a known, equal length.
///
/// Content is compared in windows of at most `chunk_size` bytes so memory
/// use stays bounded no matter how large the files are. The first unequal
/// window ends the comparison.
#[derive(Debug, Clone, Copy)]
pub struct ByteComparator {
    method: CompareMethod,
    chunk_size: usize,
}

impl ByteComparator {
    pub fn new(method: CompareMethod, chunk_size: usize) -> Self {
        Self {
            method,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn method(&self) -> CompareMethod {
        self.method
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Compare the first `len` bytes of both files.
    ///
    /// `len` must be the size both files were observed to have; a file that
    /// turns out shorter is reported as [`CompareError::Truncated`].
    pub fn files_equal(&self, left: &Path, right: &Path, len: u64) -> Result<bool, CompareError> {
        let left_file = File::open(left)?;
        let right_file = File::open(right)?;
        self.compare_open(left_file, right_file, len)
    }

    fn compare_open(&self, left: File, right: File, len: u64) -> Result<bool, CompareError> {
        match self.method {
            CompareMethod::Mmap => self.compare_mapped(&left, &right, len),
            CompareMethod::Buffered => self.compare_buffered(left, right, len),
        }
    }

    /// Windowed mmap comparison.
    ///
    /// Only a truncation that happened before a window is mapped is detected.
    /// Shrinking a file while its window is mapped raises `SIGBUS`, which
    /// cannot be recovered from, so this strategy is opt-in.
    fn compare_mapped(&self, left: &File, right: &File, len: u64) -> Result<bool, CompareError> {
        let mut offset = 0u64;
        while offset < len {
            let window = (len - offset).min(self.chunk_size as u64) as usize;

            // Mapping past EOF faults on access.
            ensure_length(left, offset + window as u64, len)?;
            ensure_length(right, offset + window as u64, len)?;

            // SAFETY: both files are opened read-only and the window lies within
            // the length just checked. A concurrent truncation can still fault;
            // see the method docs.
            let left_map = unsafe { MmapOptions::new().offset(offset).len(window).map(left)? };
            let right_map = unsafe { MmapOptions::new().offset(offset).len(window).map(right)? };

            if left_map[..] != right_map[..] {
                return Ok(false);
            }

            offset += window as u64;
        }

        Ok(true)
    }

    fn compare_buffered(&self, mut left: File, mut right: File, len: u64) -> Result<bool, CompareError> {
        let capacity = len.min(self.chunk_size as u64) as usize;
        let mut left_buf = vec![0u8; capacity];
        let mut right_buf = vec![0u8; capacity];

        let mut offset = 0u64;
        while offset < len {
            let window = (len - offset).min(capacity as u64) as usize;

            read_block(&mut left, &mut left_buf[..window], offset, len)?;
            read_block(&mut right, &mut right_buf[..window], offset, len)?;

            if left_buf[..window] != right_buf[..window] {
                return Ok(false);
            }

            offset += window as u64;
        }

        Ok(true)
    }
}

fn ensure_length(file: &File, needed: u64, expected: u64) -> Result<(), CompareError> {
    let actual = file.metadata()?.len();
    if actual < needed {
        return Err(CompareError::Truncated { expected, actual });
    }
    Ok(())
}

fn read_block(file: &mut File, buf: &mut [u8], offset: u64, expected: u64) -> Result<(), CompareError> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(CompareError::Truncated {
                    expected,
                    actual: offset + filled as u64,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
