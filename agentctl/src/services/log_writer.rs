//! Size-bounded rotating log writer
//!
//! Sink for the supervised worker's combined stdout/stderr. A single mutex
//! serializes all writes; when a write would push the file past the size
//! cap, backups shift `N-1 -> N` (the oldest falls off) and the base file
//! reopens empty before the write proceeds.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const DEFAULT_MAX_LOG_SIZE: u64 = 100 * 1024 * 1024;
pub const DEFAULT_MAX_BACKUPS: usize = 5;

pub struct RotatingLogWriter {
    filename: PathBuf,
    max_size: u64,
    max_backups: usize,
    inner: Mutex<Inner>,
}

struct Inner {
    // None after a failed rotation; the next write retries the reopen once
    file: Option<File>,
    current_size: u64,
}

impl RotatingLogWriter {
    pub fn new(
        filename: impl Into<PathBuf>,
        max_size: u64,
        max_backups: usize,
    ) -> io::Result<Self> {
        let filename = filename.into();
        let (file, current_size) = open_append(&filename)?;
        Ok(Self {
            filename,
            max_size,
            max_backups,
            inner: Mutex::new(Inner {
                file: Some(file),
                current_size,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.filename
    }

    /// Append `buf`, rotating first if it would exceed the size cap
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.lock();

        if inner.file.is_none() {
            let (file, current_size) = open_append(&self.filename)?;
            inner.file = Some(file);
            inner.current_size = current_size;
        }

        if inner.current_size + buf.len() as u64 > self.max_size {
            self.rotate(&mut inner)?;
        }

        let file = inner
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file is closed"))?;
        file.write_all(buf)?;
        inner.current_size += buf.len() as u64;
        Ok(buf.len())
    }

    /// Append one line, adding the trailing newline
    pub fn write_line(&self, line: &str) -> io::Result<()> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        self.write(&buf).map(|_| ())
    }

    pub fn flush(&self) -> io::Result<()> {
        let mut inner = self.lock();
        match inner.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }

    pub fn current_size(&self) -> u64 {
        self.lock().current_size
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn rotate(&self, inner: &mut Inner) -> io::Result<()> {
        // Close the active handle before shuffling files around
        inner.file.take();

        for i in (0..self.max_backups).rev() {
            let src = if i == 0 {
                self.filename.clone()
            } else {
                backup_name(&self.filename, i)
            };
            let dst = backup_name(&self.filename, i + 1);

            if i == self.max_backups - 1 {
                let _ = fs::remove_file(&dst);
            }
            if src.exists() {
                fs::rename(&src, &dst)?;
            }
        }

        let (file, _) = open_append(&self.filename)?;
        inner.file = Some(file);
        inner.current_size = 0;
        Ok(())
    }
}

fn backup_name(base: &Path, index: usize) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

fn open_append(path: &Path) -> io::Result<(File, u64)> {
    let current_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok((file, current_size))
}
