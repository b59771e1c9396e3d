//! Line-oriented log files. Each line is `key:field`, split on the first `:`.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{Error, Result};

/// Separates the key from the rest of a line. Keys may not contain it.
pub const DELIMITER: char = ':';

/// Head-room kept free below `max_size` on every append.
pub const SAFETY_MARGIN: u64 = 16 * 1024;

pub const DEFAULT_MAX_SIZE: u64 = 1024 * 1024 * 1024;

/// A single append-only log on disk. The file itself is the only state; every operation reopens
/// it, so a `LogFile` never holds a stale handle across a rewrite.
#[derive(Debug)]
pub struct LogFile {
    path: PathBuf,
    max_size: u64,
    sync_writes: bool,
}

impl LogFile {
    /// Creates the file (and any missing parent directories) unless it already exists.
    pub fn ensure_exists(
        path: impl Into<PathBuf>,
        max_size: u64,
        sync_writes: bool,
    ) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        match File::options().write(true).create_new(true).open(&path) {
            Ok(_) => debug!(?path, "Created log file"),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!(?path, "Log file already exists")
            }
            Err(e) => return Err(e.into()),
        }
        if !std::fs::metadata(&path)?.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            )
            .into());
        }

        Ok(Self {
            path,
            max_size,
            sync_writes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Appends `line` plus a trailing newline in one write and returns the length the file had
    /// before, which can later be handed to [`LogFile::truncate`] to undo the append.
    ///
    /// Nothing is written if the file is read-only or if the append would take the file within
    /// [`SAFETY_MARGIN`] of its size limit.
    pub fn append(&self, line: &str) -> Result<u64> {
        let metadata = std::fs::metadata(&self.path)?;
        if metadata.permissions().readonly() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is read-only", self.path.display()),
            )
            .into());
        }

        let len = metadata.len();
        let mut file = File::options().read(true).append(true).open(&self.path)?;
        // A crash can leave the last line without its newline. Close it off first so this line
        // doesn't get glued onto it.
        let torn = len > 0 && {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            last[0] != b'\n'
        };

        let line_len = line.len() as u64 + 1 + u64::from(torn);
        if len + line_len + SAFETY_MARGIN > self.max_size {
            warn!(path = ?self.path, len, line_len, max_size = self.max_size, "Log file full");
            return Err(Error::SizeLimit {
                path: self.path.clone(),
                len,
                max_size: self.max_size,
            });
        }

        let mut buf = String::with_capacity(line_len as usize);
        if torn {
            buf.push('\n');
        }
        buf.push_str(line);
        buf.push('\n');

        if let Err(e) = file.write_all(buf.as_bytes()) {
            // Don't leave half a line behind for the next append to glue onto.
            if let Err(truncate_err) = file.set_len(len) {
                warn!(?truncate_err, path = ?self.path, "Failed to discard partial append");
            }
            return Err(e.into());
        }
        if self.sync_writes {
            file.sync_data()?;
        }

        Ok(len)
    }

    /// Cuts the file back to `len` bytes.
    pub fn truncate(&self, len: u64) -> Result<()> {
        let file = File::options().write(true).open(&self.path)?;
        file.set_len(len)?;
        if self.sync_writes {
            file.sync_data()?;
        }
        Ok(())
    }

    /// Scans from the start of the file and returns the first line keyed by `key`.
    pub fn find_by_key(&self, key: &str) -> Result<Option<String>> {
        let mut found = None;
        self.for_each_line(|line, _| {
            if found.is_none() && key_of(line) == Some(key.as_bytes()) {
                found = Some(String::from_utf8_lossy(line).into_owned());
            }
            Ok(())
        })?;
        Ok(found)
    }

    /// Replaces the file with a copy that lacks every line keyed by `key`. The copy is built in a
    /// temporary file next to the log and renamed over it, so an interrupted rewrite leaves the
    /// old contents in place. Lines without a delimiter are kept as they are.
    ///
    /// Returns how many lines were dropped.
    pub fn rewrite_excluding(&self, key: &str) -> Result<usize> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::Builder::new()
            .prefix(".rewrite-")
            .tempfile_in(dir)?;

        let mut dropped = 0;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            self.for_each_line(|line, _| {
                if key_of(line) == Some(key.as_bytes()) {
                    dropped += 1;
                } else {
                    writer.write_all(line)?;
                    writer.write_all(b"\n")?;
                }
                Ok(())
            })?;
            writer.flush()?;
        }

        if dropped == 0 {
            debug!(path = ?self.path, key, "Nothing to rewrite");
            return Ok(0);
        }

        tmp.as_file().sync_all()?;
        std::fs::set_permissions(tmp.path(), std::fs::metadata(&self.path)?.permissions())?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        debug!(path = ?self.path, key, dropped, "Rewrote log file");

        Ok(dropped)
    }

    /// Every line that splits into a key and a field, in file order. Lines without a delimiter or
    /// with invalid UTF-8 are skipped.
    pub fn lines(&self) -> Result<Vec<LogLine>> {
        let mut lines = Vec::new();
        let mut line_no = 0usize;
        self.for_each_line(|line, complete| {
            line_no += 1;
            match std::str::from_utf8(line).ok().and_then(split_line) {
                Some((key, field)) => lines.push(LogLine {
                    key: key.to_owned(),
                    field: field.to_owned(),
                    complete,
                }),
                None => warn!(path = ?self.path, line_no, "Skipping malformed line"),
            }
            Ok(())
        })?;
        Ok(lines)
    }

    /// Calls `f` with each line, minus its line ending, and whether it had a newline at all.
    fn for_each_line(&self, mut f: impl FnMut(&[u8], bool) -> Result<()>) -> Result<()> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut line = Vec::new();
        while reader.read_until(b'\n', &mut line)? > 0 {
            let complete = line.ends_with(b"\n");
            let mut end = line.len();
            if complete {
                end -= 1;
            }
            if line[..end].ends_with(b"\r") {
                end -= 1;
            }
            f(&line[..end], complete)?;
            line.clear();
        }
        Ok(())
    }
}

/// One parsed log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub key: String,
    pub field: String,
    /// False for a last line with no newline, i.e. an append that a crash cut short.
    pub complete: bool,
}

/// Joins a key and its field into a log line (without the newline).
pub(crate) fn format_line(key: &str, field: impl std::fmt::Display) -> String {
    format!("{key}{DELIMITER}{field}")
}

pub(crate) fn split_line(line: &str) -> Option<(&str, &str)> {
    line.split_once(DELIMITER)
}

fn key_of(line: &[u8]) -> Option<&[u8]> {
    let pos = line.iter().position(|b| *b == DELIMITER as u8)?;
    Some(&line[..pos])
}
