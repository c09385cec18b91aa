//! Streaming reader for INI-style configuration files.
//!
//! ```text
//! [section]
//! key = value        ; comment
//! another_key=value2
//! ```
//!
//! [`ConfigSource`] yields one [`ConfigEntry`] per `key = value` line without
//! holding the whole file in memory. Lines and section names live in
//! capacity-bounded buffers: anything past [`LINE_MAX`] or [`SECTION_MAX`] is
//! dropped without notice.

use std::{
    fs::File,
    io::{self, BufRead, BufReader, Write},
    iter::FusedIterator,
    ops::Range,
    path::Path,
};

use tracing::{debug, trace, warn};

/// Line buffer capacity in bytes, including the terminator slot.
///
/// At most `LINE_MAX - 1` bytes of a line are kept; the rest is discarded.
pub const LINE_MAX: usize = 256;

/// Section name capacity in bytes, including the terminator slot.
pub const SECTION_MAX: usize = 256;

/// Default comment marker.
pub const DEFAULT_COMMENT_MARKER: char = ';';

/// An open configuration stream plus the parser state carried between
/// calls to [`ConfigSource::next_entry`].
///
/// The underlying reader is dropped (closing the file) the first time the
/// source runs out of entries. A source whose file could not be opened
/// behaves like an empty file.
pub struct ConfigSource<R> {
    reader: Option<R>,
    comment: char,
    section: String,
    line: String,
    raw: Vec<u8>,
}

/// One `key = value` line, attributed to the most recent section header.
///
/// Borrows the source's buffers, so it is only valid until the next call to
/// [`ConfigSource::next_entry`]. Use [`ConfigEntry::to_owned_entry`] to keep
/// it longer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigEntry<'a> {
    /// Empty when no `[section]` header has been seen yet.
    pub section: &'a str,
    pub key: &'a str,
    pub value: &'a str,
}

/// Owned copy of a [`ConfigEntry`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnedEntry {
    pub section: String,
    pub key: String,
    pub value: String,
}

impl OwnedEntry {
    pub fn new(
        section: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            section: section.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}

impl ConfigEntry<'_> {
    /// Exact, case-sensitive key comparison.
    pub fn matches(&self, key: &str) -> bool {
        self.key == key
    }

    pub fn to_owned_entry(&self) -> OwnedEntry {
        OwnedEntry::new(self.section, self.key, self.value)
    }
}

impl ConfigSource<BufReader<File>> {
    /// Open `path` for reading.
    ///
    /// Never fails: a path that cannot be opened yields an inert source
    /// whose first [`next_entry`](ConfigSource::next_entry) returns `None`.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let reader = match File::open(path) {
            Ok(file) => Some(BufReader::new(file)),
            Err(e) => {
                debug!(
                    path = %path.display(),
                    error = %e,
                    "config file not opened, treating as empty"
                );
                None
            },
        };
        Self::with_reader(reader)
    }
}

impl<R: BufRead> ConfigSource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self::with_reader(Some(reader))
    }

    fn with_reader(reader: Option<R>) -> Self {
        Self {
            reader,
            comment: DEFAULT_COMMENT_MARKER,
            section: String::new(),
            line: String::with_capacity(LINE_MAX),
            raw: Vec::with_capacity(LINE_MAX),
        }
    }

    /// Use `marker` instead of `;` to start comments.
    pub fn with_comment_marker(mut self, marker: char) -> Self {
        self.comment = marker;
        self
    }

    /// Whether the underlying stream is still held.
    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// The section most recently introduced by a `[name]` header.
    pub fn section(&self) -> &str {
        &self.section
    }

    /// Parse forward to the next entry.
    ///
    /// Returns `None` once input is exhausted and releases the stream at that
    /// point. Every later call returns `None` without touching the stream.
    pub fn next_entry(&mut self) -> Option<ConfigEntry<'_>> {
        let (key, value) = loop {
            if !self.read_line() {
                if self.reader.take().is_some() {
                    debug!("config source exhausted, stream closed");
                }
                return None;
            }

            match classify(&self.line, self.comment) {
                Line::Blank | Line::Comment => continue,
                Line::Section(name) => {
                    let name = truncate_at(&self.line[name], SECTION_MAX - 1);
                    self.section.clear();
                    self.section.push_str(name);
                    trace!(section = %self.section, "config section");
                },
                Line::Pair {
                    key,
                    value,
                    separator,
                } => {
                    if !separator {
                        debug!(
                            key = &self.line[key.clone()],
                            "config line has no '=', using empty value"
                        );
                    }
                    break (key, value);
                },
            }
        };

        Some(ConfigEntry {
            section: &self.section,
            key: &self.line[key],
            value: &self.line[value],
        })
    }

    /// Turn the source into an iterator of owned entries.
    pub fn entries(self) -> Entries<R> {
        Entries { source: self }
    }

    /// Read the next line into `self.line`. `false` means no more input.
    fn read_line(&mut self) -> bool {
        let Some(reader) = self.reader.as_mut() else {
            return false;
        };

        self.raw.clear();
        match read_bounded_line(reader, &mut self.raw, LINE_MAX - 1) {
            Ok(0) => false,
            Ok(_) => {
                self.line.clear();
                self.line.push_str(&String::from_utf8_lossy(&self.raw));
                true
            },
            Err(e) => {
                warn!(error = %e, "config read failed, ignoring the rest of the file");
                false
            },
        }
    }
}

/// Owning iterator over a [`ConfigSource`].
pub struct Entries<R> {
    source: ConfigSource<R>,
}

impl<R: BufRead> Iterator for Entries<R> {
    type Item = OwnedEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.source.next_entry().map(|e| e.to_owned_entry())
    }
}

impl<R: BufRead> FusedIterator for Entries<R> {}

/// Write entries in the format [`ConfigSource`] reads.
///
/// A `[section]` header is emitted whenever the section changes; `[]`
/// switches back to the unnamed section. Keys must not contain whitespace
/// or `=`, and neither keys, values nor section names may contain the
/// comment marker or a newline, or the output will not read back the same.
pub fn write_entries<'a, W: Write>(
    mut writer: W,
    entries: impl IntoIterator<Item = &'a OwnedEntry>,
) -> io::Result<()> {
    let mut current: &str = "";
    for entry in entries {
        if entry.section != current {
            writeln!(writer, "[{}]", entry.section)?;
            current = &entry.section;
        }
        writeln!(writer, "{} = {}", entry.key, entry.value)?;
    }
    writer.flush()
}

enum Line {
    Blank,
    Comment,
    Section(Range<usize>),
    Pair {
        key: Range<usize>,
        value: Range<usize>,
        separator: bool,
    },
}

/// C `isspace` in the "C" locale: `is_ascii_whitespace` plus vertical tab.
fn is_space(c: char) -> bool {
    c.is_ascii_whitespace() || c == '\x0b'
}

/// Classify a line; ranges index into `line`.
fn classify(line: &str, comment: char) -> Line {
    let body = line.trim_matches(is_space);
    if body.is_empty() {
        return Line::Blank;
    }
    let start = line.len() - line.trim_start_matches(is_space).len();
    let end = start + body.len();

    if let Some(rest) = body.strip_prefix('[') {
        let len = rest.find(']').unwrap_or(rest.len());
        return Line::Section(start + 1..start + 1 + len);
    }
    if body.starts_with(comment) {
        return Line::Comment;
    }

    let key_len = body
        .find(|c: char| is_space(c) || c == '=')
        .unwrap_or(body.len());
    let key = start..start + key_len;

    let Some(eq) = body.find('=') else {
        return Line::Pair {
            key,
            value: end..end,
            separator: false,
        };
    };

    let after = &body[eq + 1..];
    let after = &after[..after.find(comment).unwrap_or(after.len())];
    let lead = after.len() - after.trim_start_matches(is_space).len();
    let value_start = start + eq + 1 + lead;
    let value_len = after.trim_matches(is_space).len();

    Line::Pair {
        key,
        value: value_start..value_start + value_len,
        separator: true,
    }
}

/// Longest prefix of `s` no longer than `max` bytes that ends on a char
/// boundary.
fn truncate_at(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Read one line (without its `\n`) into `buf`, keeping at most `cap` bytes
/// and discarding the rest of the line.
///
/// Returns the number of bytes consumed from the reader; `0` means end of
/// input.
fn read_bounded_line<R: BufRead>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    cap: usize,
) -> io::Result<usize> {
    let mut consumed = 0;
    loop {
        let available = match reader.fill_buf() {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if available.is_empty() {
            return Ok(consumed);
        }

        let newline = available.iter().position(|&b| b == b'\n');
        let chunk = &available[..newline.unwrap_or(available.len())];
        let room = cap.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);

        let used = newline.map_or(available.len(), |i| i + 1);
        reader.consume(used);
        consumed += used;

        if newline.is_some() {
            return Ok(consumed);
        }
    }
}
