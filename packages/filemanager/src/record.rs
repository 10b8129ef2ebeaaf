//! Typed text records appended to / read from `<name>.txt` files.
//!
//! A record renders itself into one text fragment and parses itself back from
//! a line. Nothing is added between records: wrap a value in [`Line`] to end it
//! with `\n`.

use core::fmt::{self, Write as _};

use heapless::{String, Vec};

use crate::{
    error::FileManagerError,
    path::record_path,
    platform::{Filesystem, OpenMode},
    volume::{OpenFile, Volume},
    SD_LINE_MAX,
};

pub trait Record: Sized {
    fn render<W: fmt::Write>(&self, out: &mut W) -> fmt::Result;
    /// `line` has its `\r`/`\n` terminator already stripped.
    fn parse(line: &str) -> Option<Self>;
}

/// Renders the inner record followed by a newline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Line<R>(pub R);

impl<R: Record> Record for Line<R> {
    fn render<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        self.0.render(out)?;
        out.write_char('\n')
    }

    fn parse(line: &str) -> Option<Self> {
        R::parse(line).map(Line)
    }
}

macro_rules! scalar_record {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Record for $ty {
                fn render<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
                    write!(out, "{}", self)
                }

                fn parse(line: &str) -> Option<Self> {
                    line.trim().parse().ok()
                }
            }
        )*
    };
}

scalar_record!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64, bool);

impl<const N: usize> Record for String<N> {
    fn render<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        out.write_str(self.as_str())
    }

    fn parse(line: &str) -> Option<Self> {
        let mut out = String::new();
        for ch in line.chars() {
            if out.push(ch).is_err() {
                break;
            }
        }
        Some(out)
    }
}

macro_rules! tuple_record {
    ($first:ident $(, $rest:ident)+) => {
        impl<$first: Record, $($rest: Record),+> Record for ($first, $($rest,)+) {
            #[allow(non_snake_case)]
            fn render<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
                let ($first, $($rest,)+) = self;
                $first.render(out)?;
                $(
                    out.write_char(',')?;
                    $rest.render(out)?;
                )+
                Ok(())
            }

            fn parse(line: &str) -> Option<Self> {
                let mut fields = line.split(',');
                let parsed = (
                    $first::parse(fields.next()?.trim())?,
                    $($rest::parse(fields.next()?.trim())?,)+
                );
                if fields.next().is_some() {
                    return None;
                }
                Some(parsed)
            }
        }
    };
}

tuple_record!(A, B);
tuple_record!(A, B, C);
tuple_record!(A, B, C, D);

const WRITE_CHUNK: usize = 64;

enum WriteFault<E> {
    Io(E),
    Short { written: usize, expected: usize },
}

/// Streams rendered text into an open file, `WRITE_CHUNK` bytes at a time.
struct RecordWriter<'f, 'a, F: Filesystem> {
    file: &'f mut OpenFile<'a, F>,
    chunk: Vec<u8, WRITE_CHUNK>,
    written: usize,
    fault: Option<WriteFault<F::Error>>,
}

impl<'f, 'a, F: Filesystem> RecordWriter<'f, 'a, F> {
    fn new(file: &'f mut OpenFile<'a, F>) -> Self {
        Self {
            file,
            chunk: Vec::new(),
            written: 0,
            fault: None,
        }
    }

    fn flush(&mut self) -> fmt::Result {
        if self.chunk.is_empty() {
            return Ok(());
        }
        let expected = self.chunk.len();
        let result = self.file.write(&self.chunk);
        self.chunk.clear();
        match result {
            Ok(written) if written == expected => {
                self.written += written;
                Ok(())
            }
            Ok(written) => {
                self.fault = Some(WriteFault::Short {
                    written: self.written + written,
                    expected: self.written + expected,
                });
                Err(fmt::Error)
            }
            Err(err) => {
                self.fault = Some(WriteFault::Io(err));
                Err(fmt::Error)
            }
        }
    }
}

impl<F: Filesystem> fmt::Write for RecordWriter<'_, '_, F> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut rest = s.as_bytes();
        while !rest.is_empty() {
            let room = WRITE_CHUNK - self.chunk.len();
            let (head, tail) = rest.split_at(room.min(rest.len()));
            self.chunk.extend_from_slice(head).map_err(|_| fmt::Error)?;
            rest = tail;
            if self.chunk.is_full() {
                self.flush()?;
            }
        }
        Ok(())
    }
}

impl<F: Filesystem> Volume<F> {
    /// Appends `record` to `<name>.txt`, creating the file if needed. The
    /// record is rendered straight into the file, so its length is unbounded.
    pub fn append_record<R: Record>(&mut self, name: &str, record: &R) -> Result<(), FileManagerError> {
        let path = record_path(self.mount_point(), name)?;

        log::info!("sdcard: append path={}", path);
        let mut file = match self.open(&path, OpenMode::Append) {
            Ok(file) => file,
            Err(err) => {
                log::error!("sdcard: append_open_error path={} err={:?}", path, err);
                return Err(FileManagerError::OpenFailed);
            }
        };

        let mut writer = RecordWriter::new(&mut file);
        if record.render(&mut writer).and_then(|()| writer.flush()).is_err() {
            match writer.fault.take() {
                Some(WriteFault::Io(err)) => {
                    log::error!("sdcard: append_write_error path={} err={:?}", path, err)
                }
                Some(WriteFault::Short { written, expected }) => log::error!(
                    "sdcard: append_short_write path={} written={} expected={}",
                    path,
                    written,
                    expected
                ),
                None => log::error!("sdcard: append_render_error path={}", path),
            }
            return Err(FileManagerError::WriteFailed);
        }
        let written = writer.written;

        if let Err(err) = file.close() {
            log::error!("sdcard: append_close_error path={} err={:?}", path, err);
            return Err(FileManagerError::WriteFailed);
        }
        log::info!("sdcard: append_ok path={} bytes={}", path, written);
        Ok(())
    }

    /// Reads the first line of `<name>.txt` and parses it as `R`. At most
    /// `SD_LINE_MAX - 1` bytes of the line are kept; the rest is cut, not
    /// rejected.
    pub fn read_record<R: Record>(&mut self, name: &str) -> Result<R, FileManagerError> {
        let path = record_path(self.mount_point(), name)?;
        log::info!("sdcard: read path={}", path);

        let mut line = [0u8; SD_LINE_MAX];
        let read = {
            let mut file = match self.open(&path, OpenMode::Read) {
                Ok(file) => file,
                Err(err) => {
                    log::error!("sdcard: read_open_error path={} err={:?}", path, err);
                    return Err(FileManagerError::OpenFailed);
                }
            };
            file.read_line(&mut line[..SD_LINE_MAX - 1])
        };

        let len = match read {
            Ok(0) => {
                log::error!("sdcard: read_empty path={}", path);
                return Err(FileManagerError::ReadFailed);
            }
            Ok(len) => len,
            Err(err) => {
                log::error!("sdcard: read_error path={} err={:?}", path, err);
                return Err(FileManagerError::ReadFailed);
            }
        };

        let text = decode_line(&line[..len]).ok_or_else(|| {
            log::error!("sdcard: read_not_utf8 path={}", path);
            FileManagerError::ReadFailed
        })?;
        R::parse(text).ok_or_else(|| {
            log::error!("sdcard: read_parse_error path={} line={}", path, text);
            FileManagerError::ReadFailed
        })
    }
}

/// Strips the terminator. A multi-byte character cut by the line limit is
/// dropped; any other invalid UTF-8 rejects the line.
fn decode_line(bytes: &[u8]) -> Option<&str> {
    let text = match core::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) if err.error_len().is_none() => {
            core::str::from_utf8(&bytes[..err.valid_up_to()]).ok()?
        }
        Err(_) => return None,
    };
    Some(text.trim_end_matches(|ch: char| ch == '\n' || ch == '\r'))
}
