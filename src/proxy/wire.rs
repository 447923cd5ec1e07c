//! Line-oriented socket I/O.
//!
//! Lines are split on `\n`; a trailing `\r` is dropped. Everything written
//! is terminated with a bare `\n`, which is the only rewriting the proxy does.

use std::io::{self, BufRead, BufReader, Read, Write};

/// Read one line without its terminator. `None` means end of stream.
///
/// A final unterminated line is still returned.
pub fn read_line<R: BufRead>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut line = Vec::new();
    if reader.read_until(b'\n', &mut line)? == 0 {
        return Ok(None);
    }
    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
    Ok(Some(line))
}

/// Write `line` followed by `\n`.
pub fn write_line<W: Write>(writer: &mut W, line: &[u8]) -> io::Result<()> {
    writer.write_all(line)?;
    writer.write_all(b"\n")
}

/// Copy lines up to the first empty line or end of stream, then write one
/// blank terminator. Returns the number of header lines copied.
pub fn relay_headers<R: BufRead, W: Write>(reader: &mut R, writer: &mut W) -> io::Result<usize> {
    let mut copied = 0;
    while let Some(line) = read_line(reader)? {
        if line.is_empty() {
            break;
        }
        write_line(writer, &line)?;
        copied += 1;
    }
    write_line(writer, b"")?;
    Ok(copied)
}

/// Copy every line until end of stream.
///
/// The writer is flushed whenever the reader has no more buffered input, so
/// the peer sees data as it arrives rather than at end of stream.
pub fn relay_to_end<R: Read, W: Write>(reader: &mut BufReader<R>, writer: &mut W) -> io::Result<usize> {
    let mut copied = 0;
    while let Some(line) = read_line(reader)? {
        write_line(writer, &line)?;
        copied += 1;
        if reader.buffer().is_empty() {
            writer.flush()?;
        }
    }
    writer.flush()?;
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn strips_both_line_endings() {
        let mut input = Cursor::new(b"first\r\nsecond\nlast".to_vec());
        assert_eq!(read_line(&mut input).unwrap().unwrap(), b"first");
        assert_eq!(read_line(&mut input).unwrap().unwrap(), b"second");
        assert_eq!(read_line(&mut input).unwrap().unwrap(), b"last");
        assert_eq!(read_line(&mut input).unwrap(), None);
    }

    #[test]
    fn headers_stop_at_blank_line() {
        let mut input = Cursor::new(b"Host: a\r\nAccept: */*\r\n\r\nbody-not-relayed\n".to_vec());
        let mut out = Vec::new();

        assert_eq!(relay_headers(&mut input, &mut out).unwrap(), 2);
        assert_eq!(out, b"Host: a\nAccept: */*\n\n");
        assert_eq!(read_line(&mut input).unwrap().unwrap(), b"body-not-relayed");
    }

    #[test]
    fn headers_terminated_on_eof() {
        let mut input = Cursor::new(b"Host: a".to_vec());
        let mut out = Vec::new();
        assert_eq!(relay_headers(&mut input, &mut out).unwrap(), 1);
        assert_eq!(out, b"Host: a\n\n");
    }

    #[test]
    fn relays_everything_and_normalizes_endings() {
        let mut input = BufReader::new(Cursor::new(b"HTTP/1.1 200 OK\r\n\r\nhello\r\n".to_vec()));
        let mut out = Vec::new();
        assert_eq!(relay_to_end(&mut input, &mut out).unwrap(), 3);
        assert_eq!(out, b"HTTP/1.1 200 OK\n\nhello\n");
    }
}
