//! Direct-mode handler: a stand-in backend answering every request itself.

use std::io::{BufReader, BufWriter, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::net::connection::ConnectionId;
use crate::observability::metrics;
use crate::proxy::{wire, ProxyError};

const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Reads a request head, discards it and answers with a fixed
/// `200 OK` naming the serving port.
///
/// A port of `0` means "whatever port the connection arrived on".
#[derive(Debug, Clone)]
pub struct DirectResponder {
    port: u16,
    read_timeout: Option<Duration>,
}

impl DirectResponder {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            read_timeout: None,
        }
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn respond(&self, stream: TcpStream, conn: ConnectionId) -> Result<(), ProxyError> {
        let port = match self.port {
            0 => stream.local_addr()?.port(),
            port => port,
        };
        stream.set_read_timeout(self.read_timeout)?;
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = BufWriter::new(stream);

        let mut lines = 0usize;
        while let Some(line) = wire::read_line(&mut reader)? {
            if line.is_empty() {
                break;
            }
            tracing::trace!(connection_id = %conn, line = %String::from_utf8_lossy(&line), "Received request line");
            lines += 1;
        }

        let body = body(port);
        write_response(&mut writer, &body)?;
        writer.flush()?;

        tracing::debug!(connection_id = %conn, port, request_lines = lines, "Sent direct response");
        metrics::record_direct_response(port);
        Ok(())
    }
}

/// Body of every response from `port`.
pub fn body(port: u16) -> String {
    format!("Hello from the server {}", port)
}

fn write_response<W: Write>(writer: &mut W, body: &str) -> std::io::Result<()> {
    wire::write_line(writer, b"HTTP/1.1 200 OK")?;
    wire::write_line(writer, format!("Content-Type: {}", CONTENT_TYPE).as_bytes())?;
    wire::write_line(writer, format!("Content-Length: {}", body.len()).as_bytes())?;
    wire::write_line(writer, b"")?;
    wire::write_line(writer, body.as_bytes())
}
