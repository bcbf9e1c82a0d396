//! Trait abstraction for serial port operations to enable testing

use async_trait::async_trait;
use bytes::BytesMut;
use std::io;

/// Longest reply accepted before the partial line is dropped
pub const MAX_LINE_LEN: usize = 256;

/// Trait for serial port I/O operations
#[async_trait]
pub trait SerialPortIO: Send {
    /// Write all data to the port
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;

    /// Read one `\n` terminated line, without the line ending.
    ///
    /// Waits indefinitely; callers bound it with a timeout. Bytes already
    /// received survive a cancelled call.
    async fn read_line(&mut self) -> io::Result<String>;

    /// Drop everything received but not yet read, so the next line is an
    /// answer to the next request.
    async fn discard_input(&mut self) -> io::Result<()>;
}

/// Wrapper around tokio_serial::SerialStream that implements SerialPortIO
pub struct TokioSerialPort {
    port: tokio_serial::SerialStream,
    rx: BytesMut,
}

impl TokioSerialPort {
    pub fn new(port: tokio_serial::SerialStream) -> Self {
        Self {
            port,
            rx: BytesMut::with_capacity(128),
        }
    }
}

/// Split the first complete line off the front of `buf`.
fn take_line(buf: &mut BytesMut) -> Option<String> {
    let end = buf.iter().position(|&b| b == b'\n')?;
    let line = buf.split_to(end + 1);
    let text = String::from_utf8_lossy(&line);
    Some(text.trim_end_matches(['\r', '\n']).to_string())
}

#[async_trait]
impl SerialPortIO for TokioSerialPort {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.flush().await
    }

    async fn read_line(&mut self) -> io::Result<String> {
        use tokio::io::AsyncReadExt;

        loop {
            if let Some(line) = take_line(&mut self.rx) {
                return Ok(line);
            }

            if self.rx.len() > MAX_LINE_LEN {
                self.rx.clear();
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("no line ending within {} bytes", MAX_LINE_LEN),
                ));
            }

            let n = self.port.read_buf(&mut self.rx).await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "serial port closed",
                ));
            }
        }
    }

    async fn discard_input(&mut self) -> io::Result<()> {
        use tokio_serial::{ClearBuffer, SerialPort};

        self.rx.clear();
        self.port.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}
