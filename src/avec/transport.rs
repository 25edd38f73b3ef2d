//! Sending requests to a bank.

use std::{
    io::{Read, Write},
    net::TcpStream,
    time::Duration,
};

use thiserror::Error;

use crate::sans::lexer::DATA_ELEMENT_SEPARATOR;

/// Read deadline of [`TcpTransport`].
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Width of the size field in a message header.
const SIZE_WIDTH: usize = 12;

/// Errors occurring while exchanging a message.
#[derive(Debug, Error)]
pub enum TransportError {
    /// An error from the underlying connection.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The response does not start with a readable message header.
    #[error("Invalid response header: {0}")]
    InvalidHeader(String),
    /// Any other failure of a transport.
    #[error("{0}")]
    Other(String),
}

/// A framed message and where to send it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub body: Vec<u8>,
}

/// A framed message received in answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub body: Vec<u8>,
}

/// A blocking request/response channel to a bank.
pub trait Transport {
    fn send(&mut self, request: Request) -> Result<Response, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, request: Request) -> Result<Response, TransportError> {
        (**self).send(request)
    }
}

/// A transport writing messages to a raw socket, as `host:port`.
///
/// A new connection is opened for every request. The response is read up to
/// the size announced in its header.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    timeout: Duration,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self {
            timeout: READ_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, request: Request) -> Result<Response, TransportError> {
        let mut stream = TcpStream::connect(&request.url)?;
        stream.set_read_timeout(Some(self.timeout))?;

        stream.write_all(&request.body)?;
        stream.flush()?;

        Ok(Response {
            body: read_message(&mut stream)?,
        })
    }
}

/// Read one message, sized by the first element of its header.
fn read_message(r: &mut impl Read) -> Result<Vec<u8>, TransportError> {
    let mut body = Vec::new();

    // Header up to and including the separator before the size.
    let mut byte = [0];
    while body.last() != Some(&DATA_ELEMENT_SEPARATOR) {
        r.read_exact(&mut byte)?;
        body.push(byte[0]);

        if body.len() > 64 {
            Err(TransportError::InvalidHeader(
                String::from_utf8_lossy(&body).into_owned(),
            ))?;
        }
    }

    let mut size = [0; SIZE_WIDTH];
    r.read_exact(&mut size)?;
    body.extend_from_slice(&size);

    let size = core::str::from_utf8(&size)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&s| s >= body.len())
        .ok_or_else(|| TransportError::InvalidHeader(String::from_utf8_lossy(&body).into_owned()))?;

    // The announced size is untrusted; only what arrives is allocated.
    let remaining = size - body.len();
    let read = r.take(remaining as u64).read_to_end(&mut body)?;

    if read < remaining {
        Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof))?;
    }

    Ok(body)
}
