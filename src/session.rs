//! Streaming session: one WebSocket connection's lifecycle.
//!
//! A session is opened against an [`Endpoint`], carries its auth headers
//! through the handshake, and is closed on every exit path — [`Drop`] runs
//! [`StreamingSession::close`], so abandoning a pipeline mid-stream never
//! leaks a connection. There is no retry or reconnect logic anywhere: a
//! failed attempt is reported upward exactly once.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use thiserror::Error;
use tungstenite::client::IntoClientRequest;
use tungstenite::http::{HeaderName, HeaderValue};
use tungstenite::{Message, WebSocket};
use url::Url;

use crate::config::Endpoint;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const IO_TIMEOUT: Duration = Duration::from_secs(30);
/// How long to sleep before retrying a read that hit the socket timeout.
const READ_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Session failure taxonomy. A peer-initiated close is not an error; it is
/// reported as [`Frame::Closed`].
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),
}

/// One discrete unit received from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    /// The peer closed the connection. Terminal: every later `receive`
    /// returns this again instead of failing.
    Closed,
}

/// Plain-TCP or TLS stream under the WebSocket, picked by URL scheme.
#[derive(Debug)]
pub(crate) enum Transport {
    Plain(TcpStream),
    Tls(native_tls::TlsStream<TcpStream>),
}

impl Transport {
    fn tcp(&self) -> &TcpStream {
        match self {
            Transport::Plain(stream) => stream,
            Transport::Tls(stream) => stream.get_ref(),
        }
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Transport::Plain(stream) => stream.read(buf),
            Transport::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Transport::Plain(stream) => stream.write(buf),
            Transport::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Transport::Plain(stream) => stream.flush(),
            Transport::Tls(stream) => stream.flush(),
        }
    }
}

/// A live WebSocket connection to one endpoint.
#[derive(Debug)]
pub struct StreamingSession {
    socket: WebSocket<Transport>,
    closed: bool,
}

impl StreamingSession {
    /// Connect to the endpoint and perform the WebSocket handshake with the
    /// endpoint's auth headers attached. Invalid URI, failed TLS/WebSocket
    /// handshake and refused connections all surface as
    /// [`SessionError::Connect`].
    pub fn open(endpoint: &Endpoint) -> Result<Self, SessionError> {
        let url = Url::parse(&endpoint.url)
            .map_err(|e| SessionError::Connect(format!("invalid url '{}': {e}", endpoint.url)))?;

        let secure = match url.scheme() {
            "wss" => true,
            "ws" => false,
            other => {
                return Err(SessionError::Connect(format!(
                    "unsupported scheme '{other}' in '{}'",
                    endpoint.url
                )))
            }
        };
        let host = url
            .host_str()
            .ok_or_else(|| SessionError::Connect(format!("no host in '{}'", endpoint.url)))?
            .to_string();
        let port = url.port().unwrap_or(if secure { 443 } else { 80 });

        let addr = (host.as_str(), port)
            .to_socket_addrs()
            .map_err(|e| SessionError::Connect(format!("cannot resolve {host}: {e}")))?
            .next()
            .ok_or_else(|| SessionError::Connect(format!("cannot resolve {host}")))?;

        let tcp = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
            .map_err(|e| SessionError::Connect(format!("tcp connect to {addr}: {e}")))?;
        tcp.set_nodelay(true)
            .map_err(|e| SessionError::Connect(e.to_string()))?;

        let stream = if secure {
            let connector = native_tls::TlsConnector::new()
                .map_err(|e| SessionError::Connect(format!("tls init: {e}")))?;
            let tls = connector
                .connect(&host, tcp)
                .map_err(|e| SessionError::Connect(format!("tls handshake with {host}: {e}")))?;
            Transport::Tls(tls)
        } else {
            Transport::Plain(tcp)
        };

        let mut request = endpoint
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| SessionError::Connect(e.to_string()))?;
        for (name, value) in &endpoint.auth_header {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| SessionError::Connect(format!("bad header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| SessionError::Connect(format!("bad header value: {e}")))?;
            request.headers_mut().insert(name, value);
        }

        let (socket, _response) = tungstenite::client::client(request, stream)
            .map_err(|e| SessionError::Connect(format!("websocket handshake: {e}")))?;

        // Timeouts go on after the handshake so the handshake itself stays a
        // single blocking call.
        let tcp = socket.get_ref().tcp();
        tcp.set_read_timeout(Some(IO_TIMEOUT))
            .map_err(|e| SessionError::Connect(e.to_string()))?;
        tcp.set_write_timeout(Some(IO_TIMEOUT))
            .map_err(|e| SessionError::Connect(e.to_string()))?;

        log::info!("connected to {}", endpoint.url);
        Ok(Self {
            socket,
            closed: false,
        })
    }

    /// Write one text frame. The payload is assumed to be serialized JSON
    /// produced by the caller.
    pub fn send_text(&mut self, payload: impl Into<String>) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Send("session is closed".to_string()));
        }
        self.socket
            .send(Message::text(payload.into()))
            .map_err(|e| SessionError::Send(e.to_string()))
    }

    /// Write one binary frame.
    pub fn send_binary(&mut self, payload: Vec<u8>) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Send("session is closed".to_string()));
        }
        self.socket
            .send(Message::binary(payload))
            .map_err(|e| SessionError::Send(e.to_string()))
    }

    /// Block until the next data frame arrives or the peer closes. Control
    /// frames are consumed internally; socket read timeouts are retried.
    pub fn receive(&mut self) -> Result<Frame, SessionError> {
        if self.closed {
            return Ok(Frame::Closed);
        }
        loop {
            match self.socket.read() {
                Ok(Message::Text(text)) => return Ok(Frame::Text(text.to_string())),
                Ok(Message::Binary(data)) => return Ok(Frame::Binary(data.to_vec())),
                Ok(Message::Close(_)) => {
                    self.closed = true;
                    return Ok(Frame::Closed);
                }
                // Ping/pong are handled by tungstenite itself.
                Ok(_) => continue,
                Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                    self.closed = true;
                    return Ok(Frame::Closed);
                }
                Err(tungstenite::Error::Io(ref e))
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    std::thread::sleep(READ_RETRY_DELAY);
                    continue;
                }
                Err(e) => return Err(SessionError::Receive(e.to_string())),
            }
        }
    }

    /// Release the connection. Idempotent; errors from an already torn-down
    /// socket are ignored.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.socket.close(None);
        let _ = self.socket.flush();
        log::info!("session closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for StreamingSession {
    fn drop(&mut self) {
        self.close();
    }
}
