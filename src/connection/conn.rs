//! Single Connection
//!
//! One [`Connection`] performs one request/reply exchange at a time. The
//! dial path applies the per-connection options from the configuration:
//! connect timeout, AUTH when a password is set, and SELECT when a logical
//! database index is set.
//!
//! Every exchange is bounded by the configured I/O timeout. A timed-out or
//! failed exchange leaves the stream desynchronized, so the pool never
//! returns such a connection to its idle queue.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;

use std::time::Duration;

use crate::config::{StoreConfig, Transport};
use crate::error::{StoreError, StoreResult};
use crate::protocol::{decode_reply, encode_command, Reply};

/// Initial capacity for the reply buffer.
const READ_BUF_CAPACITY: usize = 4 * 1024;

enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Stream {
    async fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        match self {
            Stream::Tcp(s) => s.write_all(data).await,
            #[cfg(unix)]
            Stream::Unix(s) => s.write_all(data).await,
        }
    }

    async fn read_buf(&mut self, buf: &mut BytesMut) -> std::io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.read_buf(buf).await,
            #[cfg(unix)]
            Stream::Unix(s) => s.read_buf(buf).await,
        }
    }
}

/// A single RESP connection with reusable buffers.
pub(crate) struct Connection {
    stream: Stream,
    read_buf: BytesMut,
    write_buf: Vec<u8>,
}

impl Connection {
    /// Dials the configured address and runs the option handshake.
    pub(crate) async fn dial(config: &StoreConfig) -> StoreResult<Self> {
        let stream = connect_stream(config).await?;

        let mut conn = Connection {
            stream,
            read_buf: BytesMut::with_capacity(READ_BUF_CAPACITY),
            write_buf: Vec::with_capacity(256),
        };

        if let Some(password) = &config.password {
            conn.handshake(&[b"AUTH", password.as_bytes()], config).await?;
        }
        if let Some(database) = config.database {
            let index = database.to_string();
            conn.handshake(&[b"SELECT", index.as_bytes()], config).await?;
        }

        Ok(conn)
    }

    /// Runs one handshake command, mapping every failure to `Connection`.
    async fn handshake(
        &mut self,
        args: &[&[u8]],
        config: &StoreConfig,
    ) -> StoreResult<()> {
        match self.exec(args, config.io_timeout()).await {
            Ok(_) => Ok(()),
            Err(err) => Err(StoreError::Connection(err.to_string())),
        }
    }

    /// Sends one command and reads one reply, bounded by `timeout`.
    ///
    /// Server-side `-ERR` replies surface as [`StoreError::Server`]; the
    /// stream itself remains usable after them.
    pub(crate) async fn exec(
        &mut self,
        args: &[&[u8]],
        timeout: Option<Duration>,
    ) -> StoreResult<Reply> {
        self.write_buf.clear();
        encode_command(args, &mut self.write_buf);

        let exchange = async {
            self.stream.write_all(&self.write_buf).await?;
            loop {
                if let Some((reply, consumed)) = decode_reply(&self.read_buf)? {
                    self.read_buf.advance(consumed);
                    return match reply {
                        Reply::Error(message) => Err(StoreError::Server(message)),
                        other => Ok(other),
                    };
                }
                let read = self.stream.read_buf(&mut self.read_buf).await?;
                if read == 0 {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "server closed the connection",
                    )
                    .into());
                }
            }
        };

        match timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| StoreError::Timeout(limit))?,
            None => exchange.await,
        }
    }
}

async fn connect_stream(config: &StoreConfig) -> StoreResult<Stream> {
    let dial = async {
        match config.transport {
            Transport::Tcp => {
                let stream = TcpStream::connect(&config.addr).await?;
                // Small request/reply payloads; Nagle only adds latency.
                stream.set_nodelay(true)?;
                Ok::<_, std::io::Error>(Stream::Tcp(stream))
            }
            #[cfg(unix)]
            Transport::Unix => {
                let stream = UnixStream::connect(&config.addr).await?;
                Ok(Stream::Unix(stream))
            }
        }
    };

    let result = match config.io_timeout() {
        Some(limit) => tokio::time::timeout(limit, dial)
            .await
            .map_err(|_| StoreError::Connection(format!(
                "connect to {} timed out after {:?}",
                config.addr, limit
            )))?,
        None => dial.await,
    };

    result.map_err(|err| {
        StoreError::Connection(format!("dial {}: {}", config.addr, err))
    })
}
