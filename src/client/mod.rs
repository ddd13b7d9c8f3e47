//! Client connection to a world model.
//!
//! [`ClientWorldConnection`] owns one TCP stream and multiplexes any number
//! of logical requests over it. The lifecycle:
//! 1. Connect and exchange the version handshake
//! 2. Split the stream; spawn the writer task and the background reader
//! 3. Hand out [`Response`]/[`StepResponse`] handles as requests are issued
//!
//! The reader loop continuously pulls frames off the socket and dispatches
//! them into the [`RequestMultiplexer`]; it is the only task that blocks on
//! reads, and the alias tables it maintains are local to it. When the
//! connection dies, every pending request is failed with a transport error
//! so no caller is left hanging.

mod multiplexer;
mod response;

pub use multiplexer::{RequestMultiplexer, ResultSlot};
pub use response::{Response, StepResponse};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use crate::error::{GrailError, RequestError, Result};
use crate::protocol::control::{client as codes, CLIENT_PROTOCOL};
use crate::protocol::{request, response as decode, AliasTable, Frame, FrameBuffer};
use crate::transport::initiate_handshake;
use crate::writer::{spawn_writer_task, OutboundFrame, WriterHandle};

/// State shared between the connection object, its handles, and its tasks.
pub(crate) struct ConnectionCore {
    pub(crate) mux: RequestMultiplexer,
    writer: WriterHandle,
    connected: AtomicBool,
}

impl ConnectionCore {
    fn enqueue(&self, payload: Vec<u8>) -> Result<()> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(GrailError::NotConnected);
        }
        self.writer.send(OutboundFrame::new(Bytes::from(payload)))
    }

    /// Send a CANCEL_REQUEST and mark the ticket cancelled locally.
    ///
    /// Fire-and-forget: no acknowledgment is expected, and a dead
    /// connection still gets the local bookkeeping so the next poll
    /// observes completion.
    pub(crate) fn cancel_request(&self, ticket: u32) {
        if let Err(error) = self.enqueue(request::cancel_request(ticket)) {
            tracing::debug!(ticket, %error, "cancel not sent");
        }
        self.mux.cancel(ticket);
    }

    fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
    }
}

/// A connection between a client and a world model.
pub struct ClientWorldConnection {
    core: Arc<ConnectionCore>,
    reader_task: Option<JoinHandle<()>>,
    writer_task: Option<JoinHandle<Result<()>>>,
}

impl ClientWorldConnection {
    /// Open a TCP connection and perform the handshake.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        Self::from_stream(stream).await
    }

    /// Run the client protocol over an already-established byte stream.
    ///
    /// A handshake mismatch does NOT abort the stream: the returned
    /// connection reports `is_connected() == false` and every request
    /// fails with `NotConnected`, but the socket is left open for the
    /// caller to inspect or drop.
    pub async fn from_stream<S>(mut stream: S) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        match initiate_handshake(&mut stream, CLIENT_PROTOCOL).await {
            Ok(()) => {}
            Err(GrailError::HandshakeMismatch { offset }) => {
                tracing::error!(offset, "world model handshake mismatch");
                return Ok(Self {
                    core: Arc::new(ConnectionCore {
                        mux: RequestMultiplexer::new(),
                        writer: WriterHandle::detached(),
                        connected: AtomicBool::new(false),
                    }),
                    reader_task: None,
                    writer_task: None,
                });
            }
            Err(error) => return Err(error),
        }

        let (read_half, write_half) = tokio::io::split(stream);
        let (writer, writer_task) = spawn_writer_task(write_half);

        let core = Arc::new(ConnectionCore {
            mux: RequestMultiplexer::new(),
            writer,
            connected: AtomicBool::new(true),
        });

        let reader_core = core.clone();
        let reader_task = tokio::spawn(async move {
            if let Err(error) = Self::read_loop(read_half, &reader_core).await {
                tracing::error!(%error, "reader loop ended");
            }
        });

        Ok(Self {
            core,
            reader_task: Some(reader_task),
            writer_task: Some(writer_task),
        })
    }

    /// Whether the handshake succeeded and the connection is still up.
    pub fn is_connected(&self) -> bool {
        self.core.connected.load(Ordering::Acquire)
    }

    /// Request a snapshot of matching entities' current or historical
    /// state. Answered exactly once.
    pub fn snapshot_request(
        &self,
        name_pattern: &str,
        attribute_patterns: &[&str],
        start: u64,
        stop: u64,
    ) -> Result<Response> {
        let ticket = self.core.mux.issue(
            true,
            false,
            |ticket| request::snapshot_request(ticket, name_pattern, attribute_patterns, start, stop),
            |payload| self.core.enqueue(payload),
        )?;
        Ok(Response::new(self.core.clone(), ticket))
    }

    /// Request matching state over a time range, answered in steps.
    pub fn range_request(
        &self,
        name_pattern: &str,
        attribute_patterns: &[&str],
        start: u64,
        stop: u64,
    ) -> Result<StepResponse> {
        let ticket = self.core.mux.issue(
            false,
            false,
            |ticket| request::range_request(ticket, name_pattern, attribute_patterns, start, stop),
            |payload| self.core.enqueue(payload),
        )?;
        Ok(StepResponse::new(self.core.clone(), ticket))
    }

    /// Request live updates for matching state every `update_interval`
    /// milliseconds, until cancelled or the server completes the stream.
    pub fn stream_request(
        &self,
        name_pattern: &str,
        attribute_patterns: &[&str],
        update_interval: u64,
    ) -> Result<StepResponse> {
        let ticket = self.core.mux.issue(
            false,
            false,
            |ticket| {
                request::stream_request(ticket, name_pattern, attribute_patterns, update_interval)
            },
            |payload| self.core.enqueue(payload),
        )?;
        Ok(StepResponse::new(self.core.clone(), ticket))
    }

    /// Search for entity names matching a POSIX regex pattern.
    ///
    /// The request carries no ticket on the wire; responses are matched to
    /// searches strictly in issue order.
    pub fn uri_search(&self, name_pattern: &str) -> Result<Response> {
        let ticket = self.core.mux.issue(
            true,
            true,
            |_| request::uri_search(name_pattern),
            |payload| self.core.enqueue(payload),
        )?;
        Ok(Response::new(self.core.clone(), ticket))
    }

    /// Weight preferred data origins by name. Fire-and-forget.
    pub fn set_origin_preference(&self, weights: &[(&str, i32)]) -> Result<()> {
        self.core.enqueue(request::origin_preference(weights)?)
    }

    /// Cancel an outstanding request by ticket.
    pub fn cancel_request(&self, ticket: u32) {
        self.core.cancel_request(ticket);
    }

    /// Send a KEEP_ALIVE frame.
    pub fn send_keep_alive(&self) -> Result<()> {
        self.core.enqueue(request::keep_alive())
    }

    /// Close the connection: fail pending requests and stop both tasks.
    pub fn close(&mut self) {
        self.core.mark_disconnected();
        self.core
            .mux
            .fail_all(RequestError::Transport("connection closed".to_string()));
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        if let Some(task) = self.writer_task.take() {
            task.abort();
        }
    }

    /// Frame-pump loop run by the background reader task.
    async fn read_loop<R>(mut reader: R, core: &ConnectionCore) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut attribute_aliases = AliasTable::new();
        let mut origin_aliases = AliasTable::new();
        let mut frame_buffer = FrameBuffer::new();
        let mut buf = vec![0u8; 64 * 1024];

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => {
                    Self::fail_connection(core, "connection closed by peer");
                    return Ok(());
                }
                Ok(n) => n,
                Err(error) => {
                    Self::fail_connection(core, &error.to_string());
                    return Err(error.into());
                }
            };

            let frames = match frame_buffer.push(&buf[..n]) {
                Ok(frames) => frames,
                Err(error) => {
                    Self::fail_connection(core, &error.to_string());
                    return Err(error);
                }
            };

            for frame in frames {
                if let Err(error) =
                    Self::dispatch(&frame, core, &mut attribute_aliases, &mut origin_aliases)
                {
                    // Not attributable to a ticket: connection-fatal.
                    Self::fail_connection(core, &error.to_string());
                    return Err(error);
                }
            }
        }
    }

    fn fail_connection(core: &ConnectionCore, reason: &str) {
        tracing::warn!(reason, "world model connection lost");
        core.mark_disconnected();
        core.mux.fail_all(RequestError::Transport(reason.to_string()));
    }

    /// Route one frame into the multiplexer or the alias tables.
    fn dispatch(
        frame: &Frame,
        core: &ConnectionCore,
        attribute_aliases: &mut AliasTable,
        origin_aliases: &mut AliasTable,
    ) -> Result<()> {
        match frame.control {
            codes::KEEP_ALIVE => {}
            codes::ATTRIBUTE_ALIAS => {
                for (alias, name) in decode::decode_alias_list(&frame.body)? {
                    attribute_aliases.insert(alias, name);
                }
            }
            codes::ORIGIN_ALIAS => {
                for (alias, name) in decode::decode_alias_list(&frame.body)? {
                    origin_aliases.insert(alias, name);
                }
            }
            codes::REQUEST_COMPLETE => {
                core.mux.on_complete(decode::decode_ticket(&frame.body)?);
            }
            codes::DATA_RESPONSE => {
                match decode::decode_data_response(&frame.body, attribute_aliases, origin_aliases)
                {
                    Ok(bundle) => core.mux.on_data(bundle),
                    Err(error) => match error.ticket {
                        Some(ticket) => {
                            tracing::warn!(ticket, message = %error.message, "bad data response");
                            core.mux
                                .record_error(ticket, RequestError::Decode(error.message));
                        }
                        None => return Err(GrailError::Decode(error.message)),
                    },
                }
            }
            codes::URI_RESPONSE => {
                core.mux
                    .on_uri_response(decode::decode_uri_response(&frame.body)?);
            }
            other => {
                tracing::warn!(control = other, "unhandled control code");
            }
        }
        Ok(())
    }
}

impl Drop for ClientWorldConnection {
    fn drop(&mut self) {
        self.close();
    }
}
