//! Solver connection to a world model: pushes solved attribute data.
//!
//! The world model learns attribute names through TYPE_ANNOUNCE messages;
//! afterwards SOLVER_DATA frames carry only the alias. Aliases are assigned
//! by this connection's own [`AliasRegistry`]; each connection counts from
//! zero independently.
//!
//! There is no background task here. The world model only ever initiates
//! transient start/stop requests; callers that care poll them through
//! [`handle_message`](SolverWorldModel::handle_message).

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::codec::wire::{self, WireReader};
use crate::error::{GrailError, Result};
use crate::protocol::control::{solver, WORLD_MODEL_PROTOCOL};
use crate::protocol::AliasRegistry;
use crate::transport::{initiate_handshake, read_frame, write_frame};
use crate::types::{DataBundle, TransientRequest};

/// Callback invoked with decoded transient start/stop requests.
pub type TransientCallback = Box<dyn FnMut(Vec<TransientRequest>) + Send>;

/// A connection between a solver and a world model.
pub struct SolverWorldModel<S> {
    stream: S,
    origin: String,
    types: AliasRegistry,
    connected: bool,
    on_start_transient: Option<TransientCallback>,
    on_stop_transient: Option<TransientCallback>,
}

impl SolverWorldModel<TcpStream> {
    /// Open a TCP connection and perform the handshake.
    ///
    /// `origin` names this solver as the source of everything it pushes.
    pub async fn connect(host: &str, port: u16, origin: &str) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        Self::from_stream(stream, origin).await
    }
}

impl<S> SolverWorldModel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Run the solver protocol over an already-established byte stream.
    ///
    /// As on the client channel, a handshake mismatch leaves the socket
    /// open but the connection unusable.
    pub async fn from_stream(mut stream: S, origin: &str) -> Result<Self> {
        let connected = match initiate_handshake(&mut stream, WORLD_MODEL_PROTOCOL).await {
            Ok(()) => true,
            Err(GrailError::HandshakeMismatch { offset }) => {
                tracing::error!(offset, "world model handshake mismatch");
                false
            }
            Err(error) => return Err(error),
        };

        Ok(Self {
            stream,
            origin: origin.to_string(),
            types: AliasRegistry::new(),
            connected,
            on_start_transient: None,
            on_stop_transient: None,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Register a callback for START_TRANSIENT requests.
    pub fn on_start_transient(&mut self, callback: TransientCallback) {
        self.on_start_transient = Some(callback);
    }

    /// Register a callback for STOP_TRANSIENT requests.
    pub fn on_stop_transient(&mut self, callback: TransientCallback) {
        self.on_stop_transient = Some(callback);
    }

    /// Announce solution types, assigning aliases to any new names.
    pub async fn add_solution_types(&mut self, names: &[&str]) -> Result<()> {
        let mut announced = Vec::new();
        for name in names {
            let (alias, is_new) = self.types.intern(name);
            if is_new {
                announced.push((alias, name.to_string()));
            }
        }
        if announced.is_empty() {
            return Ok(());
        }

        let mut payload = vec![solver::TYPE_ANNOUNCE];
        wire::put_u32(&mut payload, announced.len() as u32);
        for (alias, name) in &announced {
            wire::put_u32(&mut payload, *alias);
            wire::put_sized_str(&mut payload, name)?;
            // Transient flag: this solver only announces on-demand-off types.
            payload.push(0);
        }
        wire::put_widened(&mut payload, &self.origin)?;
        self.send(&payload).await
    }

    /// Push attribute data, announcing any not-yet-declared solution types
    /// first. With `create_uris` the world model creates unknown entities
    /// instead of dropping their data.
    pub async fn push_data(&mut self, bundles: &[DataBundle], create_uris: bool) -> Result<()> {
        let names: Vec<&str> = bundles
            .iter()
            .flat_map(|b| b.attributes.iter().map(|a| a.name.as_str()))
            .collect();
        self.add_solution_types(&names).await?;

        let total: usize = bundles.iter().map(|b| b.attributes.len()).sum();

        let mut payload = vec![solver::SOLVER_DATA];
        payload.push(u8::from(create_uris));
        wire::put_u32(&mut payload, total as u32);
        for bundle in bundles {
            for attribute in &bundle.attributes {
                let alias = self
                    .types
                    .get(&attribute.name)
                    .expect("attribute name interned above");
                wire::put_u32(&mut payload, alias);
                wire::put_u64(&mut payload, attribute.creation);
                wire::put_sized_str(&mut payload, &bundle.uri)?;
                wire::put_u32(&mut payload, attribute.data.len() as u32);
                payload.extend_from_slice(&attribute.data);
            }
        }
        self.send(&payload).await
    }

    /// Create an entity with the given name.
    pub async fn create_uri(&mut self, uri: &str, creation: u64) -> Result<()> {
        let mut payload = vec![solver::CREATE_URI];
        wire::put_sized_str(&mut payload, uri)?;
        wire::put_u64(&mut payload, creation);
        wire::put_widened(&mut payload, &self.origin)?;
        self.send(&payload).await
    }

    /// Mark an entity invalid after the given time.
    pub async fn expire_uri(&mut self, uri: &str, expiration: u64) -> Result<()> {
        let mut payload = vec![solver::EXPIRE_URI];
        wire::put_sized_str(&mut payload, uri)?;
        wire::put_u64(&mut payload, expiration);
        wire::put_widened(&mut payload, &self.origin)?;
        self.send(&payload).await
    }

    /// Delete an entity and its attributes.
    pub async fn delete_uri(&mut self, uri: &str) -> Result<()> {
        let mut payload = vec![solver::DELETE_URI];
        wire::put_sized_str(&mut payload, uri)?;
        wire::put_widened(&mut payload, &self.origin)?;
        self.send(&payload).await
    }

    /// Read and process one message from the world model, returning its
    /// control code. Transient requests are delivered to the registered
    /// callbacks; anything else is ignored.
    pub async fn handle_message(&mut self) -> Result<u8> {
        if !self.connected {
            return Err(GrailError::NotConnected);
        }
        let frame = read_frame(&mut self.stream).await?;
        match frame.control {
            solver::START_TRANSIENT => {
                let requests = decode_transient_list(&frame.body)?;
                if let Some(callback) = self.on_start_transient.as_mut() {
                    callback(requests);
                }
            }
            solver::STOP_TRANSIENT => {
                let requests = decode_transient_list(&frame.body)?;
                if let Some(callback) = self.on_stop_transient.as_mut() {
                    callback(requests);
                }
            }
            solver::KEEP_ALIVE => {}
            other => {
                tracing::debug!(control = other, "unhandled world model message");
            }
        }
        Ok(frame.control)
    }

    async fn send(&mut self, payload: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(GrailError::NotConnected);
        }
        write_frame(&mut self.stream, payload).await
    }
}

/// Decode a START_TRANSIENT / STOP_TRANSIENT body: a count, then per entry
/// a type alias, an expression count, and that many sized expressions.
fn decode_transient_list(body: &[u8]) -> Result<Vec<TransientRequest>> {
    let mut reader = WireReader::new(body);
    let count = reader.u32("transient count")? as usize;
    if count * 8 > reader.remaining() {
        return Err(GrailError::Decode(format!(
            "transient count {count} exceeds body size"
        )));
    }

    let mut requests = Vec::with_capacity(count);
    for _ in 0..count {
        let type_alias = reader.u32("type alias")?;
        let expressions = reader.u32("expression count")? as usize;
        let mut request = TransientRequest {
            type_alias,
            expressions: Vec::with_capacity(expressions),
        };
        for _ in 0..expressions {
            request.expressions.push(reader.sized_str()?);
        }
        requests.push(request);
    }
    Ok(requests)
}
