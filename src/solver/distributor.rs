//! Solver connection to a distributor: publishes finished solutions.
//!
//! The distributor speaks first (receive-then-send handshake). Solution
//! type aliases on this channel are chosen by the caller (they come with
//! the [`SolutionType`]s) rather than interned here, so a solver can keep
//! stable aliases across reconnects.

use std::collections::HashMap;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::codec::wire;
use crate::error::{GrailError, Result};
use crate::protocol::control::{distributor, DISTRIBUTOR_PROTOCOL};
use crate::transport::{await_handshake, write_frame};
use crate::types::{Solution, SolutionType};

/// A connection between a solver and a distributor.
pub struct SolverDistributor<S> {
    stream: S,
    connected: bool,
    name_to_alias: HashMap<String, u32>,
}

impl SolverDistributor<TcpStream> {
    /// Open a TCP connection, perform the handshake, and announce the
    /// given solution types.
    pub async fn connect(host: &str, port: u16, types: &[SolutionType]) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        Self::from_stream(stream, types).await
    }
}

impl<S> SolverDistributor<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Run the distributor protocol over an already-established byte
    /// stream.
    pub async fn from_stream(mut stream: S, types: &[SolutionType]) -> Result<Self> {
        let connected = match await_handshake(&mut stream, DISTRIBUTOR_PROTOCOL).await {
            Ok(()) => true,
            Err(GrailError::HandshakeMismatch { offset }) => {
                tracing::error!(offset, "distributor handshake mismatch");
                false
            }
            Err(error) => return Err(error),
        };

        let mut this = Self {
            stream,
            connected,
            name_to_alias: HashMap::new(),
        };
        if this.connected && !types.is_empty() {
            this.add_solution_types(types).await?;
        }
        Ok(this)
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Announce solution types with their caller-chosen aliases.
    pub async fn add_solution_types(&mut self, types: &[SolutionType]) -> Result<()> {
        if !self.connected {
            return Err(GrailError::NotConnected);
        }

        let mut payload = vec![distributor::TYPE_SPECIFICATION];
        wire::put_u32(&mut payload, types.len() as u32);
        for solution_type in types {
            self.name_to_alias
                .insert(solution_type.uri.clone(), solution_type.type_alias);
            wire::put_u32(&mut payload, solution_type.type_alias);
            wire::put_sized_str(&mut payload, &solution_type.uri)?;
        }
        write_frame(&mut self.stream, &payload).await
    }

    /// Send solutions for one region at one time.
    ///
    /// Solutions whose type was never announced have no alias to send
    /// under; they are rejected with a warning and the rest go through.
    pub async fn send_solutions(
        &mut self,
        region: &str,
        solution_time: u64,
        solutions: &[Solution],
    ) -> Result<()> {
        if !self.connected {
            return Err(GrailError::NotConnected);
        }

        let (known, unknown): (Vec<&Solution>, Vec<&Solution>) = solutions
            .iter()
            .partition(|s| self.name_to_alias.contains_key(&s.name));
        for rejected in unknown {
            tracing::warn!(
                target = rejected.target,
                name = rejected.name,
                "rejecting solution of unannounced type"
            );
        }

        let mut payload = vec![distributor::SOLVER_DATA];
        wire::put_sized_str(&mut payload, region)?;
        wire::put_u64(&mut payload, solution_time);
        wire::put_u32(&mut payload, known.len() as u32);
        for solution in known {
            wire::put_u32(&mut payload, self.name_to_alias[&solution.name]);
            wire::put_sized_str(&mut payload, &solution.target)?;
            wire::put_u32(&mut payload, solution.data.len() as u32);
            payload.extend_from_slice(&solution.data);
        }
        write_frame(&mut self.stream, &payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::wire::WireReader;
    use crate::transport::{handshake_bytes, read_frame};
    use bytes::Bytes;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
    use tokio::io::{AsyncRead, AsyncWrite};

    async fn accept_distributor(
        server: &mut (impl AsyncRead + AsyncWrite + Unpin),
    ) {
        let shake = handshake_bytes(DISTRIBUTOR_PROTOCOL);
        server.write_all(&shake).await.unwrap();
        let mut echo = vec![0u8; shake.len()];
        server.read_exact(&mut echo).await.unwrap();
        assert_eq!(echo, shake);
    }

    #[tokio::test]
    async fn test_type_specification_sent_on_connect() {
        let (client, mut server) = duplex(4096);

        let types = vec![SolutionType {
            type_alias: 4,
            uri: "position".to_string(),
        }];
        let connect = SolverDistributor::from_stream(client, &types);
        let (result, frame) = tokio::join!(connect, async {
            accept_distributor(&mut server).await;
            read_frame(&mut server).await.unwrap()
        });
        result.unwrap();

        assert_eq!(frame.control, distributor::TYPE_SPECIFICATION);
        let mut reader = WireReader::new(&frame.body);
        assert_eq!(reader.u32("count").unwrap(), 1);
        assert_eq!(reader.u32("alias").unwrap(), 4);
        assert_eq!(reader.sized_str().unwrap(), "position");
    }

    #[tokio::test]
    async fn test_unannounced_solutions_are_dropped() {
        let (client, mut server) = duplex(4096);

        let types = vec![SolutionType {
            type_alias: 1,
            uri: "known".to_string(),
        }];
        let (dist, _) = tokio::join!(SolverDistributor::from_stream(client, &types), async {
            accept_distributor(&mut server).await;
            read_frame(&mut server).await.unwrap()
        });
        let mut dist = dist.unwrap();

        let solutions = vec![
            Solution {
                target: "cart.1".to_string(),
                name: "known".to_string(),
                data: Bytes::from_static(&[1]),
            },
            Solution {
                target: "cart.2".to_string(),
                name: "never announced".to_string(),
                data: Bytes::from_static(&[2]),
            },
        ];
        let (sent, frame) = tokio::join!(dist.send_solutions("region.a", 99, &solutions), async {
            read_frame(&mut server).await.unwrap()
        });
        sent.unwrap();

        assert_eq!(frame.control, distributor::SOLVER_DATA);
        let mut reader = WireReader::new(&frame.body);
        assert_eq!(reader.sized_str().unwrap(), "region.a");
        assert_eq!(reader.u64("time").unwrap(), 99);
        // Only the announced solution survived.
        assert_eq!(reader.u32("count").unwrap(), 1);
        assert_eq!(reader.u32("alias").unwrap(), 1);
        assert_eq!(reader.sized_str().unwrap(), "cart.1");
    }
}
