//! Solver connection to an aggregator: subscribes to raw sensor samples.
//!
//! The aggregator speaks first on this channel, so the handshake is
//! receive-then-send. Subscription rules select transmitters by id/mask
//! pairs per physical layer; the aggregator answers with the rules it
//! actually applied, then relays matching samples.

use std::collections::VecDeque;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::codec::wire::{self, WireReader};
use crate::error::{GrailError, Result};
use crate::protocol::control::{aggregator, SOLVER_PROTOCOL};
use crate::transport::{await_handshake, read_frame, write_frame};
use crate::types::{AggregatorRule, IdMask, SensorSample};

/// A connection between a solver and an aggregator.
pub struct SolverAggregator<S> {
    stream: S,
    connected: bool,
    /// Rules confirmed by the most recent subscription response.
    current_rules: Vec<AggregatorRule>,
    available_samples: VecDeque<SensorSample>,
}

impl SolverAggregator<TcpStream> {
    /// Open a TCP connection and perform the handshake.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        Self::from_stream(stream).await
    }
}

impl<S> SolverAggregator<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Run the solver protocol over an already-established byte stream.
    pub async fn from_stream(mut stream: S) -> Result<Self> {
        let connected = match await_handshake(&mut stream, SOLVER_PROTOCOL).await {
            Ok(()) => true,
            Err(GrailError::HandshakeMismatch { offset }) => {
                tracing::error!(offset, "aggregator handshake mismatch");
                false
            }
            Err(error) => return Err(error),
        };

        Ok(Self {
            stream,
            connected,
            current_rules: Vec::new(),
            available_samples: VecDeque::new(),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Rules confirmed by the most recent SUBSCRIPTION_RESPONSE.
    pub fn current_rules(&self) -> &[AggregatorRule] {
        &self.current_rules
    }

    /// Pop the oldest buffered sample.
    pub fn next_sample(&mut self) -> Option<SensorSample> {
        self.available_samples.pop_front()
    }

    /// Send a subscription and wait for the aggregator's response, which
    /// lands in [`current_rules`](Self::current_rules).
    pub async fn send_subscription(&mut self, rules: &[AggregatorRule]) -> Result<()> {
        if !self.connected {
            return Err(GrailError::NotConnected);
        }

        let mut payload = vec![aggregator::SUBSCRIPTION_REQUEST];
        wire::put_u32(&mut payload, rules.len() as u32);
        for rule in rules {
            payload.push(rule.phy_layer);
            wire::put_u32(&mut payload, rule.transmitters.len() as u32);
            for txer in &rule.transmitters {
                wire::put_u128(&mut payload, txer.id);
                wire::put_u128(&mut payload, txer.mask);
            }
            wire::put_u64(&mut payload, rule.update_interval);
        }
        write_frame(&mut self.stream, &payload).await?;

        // The response to a subscription follows immediately.
        self.handle_message().await?;
        Ok(())
    }

    /// Read and process one message, returning its control code.
    pub async fn handle_message(&mut self) -> Result<u8> {
        if !self.connected {
            return Err(GrailError::NotConnected);
        }
        let frame = read_frame(&mut self.stream).await?;
        match frame.control {
            aggregator::SUBSCRIPTION_RESPONSE => {
                self.current_rules = decode_subscription_response(&frame.body)?;
            }
            aggregator::SERVER_SAMPLE => {
                self.available_samples.push_back(decode_sample(&frame.body)?);
            }
            aggregator::KEEP_ALIVE => {}
            other => {
                tracing::debug!(control = other, "unhandled aggregator message");
            }
        }
        Ok(frame.control)
    }
}

fn decode_subscription_response(body: &[u8]) -> Result<Vec<AggregatorRule>> {
    let mut reader = WireReader::new(body);
    let count = reader.u32("rule count")? as usize;
    // Fixed fields alone are 13 bytes per rule.
    if count * 13 > reader.remaining() {
        return Err(GrailError::Decode(format!(
            "rule count {count} exceeds body size"
        )));
    }

    let mut rules = Vec::with_capacity(count);
    for _ in 0..count {
        let phy_layer = reader.u8("phy layer")?;
        let txer_count = reader.u32("transmitter count")? as usize;
        if txer_count * 32 > reader.remaining() {
            return Err(GrailError::Decode(format!(
                "transmitter count {txer_count} exceeds body size"
            )));
        }
        let mut transmitters = Vec::with_capacity(txer_count);
        for _ in 0..txer_count {
            let id = reader.u128("transmitter id")?;
            let mask = reader.u128("transmitter mask")?;
            transmitters.push(IdMask::new(id, mask));
        }
        let update_interval = reader.u64("update interval")?;
        rules.push(AggregatorRule {
            phy_layer,
            transmitters,
            update_interval,
        });
    }
    Ok(rules)
}

fn decode_sample(body: &[u8]) -> Result<SensorSample> {
    let mut reader = WireReader::new(body);
    let phy_layer = reader.u8("phy layer")?;
    let transmitter = reader.u128("transmitter id")?;
    let receiver = reader.u128("receiver id")?;
    let timestamp = reader.f64("timestamp")?;
    let rssi = reader.f32("rssi")?;
    let data = Bytes::copy_from_slice(reader.rest());
    Ok(SensorSample {
        phy_layer,
        transmitter,
        receiver,
        timestamp,
        rssi,
        data,
    })
}
