//! Data records exchanged with the world model, aggregator, and
//! distributor. These are plain containers; all wire logic lives in
//! `codec` and `protocol`.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

/// Current time in milliseconds since the epoch, the timestamp format used
/// on every attribute in the system.
pub fn now_msec() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// One attribute of a world-model entity, immutable once decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name, e.g. `location.gps`.
    pub name: String,
    /// Opaque binary payload.
    pub data: Bytes,
    /// Creation timestamp, milliseconds since the epoch.
    pub creation: u64,
    /// Expiration timestamp; zero means unexpired.
    pub expiration: u64,
    /// Name of the data source that produced this attribute.
    pub origin: String,
}

impl Attribute {
    pub fn new(
        name: impl Into<String>,
        data: impl Into<Bytes>,
        creation: u64,
        expiration: u64,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            creation,
            expiration,
            origin: origin.into(),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}: {:02x?}",
            self.name, self.creation, self.expiration, self.origin, &self.data[..]
        )
    }
}

/// One decoded DATA_RESPONSE frame: an entity and its attributes, tagged
/// with the ticket of the request it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBundle {
    pub uri: String,
    pub attributes: Vec<Attribute>,
    pub ticket: u32,
}

impl DataBundle {
    pub fn new(uri: impl Into<String>, attributes: Vec<Attribute>, ticket: u32) -> Self {
        Self {
            uri: uri.into(),
            attributes,
            ticket,
        }
    }
}

/// A transmitter/mask pair in an aggregator subscription rule.
///
/// Identifiers are nominally 128-bit but the wire format carries only the
/// low 64 bits, zero-padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdMask {
    pub id: u128,
    pub mask: u128,
}

impl IdMask {
    /// Match exactly one transmitter id.
    pub fn exact(id: u128) -> Self {
        Self {
            id,
            mask: u64::MAX as u128,
        }
    }

    pub fn new(id: u128, mask: u128) -> Self {
        Self { id, mask }
    }
}

/// One aggregator subscription rule: a physical layer, the transmitters of
/// interest, and a millisecond update interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorRule {
    pub phy_layer: u8,
    pub transmitters: Vec<IdMask>,
    pub update_interval: u64,
}

/// One sensor reading relayed by an aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSample {
    pub phy_layer: u8,
    pub transmitter: u128,
    pub receiver: u128,
    /// Receive timestamp, seconds (fractional) since the epoch.
    pub timestamp: f64,
    /// Received signal strength in dBm.
    pub rssi: f32,
    pub data: Bytes,
}

impl fmt::Display for SensorSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: (phy {}) {:x} -> {:x}, RSS:{}, {} data bytes",
            self.timestamp,
            self.phy_layer,
            self.transmitter,
            self.receiver,
            self.rssi,
            self.data.len()
        )
    }
}

/// A transient attribute type the world model asked a solver to start or
/// stop producing, with the on-demand request expressions attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientRequest {
    pub type_alias: u32,
    pub expressions: Vec<String>,
}

/// A solution type a solver announces to a distributor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionType {
    pub type_alias: u32,
    pub uri: String,
}

/// One produced solution bound for a distributor: the target entity, the
/// solution type name, and the opaque solution bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub target: String,
    pub name: String,
    pub data: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_msec_is_millisecond_scale() {
        let t = now_msec();
        // Well after 2020-01-01 and far below any microsecond-scale value.
        assert!(t > 1_577_836_800_000);
        assert!(t < 100_000_000_000_000);
    }

    #[test]
    fn test_exact_id_mask_covers_low_64_bits() {
        let mask = IdMask::exact(0x42);
        assert_eq!(mask.id, 0x42);
        assert_eq!(mask.mask, u64::MAX as u128);
    }
}
