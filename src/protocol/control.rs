//! Control codes and protocol identification strings.
//!
//! Every frame's payload begins with a one-byte control code. Each channel
//! in the system has its own code table; the tables below are fixed by the
//! deployed servers and must not be renumbered.

/// Handshake string sent by clients connecting to a world model.
pub const CLIENT_PROTOCOL: &str = "GRAIL client protocol";
/// Handshake string sent by solvers connecting to a world model.
pub const WORLD_MODEL_PROTOCOL: &str = "GRAIL world model protocol";
/// Handshake string sent by solvers connecting to an aggregator.
pub const SOLVER_PROTOCOL: &str = "GRAIL solver protocol";
/// Handshake string sent by solvers connecting to a distributor.
pub const DISTRIBUTOR_PROTOCOL: &str = "GRAIL distributor protocol";

/// Handshake protocol version, currently always zero.
pub const PROTOCOL_VERSION: u16 = 0;

/// Client ↔ world-model channel.
pub mod client {
    pub const KEEP_ALIVE: u8 = 0;
    pub const SNAPSHOT_REQUEST: u8 = 1;
    pub const RANGE_REQUEST: u8 = 2;
    pub const STREAM_REQUEST: u8 = 3;
    pub const ATTRIBUTE_ALIAS: u8 = 4;
    pub const ORIGIN_ALIAS: u8 = 5;
    pub const REQUEST_COMPLETE: u8 = 6;
    pub const CANCEL_REQUEST: u8 = 7;
    pub const DATA_RESPONSE: u8 = 8;
    pub const URI_SEARCH: u8 = 9;
    pub const URI_RESPONSE: u8 = 10;
    pub const ORIGIN_PREFERENCE: u8 = 11;
}

/// Solver ↔ world-model channel.
pub mod solver {
    pub const KEEP_ALIVE: u8 = 0;
    pub const TYPE_ANNOUNCE: u8 = 1;
    pub const START_TRANSIENT: u8 = 2;
    pub const STOP_TRANSIENT: u8 = 3;
    pub const SOLVER_DATA: u8 = 4;
    pub const CREATE_URI: u8 = 5;
    pub const EXPIRE_URI: u8 = 6;
    pub const DELETE_URI: u8 = 7;
    pub const EXPIRE_ATTRIBUTE: u8 = 8;
    pub const DELETE_ATTRIBUTE: u8 = 9;
}

/// Solver ↔ aggregator channel.
pub mod aggregator {
    pub const KEEP_ALIVE: u8 = 0;
    pub const CERTIFICATE: u8 = 1;
    pub const ACK_CERTIFICATE: u8 = 2;
    pub const SUBSCRIPTION_REQUEST: u8 = 3;
    pub const SUBSCRIPTION_RESPONSE: u8 = 4;
    pub const DEVICE_POSITION: u8 = 5;
    pub const SERVER_SAMPLE: u8 = 6;
    pub const BUFFER_OVERRUN: u8 = 7;
}

/// Solver ↔ distributor channel.
pub mod distributor {
    pub const KEEP_ALIVE: u8 = 0;
    pub const TYPE_SPECIFICATION: u8 = 1;
    pub const SOLVER_DATA: u8 = 2;
    pub const TYPE_REQUEST: u8 = 3;
}
