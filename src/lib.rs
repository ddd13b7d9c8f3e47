//! # grail-client
//!
//! Async Rust client library for the GRAIL world model protocol: a
//! length-prefixed, alias-compressed, big-endian binary protocol for
//! querying and streaming time-stamped attribute data about named entities
//! over TCP.
//!
//! ## Architecture
//!
//! - **Client side** ([`ClientWorldConnection`]): one background reader
//!   task per connection multiplexes any number of concurrent requests
//!   over one socket, correlated by tickets. Requests come back as
//!   [`Response`] futures (snapshot, URI search) or [`StepResponse`]
//!   streams (range, live stream).
//! - **Solver side** ([`solver`]): simple one-frame-at-a-time writers for
//!   pushing data into a world model, subscribing to an aggregator, and
//!   publishing to a distributor.
//!
//! ## Example
//!
//! ```ignore
//! use grail_client::ClientWorldConnection;
//!
//! #[tokio::main]
//! async fn main() -> grail_client::Result<()> {
//!     let wm = ClientWorldConnection::connect("localhost", 7010).await?;
//!
//!     let snapshot = wm.snapshot_request("cart.*", &["location.*"], 0, 0)?;
//!     for (uri, attributes) in snapshot.get().await? {
//!         println!("{uri}: {} attributes", attributes.len());
//!     }
//!
//!     let stream = wm.stream_request("cart.*", &["location.*"], 1000)?;
//!     while !stream.is_complete() {
//!         for (uri, _) in stream.next().await? {
//!             println!("update for {uri}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod error;
pub mod protocol;
pub mod solver;
pub mod transport;
pub mod types;

mod writer;

pub use client::{ClientWorldConnection, RequestMultiplexer, Response, ResultSlot, StepResponse};
pub use error::{GrailError, RequestError, Result};
pub use solver::{SolverAggregator, SolverDistributor, SolverWorldModel};
pub use types::{
    now_msec, AggregatorRule, Attribute, DataBundle, IdMask, SensorSample, Solution, SolutionType,
    TransientRequest,
};
