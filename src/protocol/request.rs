//! Request payload encoders for the client ↔ world-model channel.
//!
//! Each function builds a complete payload (control code first, length
//! prefix NOT included; the transport adds that). Field layouts follow the
//! deployed servers exactly; see [`control::client`](super::control::client)
//! for the code table.

use crate::codec::wire;
use crate::error::Result;
use crate::protocol::control::client;

/// Ticket identifying one logical request; unique while pending.
pub type Ticket = u32;

/// SNAPSHOT_REQUEST: current or historical state, answered once.
pub fn snapshot_request(
    ticket: Ticket,
    name_pattern: &str,
    attribute_patterns: &[&str],
    start: u64,
    stop: u64,
) -> Result<Vec<u8>> {
    query_request(
        client::SNAPSHOT_REQUEST,
        ticket,
        name_pattern,
        attribute_patterns,
        start,
        stop,
    )
}

/// RANGE_REQUEST: time-windowed history, answered in steps.
pub fn range_request(
    ticket: Ticket,
    name_pattern: &str,
    attribute_patterns: &[&str],
    start: u64,
    stop: u64,
) -> Result<Vec<u8>> {
    query_request(
        client::RANGE_REQUEST,
        ticket,
        name_pattern,
        attribute_patterns,
        start,
        stop,
    )
}

/// STREAM_REQUEST: live updates every `update_interval` milliseconds.
///
/// Shares the query shape; the first u64 is reserved and always zero.
pub fn stream_request(
    ticket: Ticket,
    name_pattern: &str,
    attribute_patterns: &[&str],
    update_interval: u64,
) -> Result<Vec<u8>> {
    query_request(
        client::STREAM_REQUEST,
        ticket,
        name_pattern,
        attribute_patterns,
        0,
        update_interval,
    )
}

fn query_request(
    code: u8,
    ticket: Ticket,
    name_pattern: &str,
    attribute_patterns: &[&str],
    first: u64,
    second: u64,
) -> Result<Vec<u8>> {
    let mut buf = vec![code];
    wire::put_u32(&mut buf, ticket);
    wire::put_sized_str(&mut buf, name_pattern)?;
    wire::put_u32(&mut buf, attribute_patterns.len() as u32);
    for pattern in attribute_patterns {
        wire::put_sized_str(&mut buf, pattern)?;
    }
    wire::put_u64(&mut buf, first);
    wire::put_u64(&mut buf, second);
    Ok(buf)
}

/// URI_SEARCH: regex match over entity names. Carries no ticket on the
/// wire; responses correlate by request order.
pub fn uri_search(name_pattern: &str) -> Result<Vec<u8>> {
    let mut buf = vec![client::URI_SEARCH];
    wire::put_widened(&mut buf, name_pattern)?;
    Ok(buf)
}

/// CANCEL_REQUEST for the given ticket.
pub fn cancel_request(ticket: Ticket) -> Vec<u8> {
    let mut buf = vec![client::CANCEL_REQUEST];
    wire::put_u32(&mut buf, ticket);
    buf
}

/// ORIGIN_PREFERENCE: weight data sources by name.
pub fn origin_preference(weights: &[(&str, i32)]) -> Result<Vec<u8>> {
    let mut buf = vec![client::ORIGIN_PREFERENCE];
    for (name, weight) in weights {
        wire::put_sized_str(&mut buf, name)?;
        wire::put_u32(&mut buf, *weight as u32);
    }
    Ok(buf)
}

/// KEEP_ALIVE: control code only.
pub fn keep_alive() -> Vec<u8> {
    vec![client::KEEP_ALIVE]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::wire::WireReader;

    #[test]
    fn test_snapshot_request_layout() {
        let buf = snapshot_request(9, "room.*", &["temperature"], 100, 200).unwrap();

        let mut reader = WireReader::new(&buf);
        assert_eq!(reader.u8("code").unwrap(), client::SNAPSHOT_REQUEST);
        assert_eq!(reader.u32("ticket").unwrap(), 9);
        assert_eq!(reader.sized_str().unwrap(), "room.*");
        assert_eq!(reader.u32("count").unwrap(), 1);
        assert_eq!(reader.sized_str().unwrap(), "temperature");
        assert_eq!(reader.u64("start").unwrap(), 100);
        assert_eq!(reader.u64("stop").unwrap(), 200);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_stream_request_reserved_field_is_zero() {
        let buf = stream_request(1, ".*", &[], 5000).unwrap();

        let mut reader = WireReader::new(&buf);
        assert_eq!(reader.u8("code").unwrap(), client::STREAM_REQUEST);
        assert_eq!(reader.u32("ticket").unwrap(), 1);
        assert_eq!(reader.sized_str().unwrap(), ".*");
        assert_eq!(reader.u32("count").unwrap(), 0);
        assert_eq!(reader.u64("reserved").unwrap(), 0);
        assert_eq!(reader.u64("interval").unwrap(), 5000);
    }

    #[test]
    fn test_uri_search_has_no_ticket() {
        let buf = uri_search("ab").unwrap();
        // Code byte, then the unsized widened pattern; nothing else.
        assert_eq!(buf, vec![client::URI_SEARCH, 0, b'a', 0, b'b']);
    }

    #[test]
    fn test_cancel_request_layout() {
        assert_eq!(cancel_request(0x0102), vec![client::CANCEL_REQUEST, 0, 0, 1, 2]);
    }

    #[test]
    fn test_origin_preference_layout() {
        let buf = origin_preference(&[("solver.fast", -1), ("solver.slow", 2)]).unwrap();

        let mut reader = WireReader::new(&buf);
        assert_eq!(reader.u8("code").unwrap(), client::ORIGIN_PREFERENCE);
        assert_eq!(reader.sized_str().unwrap(), "solver.fast");
        assert_eq!(reader.u32("weight").unwrap() as i32, -1);
        assert_eq!(reader.sized_str().unwrap(), "solver.slow");
        assert_eq!(reader.u32("weight").unwrap() as i32, 2);
        assert!(reader.is_empty());
    }
}
