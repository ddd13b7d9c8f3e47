//! Response payload decoders for the client ↔ world-model channel.
//!
//! All decoders take the frame body (control code already stripped) and
//! fail loudly on truncated or inconsistent data. Data responses resolve
//! attribute and origin aliases through the connection's [`AliasTable`]s;
//! an unresolved alias is an error, not a placeholder.

use bytes::Bytes;

use crate::codec::wire::WireReader;
use crate::error::{GrailError, Result};
use crate::protocol::AliasTable;
use crate::types::{Attribute, DataBundle};

/// Decode an ATTRIBUTE_ALIAS or ORIGIN_ALIAS body: a count, then that many
/// `(alias u32, sized name)` pairs.
pub fn decode_alias_list(body: &[u8]) -> Result<Vec<(u32, String)>> {
    let mut reader = WireReader::new(body);
    let count = reader.u32("alias count")? as usize;
    // Each pair is at least an alias and an empty sized string.
    if count * 8 > reader.remaining() {
        return Err(GrailError::Decode(format!(
            "alias count {count} exceeds body size"
        )));
    }

    let mut pairs = Vec::with_capacity(count);
    for _ in 0..count {
        let alias = reader.u32("alias")?;
        let name = reader.sized_str()?;
        pairs.push((alias, name));
    }
    Ok(pairs)
}

/// Decode a REQUEST_COMPLETE body: the finished ticket.
pub fn decode_ticket(body: &[u8]) -> Result<u32> {
    WireReader::new(body).u32("ticket")
}

/// Decode a URI_RESPONSE body: sized names until the buffer is exhausted.
///
/// A nonzero remainder too short to hold a length prefix is malformed.
pub fn decode_uri_response(body: &[u8]) -> Result<Vec<String>> {
    let mut reader = WireReader::new(body);
    let mut uris = Vec::new();
    while !reader.is_empty() {
        if reader.remaining() < 4 {
            return Err(GrailError::Decode(format!(
                "{} trailing bytes after last name",
                reader.remaining()
            )));
        }
        uris.push(reader.sized_str()?);
    }
    Ok(uris)
}

/// Failure while decoding a DATA_RESPONSE.
///
/// Once the leading URI and ticket have parsed, later failures carry the
/// ticket so the reader can charge the error to that request instead of
/// killing the connection.
#[derive(Debug)]
pub struct DataResponseError {
    pub ticket: Option<u32>,
    pub message: String,
}

/// Decode a DATA_RESPONSE body: sized URI, ticket, attribute count, then
/// the attribute records.
pub fn decode_data_response(
    body: &Bytes,
    attribute_aliases: &AliasTable,
    origin_aliases: &AliasTable,
) -> std::result::Result<DataBundle, DataResponseError> {
    let mut reader = WireReader::new(body);

    // Header part: failures here cannot be tied to a request.
    let uri = reader.sized_str().map_err(|e| DataResponseError {
        ticket: None,
        message: e.to_string(),
    })?;
    let ticket = reader.u32("ticket").map_err(|e| DataResponseError {
        ticket: None,
        message: e.to_string(),
    })?;

    decode_attributes(reader, attribute_aliases, origin_aliases)
        .map(|attributes| DataBundle::new(uri, attributes, ticket))
        .map_err(|e| DataResponseError {
            ticket: Some(ticket),
            message: e.to_string(),
        })
}

fn decode_attributes(
    mut reader: WireReader<'_>,
    attribute_aliases: &AliasTable,
    origin_aliases: &AliasTable,
) -> Result<Vec<Attribute>> {
    let count = reader.u32("attribute count")? as usize;
    // Fixed fields alone are 24 bytes per attribute.
    if count * 24 > reader.remaining() {
        return Err(GrailError::Decode(format!(
            "attribute count {count} exceeds body size"
        )));
    }

    let mut attributes = Vec::with_capacity(count);
    for _ in 0..count {
        let name_alias = reader.u32("name alias")?;
        let creation = reader.u64("creation")?;
        let expiration = reader.u64("expiration")?;
        let origin_alias = reader.u32("origin alias")?;
        let data_len = reader.u32("data length")? as usize;
        let data = reader.take(data_len, "attribute data")?;

        attributes.push(Attribute::new(
            attribute_aliases.resolve(name_alias, "attribute")?,
            Bytes::copy_from_slice(data),
            creation,
            expiration,
            origin_aliases.resolve(origin_alias, "origin")?,
        ));
    }
    Ok(attributes)
}
