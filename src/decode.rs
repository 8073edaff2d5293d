//! Decoder for the attribute-map XML carried by statistics replies.
//!
//! ActiveMQ answers a statistics request with messages whose body is a
//! serialized `MapMessage`:
//!
//! ```xml
//! <map>
//!   <entry><string>destinationName</string><string>queue://orders</string></entry>
//!   <entry><string>size</string><long>4</long></entry>
//! </map>
//! ```
//!
//! Each entry is a name/value pair; the value element's tag varies by type
//! and only its text matters here.

use std::fmt;

use crate::DestinationStats;

/// Marker checked before any parse is attempted; bodies without it are not
/// statistics payloads and are ignored entirely.
pub const MAP_MARKER: &str = "<map>";

/// Attribute key carrying the destination identifier used for routing.
pub const DESTINATION_NAME_KEY: &str = "destinationName";

/// Attribute key carrying the broker identity.
pub const BROKER_NAME_KEY: &str = "brokerName";

/// One decoded statistics reply: the flat attribute map plus the two
/// side-channel keys pulled out for routing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatsRecord {
    pub attributes: DestinationStats,
    pub destination_name: Option<String>,
    pub broker_name: Option<String>,
}

/// Failure to parse a reply body. Callers treat this as "no data from this
/// message"; it never aborts the cycle.
#[derive(Debug)]
pub struct DecodeError(String);

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed statistics payload: {}", self.0)
    }
}

impl std::error::Error for DecodeError {}

/// Whether a reply body looks like an attribute map at all.
pub fn has_map_marker(body: &str) -> bool {
    body.contains(MAP_MARKER)
}

/// Parse an attribute-map body into a flat name/value record.
///
/// An entry is accepted when it has at least two element children and its
/// first child is a non-empty `<string>` name; a value element without text
/// decodes to the empty string. The decoder holds no state, so decoding the
/// same payload twice yields identical records.
pub fn decode_map(body: &str) -> Result<StatsRecord, DecodeError> {
    let document = roxmltree::Document::parse(body).map_err(|e| DecodeError(e.to_string()))?;

    let mut record = StatsRecord::default();

    for entry in document
        .descendants()
        .filter(|node| node.has_tag_name("entry"))
    {
        let children: Vec<_> = entry.children().filter(|c| c.is_element()).collect();
        if children.len() < 2 {
            continue;
        }

        let name_elem = children[0];
        let value_elem = children[1];

        if !name_elem.has_tag_name("string") {
            continue;
        }
        let Some(name) = name_elem.text().filter(|t| !t.is_empty()) else {
            continue;
        };

        let value = value_elem.text().unwrap_or("").to_string();

        if name == DESTINATION_NAME_KEY {
            record.destination_name = Some(value.clone());
        } else if name == BROKER_NAME_KEY {
            record.broker_name = Some(value.clone());
        }

        record.attributes.insert(name.to_string(), value);
    }

    Ok(record)
}
