//! Routing update payloads carried in the `content` of ROUTING packets.
//!
//! Both variants are JSON text. A distance vector is an object from
//! destination address to cost; a link-state record is the triple
//! `[origin, sequence, {neighbor: cost}]`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::error::{CodecError, Result};
use crate::network::TopologyRecord;
use crate::{Cost, RouterId};

pub type DistanceVector = BTreeMap<RouterId, Cost>;

#[derive(Debug, Serialize, Deserialize)]
struct LinkStateAdvertisement(RouterId, u64, BTreeMap<RouterId, Cost>);

pub fn encode_distance_vector(vector: &DistanceVector) -> Result<String> {
    Ok(serde_json::to_string(vector)?)
}

pub fn decode_distance_vector(content: &str) -> Result<DistanceVector> {
    Ok(serde_json::from_str(content)?)
}

pub fn encode_topology_record(record: &TopologyRecord) -> Result<String> {
    let advertisement = LinkStateAdvertisement(
        record.origin.clone(),
        record.sequence,
        record.neighbors.clone(),
    );
    Ok(serde_json::to_string(&advertisement)?)
}

pub fn decode_topology_record(content: &str) -> Result<TopologyRecord> {
    let LinkStateAdvertisement(origin, sequence, neighbors) = serde_json::from_str(content)?;
    if origin.is_empty() {
        return Err(CodecError::MissingOrigin);
    }

    Ok(TopologyRecord {
        origin,
        sequence,
        neighbors,
    })
}
