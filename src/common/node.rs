//! Compact peer and node address encoding.
//!
//! Read [BEP_0005](https://www.bittorrent.org/beps/bep_0005.html) for more information.
use std::convert::TryInto;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::common::{Id, ID_SIZE};
use crate::{Error, Result};

/// Size of a compact IPv4 address (4 bytes ip + 2 bytes port).
pub const COMPACT_ADDRESS_SIZE: usize = 6;
/// Size of a compact IPv6 address (16 bytes ip + 2 bytes port).
pub const COMPACT_ADDRESS_V6_SIZE: usize = 18;
/// Size of a compact node info record in a `nodes` blob.
pub const NODE_RECORD_SIZE: usize = ID_SIZE + COMPACT_ADDRESS_SIZE;

#[derive(Debug, Clone, PartialEq)]
/// A DHT node as found in the `nodes` field of a response.
pub struct Node {
    pub id: Id,
    pub address: SocketAddr,
}

impl Node {
    /// Creates a new Node from an id and socket address.
    pub fn new(id: Id, address: SocketAddr) -> Node {
        Node { id, address }
    }
}

/// Decode a compact address into a [SocketAddr].
pub fn decode_compact_address<T: AsRef<[u8]>>(bytes: T) -> Result<SocketAddr> {
    let bytes = bytes.as_ref();

    match bytes.len() {
        COMPACT_ADDRESS_SIZE => {
            let ip = Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
            let port = u16::from_be_bytes([bytes[4], bytes[5]]);

            Ok(SocketAddr::new(IpAddr::V4(ip), port))
        }
        COMPACT_ADDRESS_V6_SIZE => {
            let octets: [u8; 16] = bytes[..16]
                .try_into()
                .map_err(|_| Error::InvalidCompactAddress(bytes.len()))?;
            let port = u16::from_be_bytes([bytes[16], bytes[17]]);

            Ok(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(octets)), port))
        }
        len => Err(Error::InvalidCompactAddress(len)),
    }
}

/// Encode a [SocketAddr] in its compact form.
pub fn encode_compact_address(address: &SocketAddr) -> Vec<u8> {
    let mut bytes = match address.ip() {
        IpAddr::V4(ip) => ip.octets().to_vec(),
        IpAddr::V6(ip) => ip.octets().to_vec(),
    };

    bytes.extend(address.port().to_be_bytes());

    bytes
}

/// Iterate over the complete 26 bytes records of a compact `nodes` blob.
///
/// A trailing partial record is ignored.
pub fn decode_nodes(blob: &[u8]) -> impl Iterator<Item = Result<Node>> + '_ {
    blob.chunks_exact(NODE_RECORD_SIZE).map(|record| {
        let id = Id::from_bytes(&record[..ID_SIZE])?;
        let address = decode_compact_address(&record[ID_SIZE..])?;

        Ok(Node::new(id, address))
    })
}

/// Inverse of [decode_nodes], IPv4 nodes only.
pub fn encode_nodes(nodes: &[Node]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(NODE_RECORD_SIZE * nodes.len());

    for node in nodes.iter().filter(|node| node.address.is_ipv4()) {
        blob.extend_from_slice(node.id.as_bytes());
        blob.extend(encode_compact_address(&node.address));
    }

    blob
}
