//! Mapping identities to the swarm that stores their messages.
//!
//! A public key is folded into a 64-bit digest by XOR-ing its big-endian
//! 8-byte chunks. The swarm whose id is numerically closest to the digest
//! owns the key. Distances are plain absolute differences; the ring does not
//! wrap around.

use crate::network::service_node::ServiceNode;

/// Fold `public_key` into the 64-bit digest compared against swarm ids
///
/// A trailing partial chunk is padded with zeros on the right.
pub fn pubkey_digest(public_key: &[u8]) -> u64 {
    public_key.chunks(8).fold(0u64, |acc, chunk| {
        let mut buf = [0u8; 8];
        buf[..chunk.len()].copy_from_slice(chunk);
        acc ^ u64::from_be_bytes(buf)
    })
}

/// Id of the swarm responsible for `public_key`, if any node has a swarm
///
/// Equal distances resolve to the smaller swarm id.
pub fn closest_swarm_id<'a>(
    nodes: impl IntoIterator<Item = &'a ServiceNode>,
    public_key: &[u8],
) -> Option<u64> {
    let digest = pubkey_digest(public_key);

    nodes
        .into_iter()
        .filter(|node| node.has_swarm())
        .map(|node| node.swarm_id)
        .min_by_key(|&id| (id.abs_diff(digest), id))
}

/// Every node in the swarm responsible for `public_key`
///
/// The result is ordered by node key so equal inputs give equal outputs.
pub fn select_swarm<'a>(
    nodes: impl IntoIterator<Item = &'a ServiceNode> + Clone,
    public_key: &[u8],
) -> Vec<ServiceNode> {
    let Some(swarm_id) = closest_swarm_id(nodes.clone(), public_key) else {
        return Vec::new();
    };

    let mut members: Vec<ServiceNode> = nodes
        .into_iter()
        .filter(|node| node.swarm_id == swarm_id)
        .cloned()
        .collect();
    members.sort_by_key(|node| node.key());
    members
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(key: &str, swarm_id: u64) -> ServiceNode {
        ServiceNode {
            remote_ip: format!("10.0.0.{}", key.len()),
            storage_port: 443,
            identity_key: key.to_string(),
            encryption_key: String::new(),
            swarm_id,
        }
    }

    #[test]
    fn test_digest_folds_chunks() {
        let mut key = [0u8; 32];
        key[7] = 0x01;
        key[15] = 0x02;
        key[31] = 0x04;
        assert_eq!(pubkey_digest(&key), 0x07);

        key[0] = 0x80;
        assert_eq!(pubkey_digest(&key), 0x8000_0000_0000_0007);
    }

    #[test]
    fn test_identical_chunks_cancel() {
        let key = [0x5Au8; 32];
        assert_eq!(pubkey_digest(&key), 0);
    }

    #[test]
    fn test_partial_chunk_padding() {
        assert_eq!(pubkey_digest(&[0x01]), 0x0100_0000_0000_0000);
    }

    #[test]
    fn test_selects_nearest_swarm() {
        let nodes = vec![node("aa", 10), node("bb", 10), node("cc", 900), node("dd", 900)];
        let mut key = [0u8; 32];

        key[7] = 100;
        let swarm = select_swarm(&nodes, &key);
        assert_eq!(swarm.len(), 2);
        assert!(swarm.iter().all(|n| n.swarm_id == 10));

        key[7] = 0;
        key[6] = 0x02; // digest 512
        assert_eq!(closest_swarm_id(&nodes, &key), Some(900));
    }

    #[test]
    fn test_no_wraparound() {
        let nodes = vec![node("aa", 1), node("bb", u64::MAX - 1)];
        // digest u64::MAX - 10 is far from 1 without wrapping
        let key = (u64::MAX - 10).to_be_bytes();
        assert_eq!(closest_swarm_id(&nodes, &key), Some(u64::MAX - 1));
    }

    #[test]
    fn test_tie_breaks_to_smaller_id() {
        let nodes = vec![node("bb", 20), node("aa", 10)];
        let key = 15u64.to_be_bytes();
        assert_eq!(closest_swarm_id(&nodes, &key), Some(10));
    }

    #[test]
    fn test_output_is_deterministic() {
        let forward = vec![node("cc", 10), node("aa", 10), node("bb", 10)];
        let mut reversed = forward.clone();
        reversed.reverse();

        let key = [1u8; 32];
        let a: Vec<String> = select_swarm(&forward, &key).iter().map(|n| n.key()).collect();
        let b: Vec<String> = select_swarm(&reversed, &key).iter().map(|n| n.key()).collect();
        assert_eq!(a, vec!["aa", "bb", "cc"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_nodes_without_swarm_are_ignored() {
        let nodes = vec![ServiceNode::new("seed", 443)];
        assert!(select_swarm(&nodes, &[0u8; 32]).is_empty());
    }
}
