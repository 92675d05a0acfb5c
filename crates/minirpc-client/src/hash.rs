//! Consistent hashing over server addresses.
//!
//! A ring of virtual nodes: every real node is hashed `replicas` times and
//! the sorted hash ring is binary-searched on lookup, wrapping to the front
//! past the last entry. Useful for discovery policies that want sticky
//! key-to-server assignment; not part of the default selection modes.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::Hasher;

/// Hash function over raw key bytes.
pub type HashFn = fn(&[u8]) -> u32;

fn default_hash(data: &[u8]) -> u32 {
    let mut hasher = DefaultHasher::new();
    hasher.write(data);
    hasher.finish() as u32
}

/// A consistent-hash ring with virtual nodes.
pub struct ConsistentHash {
    replicas: usize,
    keys: Vec<u32>,
    nodes: HashMap<u32, String>,
    hash: HashFn,
}

impl ConsistentHash {
    /// Creates a ring with `replicas` virtual nodes per real node.
    pub fn new(replicas: usize) -> Self {
        Self::with_hasher(replicas, default_hash)
    }

    pub fn with_hasher(replicas: usize, hash: HashFn) -> Self {
        ConsistentHash {
            replicas: replicas.max(1),
            keys: Vec::new(),
            nodes: HashMap::new(),
            hash,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Adds real nodes to the ring.
    pub fn add<S: AsRef<str>>(&mut self, nodes: &[S]) {
        for node in nodes {
            let node = node.as_ref();
            for replica in 0..self.replicas {
                let hash = (self.hash)(virtual_key(replica, node).as_bytes());
                self.keys.push(hash);
                self.nodes.insert(hash, node.to_string());
            }
        }
        self.keys.sort_unstable();
    }

    /// Picks the node owning `key`, or `None` on an empty ring.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }
        let hash = (self.hash)(key.as_bytes());
        let mut index = self.keys.partition_point(|&k| k < hash);
        if index == self.keys.len() {
            index = 0;
        }
        self.nodes.get(&self.keys[index]).map(String::as_str)
    }

    /// Removes a real node and all its virtual nodes.
    pub fn remove(&mut self, node: &str) {
        for replica in 0..self.replicas {
            let hash = (self.hash)(virtual_key(replica, node).as_bytes());
            if let Ok(index) = self.keys.binary_search(&hash) {
                self.keys.remove(index);
                self.nodes.remove(&hash);
            }
        }
    }
}

fn virtual_key(replica: usize, node: &str) -> String {
    format!("{replica}{node}")
}
