//! BLAKE3 fingerprints for topologies and synthesized stacks.

use super::types::ResourceTopology;
use std::io::Read;
use std::path::Path;

const STREAM_BUF_SIZE: usize = 65536;

/// Hash a string. Returns `"blake3:{hex}"`.
pub fn hash_string(s: &str) -> String {
    format!("blake3:{}", blake3::hash(s.as_bytes()).to_hex())
}

/// Hash a file's contents. Returns `"blake3:{hex}"`.
pub fn hash_file(path: &Path) -> Result<String, String> {
    let mut file =
        std::fs::File::open(path).map_err(|e| format!("cannot open {}: {}", path.display(), e))?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; STREAM_BUF_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| format!("read error {}: {}", path.display(), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("blake3:{}", hasher.finalize().to_hex()))
}

/// Fingerprint of a topology: stack id, provider and the ordered resource list.
pub fn topology_fingerprint(topology: &ResourceTopology) -> Result<String, serde_json::Error> {
    let resources = serde_json::to_string(topology.resources())?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(topology.stack_id().as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(topology.provider().to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update(resources.as_bytes());
    Ok(format!("blake3:{}", hasher.finalize().to_hex()))
}
