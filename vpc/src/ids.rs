//! Composite Terraform IDs: parent and child API IDs joined with `/`

use crate::error::{Result, VpcError};

const SEPARATOR: char = '/';

pub fn make_id(parts: &[&str]) -> String {
    parts.join("/")
}

/// Split `id` into exactly `count` non-empty segments
pub fn parse_id(id: &str, count: usize) -> Result<Vec<String>> {
    let parts: Vec<String> = id.split(SEPARATOR).map(str::to_string).collect();

    if parts.len() != count {
        return Err(VpcError::precondition(format!(
            "invalid terraform Id {} (incorrect number of segments, expected {})",
            id, count
        )));
    }
    if parts.iter().any(String::is_empty) {
        return Err(VpcError::precondition(format!(
            "invalid terraform Id {} (one or more empty segments)",
            id
        )));
    }

    Ok(parts)
}

pub fn parse_pair(id: &str) -> Result<(String, String)> {
    let mut parts = parse_id(id, 2)?.into_iter();
    match (parts.next(), parts.next()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(VpcError::precondition(format!("invalid terraform Id {}", id))),
    }
}

pub fn parse_triple(id: &str) -> Result<(String, String, String)> {
    let mut parts = parse_id(id, 3)?.into_iter();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), Some(c)) => Ok((a, b, c)),
        _ => Err(VpcError::precondition(format!("invalid terraform Id {}", id))),
    }
}

pub fn make_nic_id(server_id: &str, nic_id: &str) -> String {
    make_id(&[server_id, nic_id])
}

/// `server/nic`
pub fn parse_nic_id(id: &str) -> Result<(String, String)> {
    parse_pair(id)
}

/// `server/nic/floating_ip`
pub fn parse_nic_fip_id(id: &str) -> Result<(String, String, String)> {
    parse_triple(id)
}

/// A reference that may be a bare child ID or a `parent/child` Terraform ID.
/// Returns the last segment.
pub fn child_id(value: &str) -> Result<String> {
    if !value.contains(SEPARATOR) {
        return if value.is_empty() {
            Err(VpcError::precondition("empty identifier"))
        } else {
            Ok(value.to_string())
        };
    }
    let (_, child) = parse_pair(value)?;
    Ok(child)
}

/// Listener policy targets accept a pool ID or the pool resource's `lb/pool` ID
pub fn pool_id_from_target(value: &str) -> Result<String> {
    child_id(value)
}
