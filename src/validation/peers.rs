//! Tunnel-peer shape and address-range checks.

use rusqlite::Connection;
use serde_json::Value;

use crate::model::endpoint::{WARP, WIREGUARD};
use crate::model::Endpoint;
use crate::store::endpoints;
use crate::validation::{CheckError, IpRange, ValidationError};

fn peers(endpoint: &Endpoint) -> &[Value] {
    endpoint
        .options
        .get("peers")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn allowed_ips(peer: &Value) -> impl Iterator<Item = &str> {
    peer.get("allowed_ips")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

fn non_empty_str<'a>(peer: &'a Value, field: &str) -> Option<&'a str> {
    peer.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Peer endpoints must declare at least one complete peer.
///
/// Non-peer endpoint types pass unchecked.
pub fn check_peer_shape(endpoint: &Endpoint) -> Result<(), ValidationError> {
    if !endpoint.is_peer_type() {
        return Ok(());
    }
    let peers = peers(endpoint);
    if peers.is_empty() {
        return Err(ValidationError::InvalidPeer {
            index: 0,
            reason: format!("endpoint '{}' declares no peers", endpoint.tag),
        });
    }

    for (index, peer) in peers.iter().enumerate() {
        let invalid = |reason: &str| ValidationError::InvalidPeer {
            index,
            reason: reason.to_string(),
        };
        if !peer.is_object() {
            return Err(invalid("not an object"));
        }
        if non_empty_str(peer, "public_key").is_none() {
            return Err(invalid("missing public_key"));
        }
        if non_empty_str(peer, "address").is_none() {
            return Err(invalid("missing address"));
        }
        match peer.get("port").and_then(Value::as_u64) {
            Some(port) if port > 0 && port <= u64::from(u16::MAX) => {}
            _ => return Err(invalid("port must be between 1 and 65535")),
        }
        if allowed_ips(peer).next().is_none() {
            return Err(invalid("allowed_ips is empty"));
        }
        if peer.get("persistent_keepalive").is_none() {
            tracing::warn!(
                tag = %endpoint.tag,
                peer = index,
                "Peer has no persistent_keepalive"
            );
        }
    }
    Ok(())
}

/// Every allowed range of a peer endpoint must be disjoint from the ranges
/// of all other stored peer endpoints (`wireguard` and `warp`).
///
/// Candidate ranges that fail to parse are rejected; stored ones are skipped.
pub fn check_disjoint_ranges(conn: &Connection, candidate: &Endpoint) -> Result<(), CheckError> {
    if !candidate.is_peer_type() {
        return Ok(());
    }

    let mut wanted = Vec::new();
    for peer in peers(candidate) {
        for text in allowed_ips(peer) {
            wanted.push((text, text.parse::<IpRange>()?));
        }
    }
    if wanted.is_empty() {
        return Ok(());
    }

    let mut stored = endpoints::list_by_type(conn, WIREGUARD)?;
    stored.extend(endpoints::list_by_type(conn, WARP)?);
    for other in stored {
        if other.id == candidate.id {
            continue;
        }
        for peer in peers(&other) {
            for text in allowed_ips(peer) {
                let existing = match text.parse::<IpRange>() {
                    Ok(range) => range,
                    Err(e) => {
                        tracing::warn!(tag = %other.tag, error = %e, "Skipping stored range");
                        continue;
                    }
                };
                if let Some((range, _)) = wanted.iter().find(|(_, r)| r.overlaps(&existing)) {
                    return Err(ValidationError::RangeConflict {
                        range: range.to_string(),
                        existing: text.to_string(),
                        tag: other.tag.clone(),
                    }
                    .into());
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn endpoint(peers: Value) -> Endpoint {
        Endpoint::from_payload(json!({"type": "wireguard", "tag": "ep", "peers": peers})).unwrap()
    }

    #[test]
    fn test_complete_peer_passes() {
        let ep = endpoint(json!([{
            "public_key": "PK1", "address": "1.2.3.4", "port": 51820,
            "allowed_ips": ["10.0.0.0/24"],
        }]));
        assert!(check_peer_shape(&ep).is_ok());
    }

    #[test]
    fn test_shape_failures_name_the_peer() {
        assert!(matches!(
            check_peer_shape(&endpoint(json!([]))),
            Err(ValidationError::InvalidPeer { index: 0, .. })
        ));

        let err = check_peer_shape(&endpoint(json!([
            {"public_key": "PK1", "address": "1.2.3.4", "port": 1, "allowed_ips": ["10.0.0.1"]},
            {"public_key": "PK2", "address": "1.2.3.5", "port": 0, "allowed_ips": ["10.0.0.2"]},
        ])))
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPeer { index: 1, .. }));

        let err = check_peer_shape(&endpoint(json!([
            {"public_key": "", "address": "1.2.3.4", "port": 1, "allowed_ips": ["10.0.0.1"]},
        ])))
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidPeer {
                index: 0,
                reason: "missing public_key".into()
            }
        );

        let err = check_peer_shape(&endpoint(json!([
            {"public_key": "PK", "address": "1.2.3.4", "port": 1, "allowed_ips": []},
        ])))
        .unwrap_err();
        assert!(err.to_string().contains("allowed_ips"));
    }

    fn stored(conn: &Connection, kind: &str, tag: &str, allowed: &[&str]) -> i64 {
        let ep = Endpoint::from_payload(json!({
            "type": kind, "tag": tag,
            "peers": [{"public_key": "PK", "address": "1.2.3.4", "port": 1, "allowed_ips": allowed}],
        }))
        .unwrap();
        endpoints::insert(conn, &ep).unwrap()
    }

    fn conflict_tag(result: Result<(), CheckError>) -> String {
        match result {
            Err(CheckError::Invalid(ValidationError::RangeConflict { tag, .. })) => tag,
            other => panic!("expected a range conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_ranges_are_checked_across_the_peer_family() {
        let store = crate::store::Store::open_in_memory().unwrap();
        store
            .read(|conn| {
                stored(conn, WARP, "w1", &["0.0.0.0/0", "::/0"]);
                let wg = endpoint(json!([{
                    "public_key": "PK1", "address": "1.2.3.4", "port": 51820,
                    "allowed_ips": ["10.0.0.0/24"],
                }]));
                assert_eq!(conflict_tag(check_disjoint_ranges(conn, &wg)), "w1");

                let ts = Endpoint::from_payload(json!({"type": "tailscale", "tag": "ts"})).unwrap();
                assert!(check_disjoint_ranges(conn, &ts).is_ok());
                Ok::<_, crate::store::StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn test_warp_candidate_is_checked_against_wireguard() {
        let store = crate::store::Store::open_in_memory().unwrap();
        store
            .read(|conn| {
                stored(conn, WIREGUARD, "wg1", &["10.0.0.0/24"]);
                let mut warp = endpoint(json!([{
                    "public_key": "PK1", "address": "1.2.3.4", "port": 2408,
                    "allowed_ips": ["10.0.0.5"],
                }]));
                warp.kind = WARP.to_string();
                assert_eq!(conflict_tag(check_disjoint_ranges(conn, &warp)), "wg1");
                Ok::<_, crate::store::StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn test_non_peer_types_are_not_checked() {
        let ep = Endpoint::from_payload(json!({"type": "tailscale", "tag": "ts"})).unwrap();
        assert!(check_peer_shape(&ep).is_ok());
    }
}
