//! Client connection descriptors.
//!
//! # Data Flow
//! ```text
//! inbound save → build_out_json (inbound + TLS client block + hostname)
//!     → inbound.out_json
//! client save / inbound change → regenerate(client, linked inbounds)
//!     → uri::link(inbound, client credential) per inbound
//!     → [new local descriptors..., previous non-local descriptors...]
//! ```
//!
//! # Design Decisions
//! - Everything here is pure; callers load the inputs and persist the output
//! - Output order is new local descriptors first, then the preserved
//!   external ones, not an in-place merge
//! - Descriptors that do not have the `local` origin are never created,
//!   edited or dropped

mod outjson;
pub mod uri;

pub use outjson::build_out_json;

use crate::model::{Client, Descriptor, Inbound};

/// Rebuilds a client's descriptor list against its linked inbounds.
///
/// `linked` must be in the client's declared order. Inbounds for which no
/// link can be built (no credential, no link form) contribute nothing.
pub fn regenerate(client: &Client, linked: &[Inbound]) -> Vec<Descriptor> {
    let generated = linked.iter().filter_map(|inbound| {
        let credential = client.credential(inbound.credential_key())?;
        let uri = uri::link(inbound, credential)?;
        Some(Descriptor::local(inbound.tag.clone(), uri))
    });
    let preserved = client.links.iter().filter(|d| !d.is_local()).cloned();
    generated.chain(preserved).collect()
}

/// Drops the local descriptors remarked with `tag`.
pub fn strip_inbound(descriptors: &[Descriptor], tag: &str) -> Vec<Descriptor> {
    descriptors
        .iter()
        .filter(|d| !(d.is_local() && d.remark == tag))
        .cloned()
        .collect()
}
