//! Edge accelerator (Varnish-style) purge client.
//!
//! Purges are out-of-band HTTP requests to the accelerator using the `PURGE`
//! and `BAN` verbs. They are fire-and-forget: a failed purge is logged and the
//! edge keeps serving the stale object until its own TTL lapses.

mod acl;
mod purger;
mod transport;

use thiserror::Error;

pub use acl::{parse_acl_entry, render_purge_acl};
pub use purger::{EdgePurger, PurgeSummary};
pub use transport::{EdgeRequest, EdgeTransport, EdgeVerb, HttpEdgeTransport};

pub const PURGE_METHOD_HEADER: &str = "x-purge-method";
pub const BAN_URL_HEADER: &str = "x-ban-url";
pub const CACHE_TAGS_HEADER: &str = "x-cache-tags";

#[derive(Debug, Error)]
pub enum EdgeError {
    #[error("edge request failed: {0}")]
    Transport(String),
    #[error("edge answered {status} to {verb} `{path}`")]
    Status {
        verb: EdgeVerb,
        path: String,
        status: u16,
    },
    #[error("invalid edge target: {0}")]
    InvalidTarget(String),
}
