//! # Profile client core
//!
//! Talks to the `tornado-profile` endpoints of a set of servers and turns their answers into tables.
//!
//! - **`resolver`**: turns the configured servers or a DNS name into base URLs
//! - **`remote`**: one request per server, every outcome captured as a [`RemoteResult`]
//! - **`stats`**: flattens, merges and orders per-function statistics across servers
//! - **`render`**: column ordering and table rendering for uniform records

#[macro_use]
extern crate tracing;

pub mod duration;
pub mod remote;
pub mod render;
pub mod resolver;
pub mod stats;

pub use remote::{
    Invoker,
    Outcome,
    Payload,
    RemoteError,
    RemoteResult,
    Request,
};
pub use render::Record;
pub use resolver::resolve_hosts;
pub use stats::{
    aggregate,
    AggregateError,
    AggregateOptions,
    StatsReport,
};
