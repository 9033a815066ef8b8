#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

pub mod commands;
pub mod data;
mod fanout;
pub mod ledger_entry;
mod paginate;
mod remote;
pub mod streams;

pub use fanout::{LedgerDataStream, PARTITIONS, Partition};
pub use remote::Remote;
pub use ripple_remote_core::{
    MemTransport, RemoteConfig, RemoteError, Transport, TransportError, WebSocketTransport,
};
