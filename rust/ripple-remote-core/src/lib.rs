#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

mod command;
mod config;
mod correlation;
mod dispatch;
mod error;
mod notification;
mod pump;
mod session;
pub mod transport;

pub use command::{Command, CommandId, Pending, Request};
pub use config::*;
pub use error::*;
pub use notification::*;
pub use session::Session;
pub use transport::{MemTransport, Message, Transport, WebSocketTransport};
