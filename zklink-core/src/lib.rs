//! # zklink-core
//!
//! Wire-level building blocks for ZKTeco biometric terminals.
//!
//! This crate provides the low-level protocol primitives:
//! - Packet structure, checksum and the TCP top frame
//! - Command codes and protocol constants
//! - Session bookkeeping (session id, reply id)
//! - CommKey authentication
//! - Fixed-width record codecs (users, templates, attendance, live events)
//!
//! Nothing here performs I/O.

pub mod auth;
pub mod checksum;
pub mod command;
pub mod constants;
pub mod error;
pub mod frame;
pub mod options;
pub mod packet;
pub mod record;
pub mod session;

pub use command::Command;
pub use constants::EventFlags;
pub use error::{Error, Result};
pub use packet::Packet;
pub use session::{Session, TransportKind};

/// Default device port
pub const DEFAULT_PORT: u16 = 4370;

/// Packet header size
pub const HEADER_SIZE: usize = Packet::HEADER_SIZE;
