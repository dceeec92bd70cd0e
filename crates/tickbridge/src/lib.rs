//! Per-tick simulation state snapshots over shared memory.
//!
//! A simulation process starts a [`Session`], which creates a named shared
//! segment and a game state region inside it. Every tick the host fills a
//! [`TickInput`] from its own object model and calls
//! [`Session::write_tick`]. The session composes a fixed-layout snapshot
//! (clock, map progress, tracked player, roster, labeled objects and the
//! region table) and publishes it under a generation counter. An external
//! process attaches a [`SnapshotReader`] by segment name and copies
//! consistent snapshots out without knowing anything about the simulation.
//!
//! # Architecture
//!
//! - `layout`: snapshot header and binrw body blocks
//! - `writer`: [`Session`] and snapshot composition
//! - `query`: inventory and weapon lookups ([`InventoryQuery`])
//! - `labels`: label list bridge ([`copy_labels`])
//! - `classes`: load-time class registry and weapon to ammo map
//! - `sim`: input types the host fills each tick
//! - `reader`: consistent snapshot reader
//! - `config`: serde configuration
//!
//! # Example
//!
//! ```no_run
//! use tickbridge::{ClassRegistry, Player, Actor, Session, SessionConfig, TickInput};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = SessionConfig::new("doom_0");
//!     let mut session = Session::start(config, ClassRegistry::doom())?;
//!
//!     let players = [Player::new("player1").with_actor(Actor::new(100))];
//!     let input = TickInput {
//!         players: &players,
//!         ..TickInput::default()
//!     };
//!     session.write_tick(&input);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod classes;
pub mod config;
pub mod error;
pub mod labels;
pub mod layout;
pub mod query;
pub mod reader;
pub mod sim;
pub mod writer;

pub use classes::{ClassId, ClassRegistry, ClassTable, WeaponDef};
pub use config::{BufferSettings, SegmentConfig, SessionConfig};
pub use error::{Result, SessionError};
pub use labels::{LabelOrder, copy_labels};
pub use layout::{PROTOCOL_VERSION, SNAPSHOT_SIZE, SnapshotBody, SnapshotHeader};
pub use query::InventoryQuery;
pub use reader::{PublishedSnapshot, SnapshotReader};
pub use sim::{
    Actor, Clock, GamePhase, Inventory, LabeledSprite, Level, Player, PlayerStatus, TickInput,
    WeaponSlots,
};
pub use writer::{ComposeContext, Session, compose_snapshot};

pub use tickbridge_shmem::{RegionDescriptor, RegionKind, SegmentLocation, ShmemError};
