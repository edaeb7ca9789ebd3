//! # Battery Monitor Bus Node
//!
//! An embedded-style marine battery monitor node: staggered periodic
//! telemetry publication onto a multi-drop control bus, a latest-value
//! sensor snapshot, a dual-threshold push-button latch and a live peer
//! gauge, plus a TCP simulator for driving all of it from a console.
//!
//! ## Features
//!
//! - **Staggered transmit scheduling**: offset-then-period timers, armed
//!   only once the bus reports an operational identity
//! - **Send-time normalization**: shunt current derived fresh per frame,
//!   floor-at-zero for non-negative quantities
//! - **Dual-threshold button latch**: 80 ms / 1000 ms comparators over one
//!   shared last-change clock, sticky until drained
//! - **Peer gauge**: per-tick device count with last-known-good fallback
//! - **Embedded-friendly**: bounded buffers, no heap in the publish path
//!
//! ## Quick Start
//!
//! ```rust
//! use batbus::{BatteryNode, JsonFrameCodec, NodeConfig, SimBus};
//!
//! // Create the node with the in-process bus and reference codec
//! let mut node = BatteryNode::new(NodeConfig::default(), SimBus::new(), JsonFrameCodec::new());
//!
//! // Begin the open sequence; timers arm when the open event lands
//! node.open_bus().unwrap();
//!
//! // Drive the cooperative schedule
//! let mut now = 0;
//! while now <= 3000 {
//!     node.process_tick(now);
//!     node.sample_button(now);
//!     now += 100;
//! }
//!
//! println!("Frames on the wire: {}", node.bus().frames_sent());
//! ```
//!
//! ## Architecture
//!
//! The node is organized into several key modules:
//!
//! - [`node`] - Main orchestrator and public API
//! - [`schedule`] - Offset/period transmit timers
//! - [`emitter`] - Field gathering, normalization and publication
//! - [`readings`] - Latest-value sensor snapshot
//! - [`button`] - Debounce-and-latch press state machine
//! - [`bus`] - Bus transport seat, open gate, peer gauge, simulator bus
//! - [`protocol`] - Wire vocabulary and the reference JSON codec
//! - [`control`] - Operator console types for the simulator

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

extern crate alloc;

pub mod bus;
pub mod button;
pub mod control;
pub mod emitter;
pub mod node;
pub mod protocol;
pub mod readings;
pub mod schedule;

// Re-export main public types for convenience
pub use bus::{BusError, BusEvents, BusTransport, OpenGate, PeerCounter, SimBus};
pub use button::{DebounceLatch, PressEvents};
pub use emitter::{BatteryProfile, MessageEmitter};
pub use node::{BatteryNode, NodeConfig, NodeStats};
pub use protocol::{FrameEncoder, JsonFrameCodec, MessageBody, MessageKind, WireFrame};
pub use readings::SensorReadings;
pub use schedule::{PeriodicTimer, TransmitSchedule};
