//! Core runtime of a Bulk-Synchronous Parallel (BSP) programming library.
//!
//! A program built on this crate spawns a fixed number of processors, each running the same
//! code against its own [`World`]. Processors alternate between local computation and
//! collective barriers (`World::sync`); all cross-processor communication scheduled between two
//! barriers — one-sided variable puts/gets, coarray element/slice access, and queued messages —
//! is delivered atomically at the barrier.
//!
//! The hard core is generic over the [`Transport`](backend::Transport) that actually moves bytes
//! between processors. This crate ships exactly one concrete transport,
//! [`LocalTransport`](backend::local::LocalTransport), an in-process thread-based backend used by
//! this crate's own test suite.

mod alloc;
mod sentinel;

pub mod backend;
pub mod coarray;
pub mod error;
pub mod future;
pub mod logging;
pub mod queue;
pub mod serialize;
pub mod variable;
pub mod world;

// `Payload` names both the derive macro and the trait it fills in. That's not a collision: derive
// macros and traits live in different namespaces, the same way `serde::Serialize` is both.
pub use bsp_core_macros::Payload;
pub use serialize::Payload;

pub use coarray::{Coarray, CoarrayImage, ElemImage, SliceImage};
pub use error::{Result, WorldError};
pub use future::Future;
pub use queue::{Queue, Sender};
pub use serialize::{ArrayMessage, Decoder, Encoder, FixedWidth, Message, SizeHint, WireCodec};
pub use variable::{Variable, VariableImage};
pub use world::World;

pub use backend::local::LocalTransport;
pub use backend::Transport;
