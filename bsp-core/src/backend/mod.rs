//! The abstract backend contract any concrete runner (threads, a many-core accelerator, a cluster
//! transport) must fulfil.
//!
//! `World<B>` is generic over its [`Transport`]; the hard core never assumes a specific backend
//! beyond this trait. Only one concrete implementation ships with this crate:
//! [`local::LocalTransport`], an in-process, thread-based backend that exists purely so this
//! crate's own test suite can exercise the contract end to end.

pub mod local;

use crate::error::Result;

/// One pending one-sided write, captured (serialized) at the moment `put` was called.
#[derive(Debug, Clone)]
pub struct PendingPut {
    pub dst: usize,
    pub var_id: usize,
    pub element_offset: usize,
    pub element_size: usize,
    pub bytes: Vec<u8>,
}

/// One pending one-sided read. `slot` identifies the future on the issuing processor that the
/// resolved value must be written back into.
#[derive(Debug, Clone)]
pub struct PendingGet {
    pub src: usize,
    pub var_id: usize,
    pub element_offset: usize,
    pub element_count: usize,
    pub element_size: usize,
    /// `true` for a whole-value `Variable` get, whose encoded length the requester cannot predict
    /// (the owner's `T` need not be fixed-width); `false` for an element-ranged `Coarray` get,
    /// where `element_offset * element_size .. +element_count * element_size` is exact.
    pub whole_value: bool,
    pub slot: usize,
}

/// One pending single-message send.
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub dst: usize,
    pub queue_id: usize,
    pub bytes: Vec<u8>,
}

/// One pending array-valued send: `elem_bytes` holds `count` back-to-back fixed-width elements,
/// `tail_bytes` the encoded remaining tuple fields (empty when the message has none).
#[derive(Debug, Clone)]
pub struct PendingSendMany {
    pub dst: usize,
    pub queue_id: usize,
    pub elem_bytes: Vec<u8>,
    pub elem_size: usize,
    pub count: usize,
    pub tail_bytes: Vec<u8>,
}

/// Every `World`'s communication scheduled since the previous barrier, handed to the transport
/// wholesale when `sync()` is called.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    pub puts: Vec<PendingPut>,
    pub gets: Vec<PendingGet>,
    pub sends: Vec<PendingSend>,
    pub send_manys: Vec<PendingSendMany>,
    /// A full byte snapshot of every locally registered variable and coarray, taken before any
    /// incoming puts are applied. Other processors' gets against this processor's variables are
    /// resolved from this snapshot, which is exactly the pre-put state the spec requires.
    pub variable_snapshots: Vec<(usize, Vec<u8>)>,
    /// `(ordinal, type name)` for every variable registered so far, in creation order, used by the
    /// transport to detect collective mismatches.
    pub variable_registrations: Vec<(usize, &'static str)>,
    /// Same as `variable_registrations`, for queues.
    pub queue_registrations: Vec<(usize, &'static str)>,
}

/// One put delivered to this processor, ready to be applied to a local variable.
#[derive(Debug, Clone)]
pub struct IncomingPut {
    pub src: usize,
    pub var_id: usize,
    pub element_offset: usize,
    pub element_size: usize,
    pub bytes: Vec<u8>,
}

/// The resolved value for one of this processor's own outstanding gets.
#[derive(Debug, Clone)]
pub struct ResolvedGet {
    pub slot: usize,
    pub bytes: Vec<u8>,
}

/// One message delivered to one of this processor's queues: either a single encoded message, or
/// an array-shaped one sent via `send_many`.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    One {
        queue_id: usize,
        bytes: Vec<u8>,
    },
    Array {
        queue_id: usize,
        elem_bytes: Vec<u8>,
        elem_size: usize,
        count: usize,
        tail_bytes: Vec<u8>,
    },
}

impl IncomingMessage {
    pub fn queue_id(&self) -> usize {
        match self {
            IncomingMessage::One { queue_id, .. } => *queue_id,
            IncomingMessage::Array { queue_id, .. } => *queue_id,
        }
    }
}

/// What `sync()` hands back to a processor after the barrier: everything addressed to it.
#[derive(Debug, Clone, Default)]
pub struct Inbox {
    pub puts: Vec<IncomingPut>,
    pub resolved_gets: Vec<ResolvedGet>,
    pub messages: Vec<IncomingMessage>,
    pub mismatch: Option<crate::error::WorldError>,
}

/// The trait every backend implements. A `World<B>` holds exactly one `B` and drives every
/// superstep through it.
pub trait Transport {
    fn active_processors(&self) -> usize;
    fn processor_id(&self) -> usize;

    /// The barrier: exchange `outbox` with every other processor's outbox and return the subset of
    /// the combined communication addressed to this processor. Blocks until every processor has
    /// called `sync`.
    fn sync(&mut self, outbox: Outbox) -> Result<Inbox>;

    /// Flush this processor's deferred log messages, in order, with its id attached.
    fn log(&mut self, processor: usize, messages: Vec<String>);
}
