//! The per-processor superstep engine: the barrier, the registration tables, and the pending
//! communication state a superstep accumulates before it is exchanged.

use std::cell::RefCell;
use std::rc::Rc;

use crate::alloc::SlotPool;
use crate::backend::{
    IncomingMessage, Outbox, PendingGet, PendingPut, PendingSend, PendingSendMany, Transport,
};
use crate::error::{Result, WorldError};
use crate::logging::{discard_logger, LogBuffer};
use crate::queue::QueueSlot;
use crate::serialize::Message;
use crate::variable::VariableSlot;

/// A decoded get result is handed to whichever `Future` is waiting for it through this type-erased
/// callback, stashed in [`Inner::pending_gets`] under the id recorded in the outbox's
/// [`PendingGet::slot`].
pub(crate) type GetResolver = Box<dyn FnOnce(Vec<u8>)>;

pub(crate) struct Inner<B: Transport> {
    pub(crate) transport: B,
    pub(crate) variables: SlotPool<Box<dyn VariableSlot>>,
    pub(crate) queues: SlotPool<Box<dyn QueueSlot>>,
    pub(crate) outbox: Outbox,
    pending_gets: SlotPool<GetResolver>,
    variable_type_history: Vec<&'static str>,
    queue_type_history: Vec<&'static str>,
    log_buffer: LogBuffer,
    logger: slog::Logger,
}

/// The per-processor runtime object. Every `Variable`, `Coarray`, `Queue`, and `Future` created
/// against a `World` shares this same handle (via `Rc`, not `Arc`: a `World` and everything it
/// creates is owned by exactly one thread between barriers, so atomic refcounting buys nothing —
/// see the concurrency model). The registration tables inside it store only the narrow capability
/// each object exposes to the barrier (`VariableSlot`/`QueueSlot`), never the typed front-end
/// object itself, so there is no ownership cycle between `World` and its objects.
pub struct World<B: Transport> {
    pub(crate) inner: Rc<RefCell<Inner<B>>>,
}

impl<B: Transport> Clone for World<B> {
    fn clone(&self) -> Self {
        World {
            inner: self.inner.clone(),
        }
    }
}

impl<B: Transport> World<B> {
    /// Joins this processor into a world over `transport`. `log` is the structured-tracing parent
    /// logger (falling back to a discarding logger, mirroring this workspace's `World::new(fps,
    /// log)` constructor shape); it is distinct from the deferred, user-facing `log()` channel.
    pub fn new(transport: B, log: impl Into<Option<slog::Logger>>) -> Self {
        let logger = log.into().unwrap_or_else(discard_logger);
        let processor_id = transport.processor_id();

        World {
            inner: Rc::new(RefCell::new(Inner {
                transport,
                variables: SlotPool::new(),
                queues: SlotPool::new(),
                outbox: Outbox::default(),
                pending_gets: SlotPool::new(),
                variable_type_history: Vec::new(),
                queue_type_history: Vec::new(),
                log_buffer: LogBuffer::new(processor_id),
                logger,
            })),
        }
    }

    pub fn active_processors(&self) -> usize {
        self.inner.borrow().transport.active_processors()
    }

    pub fn processor_id(&self) -> usize {
        self.inner.borrow().transport.processor_id()
    }

    /// Defers `msg` until the next barrier completes, then flushes it with this processor's id
    /// attached, preserving interleaving order with this processor's other deferred messages.
    pub fn log(&self, msg: impl Into<String>) {
        self.inner.borrow_mut().log_buffer.push(msg.into());
    }

    fn check_processor(&self, processor: usize) -> Result<()> {
        let active = self.active_processors();
        if processor >= active {
            Err(WorldError::NoSuchProcessor {
                processor,
                active,
            })
        } else {
            Ok(())
        }
    }

    pub(crate) fn register_variable<T: Message>(
        &self,
        slot: Box<dyn VariableSlot>,
    ) -> usize {
        let mut inner = self.inner.borrow_mut();
        let id = inner.variables.insert(slot);
        inner.variable_type_history.push(T::type_name());
        slog::trace!(inner.logger, "register_variable"; "id" => id, "type" => T::type_name());
        id
    }

    pub(crate) fn unregister_variable(&self, id: usize) {
        let mut inner = self.inner.borrow_mut();
        inner.variables.remove(id);
        slog::trace!(inner.logger, "unregister_variable"; "id" => id);
    }

    pub(crate) fn register_queue<T: Message>(&self, slot: Box<dyn QueueSlot>) -> usize {
        let mut inner = self.inner.borrow_mut();
        let id = inner.queues.insert(slot);
        inner.queue_type_history.push(T::type_name());
        slog::trace!(inner.logger, "register_queue"; "id" => id, "type" => T::type_name());
        id
    }

    pub(crate) fn unregister_queue(&self, id: usize) {
        let mut inner = self.inner.borrow_mut();
        inner.queues.remove(id);
        slog::trace!(inner.logger, "unregister_queue"; "id" => id);
    }

    /// Schedules a one-sided write of `bytes` (already serialized at the call site) into
    /// `var_id` on `dst`, starting at `element_offset` elements of `element_size` bytes each.
    pub(crate) fn try_put(
        &self,
        dst: usize,
        var_id: usize,
        element_offset: usize,
        element_size: usize,
        bytes: Vec<u8>,
    ) -> Result<()> {
        self.check_processor(dst)?;
        let mut inner = self.inner.borrow_mut();
        if inner.variables.get(var_id).is_none() {
            return Err(WorldError::UnknownRegistration {
                kind: "variable",
                id: var_id,
            });
        }
        slog::trace!(inner.logger, "put"; "dst" => dst, "var_id" => var_id, "offset" => element_offset);
        inner.outbox.puts.push(PendingPut {
            dst,
            var_id,
            element_offset,
            element_size,
            bytes,
        });
        Ok(())
    }

    /// Schedules a one-sided read of `element_count` elements of `element_size` bytes each,
    /// starting at `element_offset`, from `var_id` on `src`. `resolve` decodes the bytes the next
    /// barrier resolves this get to and writes them into the waiting future's slot.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn try_get(
        &self,
        src: usize,
        var_id: usize,
        element_offset: usize,
        element_count: usize,
        element_size: usize,
        whole_value: bool,
        resolve: GetResolver,
    ) -> Result<()> {
        self.check_processor(src)?;
        let mut inner = self.inner.borrow_mut();
        let slot = inner.pending_gets.insert(resolve);
        slog::trace!(inner.logger, "get"; "src" => src, "var_id" => var_id, "slot" => slot);
        inner.outbox.gets.push(PendingGet {
            src,
            var_id,
            element_offset,
            element_count,
            element_size,
            whole_value,
            slot,
        });
        Ok(())
    }

    pub(crate) fn try_send(&self, dst: usize, queue_id: usize, bytes: Vec<u8>) -> Result<()> {
        self.check_processor(dst)?;
        let mut inner = self.inner.borrow_mut();
        if inner.queues.get(queue_id).is_none() {
            return Err(WorldError::UnknownRegistration {
                kind: "queue",
                id: queue_id,
            });
        }
        slog::trace!(inner.logger, "send"; "dst" => dst, "queue_id" => queue_id);
        inner.outbox.sends.push(PendingSend {
            dst,
            queue_id,
            bytes,
        });
        Ok(())
    }

    pub(crate) fn try_send_many(
        &self,
        dst: usize,
        queue_id: usize,
        elem_bytes: Vec<u8>,
        elem_size: usize,
        count: usize,
        tail_bytes: Vec<u8>,
    ) -> Result<()> {
        self.check_processor(dst)?;
        let mut inner = self.inner.borrow_mut();
        if inner.queues.get(queue_id).is_none() {
            return Err(WorldError::UnknownRegistration {
                kind: "queue",
                id: queue_id,
            });
        }
        slog::trace!(inner.logger, "send_many"; "dst" => dst, "queue_id" => queue_id, "count" => count);
        inner.outbox.send_manys.push(PendingSendMany {
            dst,
            queue_id,
            elem_bytes,
            elem_size,
            count,
            tail_bytes,
        });
        Ok(())
    }

    /// The barrier. Quiesces this superstep's outbox, exchanges it with every other processor via
    /// the transport, applies incoming puts, resolves this processor's outstanding gets, and
    /// delivers incoming queue messages — in that fixed order, because later phases depend on
    /// earlier invariants holding.
    pub fn sync(&self) -> Result<()> {
        let outbox = {
            let mut inner = self.inner.borrow_mut();
            slog::trace!(inner.logger, "sync: entering barrier";
                "puts" => inner.outbox.puts.len(),
                "gets" => inner.outbox.gets.len(),
                "sends" => inner.outbox.sends.len() + inner.outbox.send_manys.len());

            inner.outbox.variable_snapshots = inner
                .variables
                .iter()
                .map(|(id, slot)| (id, slot.read_range(0, slot.len_bytes())))
                .collect();
            inner.outbox.variable_registrations = inner
                .variable_type_history
                .iter()
                .enumerate()
                .map(|(ordinal, name)| (ordinal, *name))
                .collect();
            inner.outbox.queue_registrations = inner
                .queue_type_history
                .iter()
                .enumerate()
                .map(|(ordinal, name)| (ordinal, *name))
                .collect();

            std::mem::take(&mut inner.outbox)
        };

        let inbox = self.inner.borrow_mut().transport.sync(outbox)?;

        if let Some(mismatch) = inbox.mismatch {
            return Err(mismatch);
        }

        let mut inner = self.inner.borrow_mut();

        let puts_applied = inbox.puts.len();
        for put in inbox.puts {
            if let Some(slot) = inner.variables.get_mut(put.var_id) {
                slot.write_range(put.element_offset * put.element_size, &put.bytes);
            }
        }

        for resolved in inbox.resolved_gets {
            if let Some(resolver) = inner.pending_gets.remove(resolved.slot) {
                resolver(resolved.bytes);
            }
        }

        for (_, queue) in inner.queues.iter_mut() {
            queue.clear();
        }

        let mut incoming_counts: std::collections::HashMap<usize, usize> = std::collections::HashMap::new();
        for message in &inbox.messages {
            *incoming_counts.entry(message.queue_id()).or_insert(0) += 1;
        }
        for (queue_id, count) in incoming_counts {
            if let Some(queue) = inner.queues.get_mut(queue_id) {
                queue.reserve(count);
            }
        }

        for message in &inbox.messages {
            if let Some(queue) = inner.queues.get_mut(message.queue_id()) {
                match message {
                    IncomingMessage::One { bytes, .. } => queue.push_one(bytes),
                    IncomingMessage::Array {
                        elem_bytes,
                        elem_size,
                        count,
                        tail_bytes,
                        ..
                    } => queue.push_array(elem_bytes, *elem_size, *count, tail_bytes),
                }
            }
        }

        let logger = inner.logger.clone();
        let processor_id = inner.transport.processor_id();
        let flushed = inner.log_buffer.flush(&logger);
        if !flushed.is_empty() {
            inner.transport.log(processor_id, flushed);
        }

        slog::trace!(inner.logger, "sync: barrier complete"; "puts_applied" => puts_applied);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::local::LocalTransport;

    #[test]
    fn send_to_out_of_range_processor_is_rejected_at_the_call_site() {
        LocalTransport::run(2, |_id, transport| {
            let world = World::new(transport, None::<slog::Logger>);
            let err = world.try_send(5, 0, Vec::new()).unwrap_err();
            assert_eq!(
                err,
                WorldError::NoSuchProcessor {
                    processor: 5,
                    active: 2,
                }
            );
        });
    }

    #[test]
    fn put_against_an_unregistered_variable_id_is_rejected() {
        LocalTransport::run(1, |id, transport| {
            let world = World::new(transport, None::<slog::Logger>);
            let err = world.try_put(id, 0, 0, 4, vec![0; 4]).unwrap_err();
            assert_eq!(
                err,
                WorldError::UnknownRegistration {
                    kind: "variable",
                    id: 0,
                }
            );
        });
    }
}
