//! The reference backend: an in-process, thread-based [`Transport`].
//!
//! Each processor runs as one OS thread sharing a [`LocalHub`] — the process-wide state the
//! design notes call out as a backend concern, not something the hard core can reach. The hub
//! realizes the barrier as a two-phase `std::sync::Barrier` handshake: every processor publishes
//! its [`Outbox`] (puts, gets, sends, and a pre-put snapshot of its own variables) before the
//! first wait, then every processor reads whatever it needs out of the other processors'
//! published outboxes before the second wait releases the slots for the next round.
//!
//! This backend is not a deliverable in its own right; it exists so this crate's own test suite
//! can drive the hard core end to end.

use std::collections::BTreeMap;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use super::{IncomingMessage, IncomingPut, Inbox, Outbox, ResolvedGet, Transport};
use crate::error::{Result, WorldError};

struct LocalHub {
    size: usize,
    barrier_in: Barrier,
    barrier_out: Barrier,
    outboxes: Vec<Mutex<Option<Outbox>>>,
}

impl LocalHub {
    fn new(size: usize) -> Arc<Self> {
        Arc::new(LocalHub {
            size,
            barrier_in: Barrier::new(size),
            barrier_out: Barrier::new(size),
            outboxes: (0..size).map(|_| Mutex::new(None)).collect(),
        })
    }
}

/// A `Transport` where every processor is an OS thread in the same address space.
pub struct LocalTransport {
    hub: Arc<LocalHub>,
    id: usize,
}

impl LocalTransport {
    /// Spawn `count` OS threads, each running `body` against its own `LocalTransport`, and return
    /// their results in processor-id order once all have finished. This is the harness this
    /// crate's own integration tests use to drive a multi-processor scenario from a single test
    /// function.
    pub fn run<F, R>(count: usize, body: F) -> Vec<R>
    where
        F: Fn(usize, LocalTransport) -> R + Send + Sync + 'static,
        R: Send + 'static,
    {
        let hub = LocalHub::new(count);
        let body = Arc::new(body);

        let handles: Vec<_> = (0..count)
            .map(|id| {
                let hub = hub.clone();
                let body = body.clone();
                let transport = LocalTransport {
                    hub: hub.clone(),
                    id,
                };
                thread::Builder::new()
                    .name(format!("bsp-processor-{}", id))
                    .spawn(move || body(id, transport))
                    .expect("failed to spawn processor thread")
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().expect("processor thread panicked"))
            .collect()
    }

    fn read_snapshot_range(
        snapshot: &Outbox,
        var_id: usize,
        offset: usize,
        len: usize,
        whole_value: bool,
    ) -> Vec<u8> {
        snapshot
            .variable_snapshots
            .iter()
            .find(|(id, _)| *id == var_id)
            .map(|(_, bytes)| {
                if whole_value {
                    bytes.clone()
                } else {
                    bytes[offset..offset + len].to_vec()
                }
            })
            .unwrap_or_default()
    }

    fn detect_mismatch(snapshot: &[Outbox]) -> Option<WorldError> {
        Self::detect_mismatch_for("variable", snapshot, |ob| &ob.variable_registrations)
            .or_else(|| Self::detect_mismatch_for("queue", snapshot, |ob| &ob.queue_registrations))
    }

    fn detect_mismatch_for(
        kind: &'static str,
        snapshot: &[Outbox],
        select: impl Fn(&Outbox) -> &Vec<(usize, &'static str)>,
    ) -> Option<WorldError> {
        let longest = snapshot.iter().map(|ob| select(ob).len()).max().unwrap_or(0);

        for ordinal in 0..longest {
            let mut expected: Option<&'static str> = None;
            for ob in snapshot {
                if let Some((_, type_name)) = select(ob).get(ordinal) {
                    match expected {
                        None => expected = Some(type_name),
                        Some(e) if e != *type_name => {
                            return Some(WorldError::CollectiveMismatch {
                                kind,
                                ordinal,
                                expected: e,
                                found: type_name,
                            });
                        }
                        _ => {}
                    }
                }
            }
        }
        None
    }
}

impl Transport for LocalTransport {
    fn active_processors(&self) -> usize {
        self.hub.size
    }

    fn processor_id(&self) -> usize {
        self.id
    }

    fn sync(&mut self, outbox: Outbox) -> Result<Inbox> {
        *self.hub.outboxes[self.id].lock().unwrap() = Some(outbox);
        self.hub.barrier_in.wait();

        // Every processor has published; take an immutable copy of the round's exchange state.
        let snapshot: Vec<Outbox> = self
            .hub
            .outboxes
            .iter()
            .map(|slot| slot.lock().unwrap().clone().expect("outbox published before barrier"))
            .collect();

        let inbox = if let Some(mismatch) = Self::detect_mismatch(&snapshot) {
            Inbox {
                mismatch: Some(mismatch),
                ..Inbox::default()
            }
        } else {
            let mut puts: Vec<IncomingPut> = Vec::new();
            for (src, ob) in snapshot.iter().enumerate() {
                for put in &ob.puts {
                    if put.dst == self.id {
                        puts.push(IncomingPut {
                            src,
                            var_id: put.var_id,
                            element_offset: put.element_offset,
                            element_size: put.element_size,
                            bytes: put.bytes.clone(),
                        });
                    }
                }
            }
            // Cross-source overlap is resolved in increasing source-processor-id order, per the
            // sync protocol's "unspecified but deterministic-per-run" resolution clause.
            puts.sort_by_key(|put| put.src);

            let mut resolved_gets: Vec<ResolvedGet> = Vec::new();
            for get in &snapshot[self.id].gets {
                let owner = &snapshot[get.src];
                let offset = get.element_offset * get.element_size;
                let len = get.element_count * get.element_size;
                resolved_gets.push(ResolvedGet {
                    slot: get.slot,
                    bytes: Self::read_snapshot_range(owner, get.var_id, offset, len, get.whole_value),
                });
            }

            // Messages from different senders interleave in ascending-source-id order; within one
            // sender, send order is preserved because `ob.sends` is visited in push order.
            let mut ordered: BTreeMap<usize, Vec<IncomingMessage>> = BTreeMap::new();
            for (src, ob) in snapshot.iter().enumerate() {
                for send in &ob.sends {
                    if send.dst == self.id {
                        ordered
                            .entry(src)
                            .or_default()
                            .push(IncomingMessage::One {
                                queue_id: send.queue_id,
                                bytes: send.bytes.clone(),
                            });
                    }
                }
                for send_many in &ob.send_manys {
                    if send_many.dst == self.id {
                        ordered
                            .entry(src)
                            .or_default()
                            .push(IncomingMessage::Array {
                                queue_id: send_many.queue_id,
                                elem_bytes: send_many.elem_bytes.clone(),
                                elem_size: send_many.elem_size,
                                count: send_many.count,
                                tail_bytes: send_many.tail_bytes.clone(),
                            });
                    }
                }
            }
            let messages = ordered.into_iter().flat_map(|(_, msgs)| msgs).collect();

            Inbox {
                puts,
                resolved_gets,
                messages,
                mismatch: None,
            }
        };

        self.hub.barrier_out.wait();
        Ok(inbox)
    }

    fn log(&mut self, processor: usize, messages: Vec<String>) {
        for message in messages {
            eprintln!("[processor {}] {}", processor, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{PendingPut, PendingSend};

    #[test]
    fn two_processors_exchange_puts() {
        let results = LocalTransport::run(2, |id, mut transport| {
            let mut outbox = Outbox::default();
            outbox.variable_snapshots.push((0, (id as u32).to_ne_bytes().to_vec()));
            outbox
                .variable_registrations
                .push((0, "u32"));
            outbox.puts.push(PendingPut {
                dst: 1 - id,
                var_id: 0,
                element_offset: 0,
                element_size: 4,
                bytes: (id as u32).to_ne_bytes().to_vec(),
            });

            let inbox = transport.sync(outbox).unwrap();
            inbox.puts.len()
        });

        assert_eq!(results, vec![1, 1]);
    }

    #[test]
    fn fan_in_send_preserves_count() {
        let count = 4;
        let results = LocalTransport::run(count, |id, mut transport| {
            let mut outbox = Outbox::default();
            outbox.sends.push(PendingSend {
                dst: 0,
                queue_id: 0,
                bytes: vec![id as u8],
            });
            let inbox = transport.sync(outbox).unwrap();
            inbox.messages.len()
        });

        assert_eq!(results[0], count);
        for &len in &results[1..] {
            assert_eq!(len, 0);
        }
    }
}
