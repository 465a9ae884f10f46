//! The concrete two-processor scenarios from the testable-properties section, run against the
//! reference backend. Each spawns P OS threads via `LocalTransport::run`, builds a `World` per
//! thread, drives it through exactly the sequence the scenario describes, and collects
//! thread-local results to assert on back on the joining thread.

use bsp_core::{Coarray, Decoder, Encoder, LocalTransport, Message, Payload, Queue, Variable, World};

/// A message type outside the blanket `Message` impls (those cover only fixed-width scalars,
/// `String`, and `Vec<E>`), pairing `#[derive(Payload)]` with a hand-written `Message` impl —
/// the shape any application message with more than one field actually takes.
#[derive(Debug, Clone, PartialEq, Payload)]
struct Ping {
    tick: u32,
    label: String,
}

impl Message for Ping {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_fixed(&self.tick);
        enc.write_str(&self.label);
    }

    fn decode(dec: &mut Decoder) -> Self {
        Ping {
            tick: dec.read_fixed(),
            label: dec.read_str(),
        }
    }

    fn size_hint(&self) -> usize {
        4 + 4 + self.label.len()
    }
}

#[test]
fn derived_payload_travels_through_a_queue() {
    assert_eq!(Ping::type_name(), "Ping");

    let results = LocalTransport::run(2, |id, transport| {
        let world = World::new(transport, None::<slog::Logger>);
        let queue: Queue<Ping, _> = Queue::new(&world);

        queue.at(0).send(Ping {
            tick: id as u32,
            label: format!("from-{}", id),
        });

        world.sync().unwrap();

        let mut delivered = queue.iter();
        delivered.sort_by_key(|p| p.tick);
        delivered
    });

    assert_eq!(
        results[0],
        vec![
            Ping { tick: 0, label: "from-0".to_string() },
            Ping { tick: 1, label: "from-1".to_string() },
        ]
    );
    assert!(results[1].is_empty());
}

#[test]
fn hello_processor() {
    let results = LocalTransport::run(2, |id, transport| {
        let world = World::new(transport, None::<slog::Logger>);
        let queue: Queue<i32, _> = Queue::new(&world);

        queue.at(0).send(id as i32);

        world.sync().unwrap();

        let mut delivered = queue.iter();
        delivered.sort();
        delivered
    });

    assert_eq!(results[0], vec![0, 1]);
    assert_eq!(results[1], Vec::<i32>::new());
}

#[test]
fn swap_via_variables() {
    let results = LocalTransport::run(2, |id, transport| {
        let world = World::new(transport, None::<slog::Logger>);
        let x: Variable<i32, _> = Variable::new(&world, id as i32);

        x.at(1 - id).put(&(id as i32));
        world.sync().unwrap();

        x.value()
    });

    assert_eq!(results, vec![1, 0]);
}

#[test]
fn get_reads_pre_put_state() {
    let results = LocalTransport::run(2, |id, transport| {
        let world = World::new(transport, None::<slog::Logger>);
        let x: Variable<i32, _> = Variable::new(&world, id as i32);

        let other = 1 - id;
        x.at(other).put(&((id as i32) * 10));
        let future = x.at(other).get();

        world.sync().unwrap();

        (x.value(), future.value())
    });

    // Puts have landed: x on p=0 is 10 (from p=1's id*10), x on p=1 is 0.
    assert_eq!(results[0].0, 10);
    assert_eq!(results[1].0, 0);

    // Futures hold the pre-barrier value: future on p=0 is p=1's original value (1), and
    // vice versa.
    assert_eq!(results[0].1, 1);
    assert_eq!(results[1].1, 0);
}

#[test]
fn vector_message_delivers_as_one_array_payload() {
    let results = LocalTransport::run(2, |id, transport| {
        let world = World::new(transport, None::<slog::Logger>);
        let queue: Queue<Vec<i32>, _> = Queue::new_array(&world);

        if id == 1 {
            queue.at(0).send_many(vec![10, 20, 30], ());
        }

        world.sync().unwrap();

        queue.iter()
    });

    assert_eq!(results[0], vec![vec![10, 20, 30]]);
    assert!(results[1].is_empty());
}

#[test]
fn fan_in_from_every_processor() {
    const COUNT: usize = 5;

    let results = LocalTransport::run(COUNT, |id, transport| {
        let world = World::new(transport, None::<slog::Logger>);
        let queue: Queue<i32, _> = Queue::new(&world);

        queue.at(0).send(id as i32);
        world.sync().unwrap();

        queue.len()
    });

    assert_eq!(results[0], COUNT);
    for &len in &results[1..] {
        assert_eq!(len, 0);
    }
}

#[test]
fn double_barrier_is_idempotent() {
    // A second `sync()` with nothing freshly scheduled must not repeat or corrupt the first
    // barrier's effects: a variable's landed value is stable state and survives, while a queue's
    // delivery buffer is strictly this-superstep's inbox and drains to empty.
    let results = LocalTransport::run(2, |id, transport| {
        let world = World::new(transport, None::<slog::Logger>);
        let x: Variable<i32, _> = Variable::new(&world, id as i32);
        let queue: Queue<i32, _> = Queue::new(&world);

        x.at(1 - id).put(&(id as i32 * 100));
        queue.at(0).send(id as i32);
        world.sync().unwrap();

        let after_first = (x.value(), queue.len());

        world.sync().unwrap();

        let after_second = (x.value(), queue.len());
        (after_first, after_second)
    });

    for (after_first, after_second) in results {
        assert_eq!(after_first.0, after_second.0, "variable value must survive an idle barrier");
        assert_eq!(after_second.1, 0, "a queue's buffer holds only the most recent barrier's messages");
    }
}

#[test]
fn coarray_put_and_slice_get() {
    let results = LocalTransport::run(2, |id, transport| {
        let world = World::new(transport, None::<slog::Logger>);
        let arr: Coarray<i32, _> = Coarray::new(&world, 4, 0);

        for i in 0..4 {
            arr.set_local(i, (id as i32 + 1) * 10 + i as i32);
        }

        let other = 1 - id;
        arr.at(other).elem(0).unwrap().put((id as i32) * 1000);
        let slice_future = arr.at(other).slice(1..3).unwrap().get();

        world.sync().unwrap();

        (arr.get_local(0), slice_future.value())
    });

    // p=0's element 0 was overwritten by p=1's put (id=1 -> 1000); p=1's by p=0's (id=0 -> 0).
    assert_eq!(results[0].0, 1000);
    assert_eq!(results[1].0, 0);

    // The slice get observes the owner's pre-put values at indices [1, 3).
    assert_eq!(results[0].1, vec![21, 22]); // p=1's original elements 1..3
    assert_eq!(results[1].1, vec![11, 12]); // p=0's original elements 1..3
}

#[test]
fn single_processor_world_degenerates_to_local_moves() {
    let results = LocalTransport::run(1, |id, transport| {
        let world = World::new(transport, None::<slog::Logger>);
        let x: Variable<i32, _> = Variable::new(&world, 7);
        let queue: Queue<i32, _> = Queue::new(&world);

        x.at(id).put(&99);
        queue.at(id).send(5);

        world.sync().unwrap();

        (x.value(), queue.iter())
    });

    assert_eq!(results[0].0, 99);
    assert_eq!(results[0].1, vec![5]);
}

#[test]
fn zero_sized_slice_put_is_a_legal_no_op() {
    let results = LocalTransport::run(2, |id, transport| {
        let world = World::new(transport, None::<slog::Logger>);
        let arr: Coarray<i32, _> = Coarray::new(&world, 4, (id as i32) + 1);

        arr.at(1 - id).slice(2..2).unwrap().put(&[]);
        world.sync().unwrap();

        (0..4).map(|i| arr.get_local(i)).collect::<Vec<_>>()
    });

    assert_eq!(results[0], vec![1, 1, 1, 1]);
    assert_eq!(results[1], vec![2, 2, 2, 2]);
}
