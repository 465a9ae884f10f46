//! Remotely addressable single-value variables: one-sided put/get against any processor holding
//! the same registration id.

use std::cell::RefCell;
use std::rc::Rc;

use crate::backend::Transport;
use crate::future::Future;
use crate::sentinel::Take;
use crate::serialize::{Message, WireCodec};
use crate::world::World;

/// The narrow capability `World::sync` needs to apply a put or read a pre-put snapshot against an
/// arbitrary registered variable, without knowing its concrete type. Byte ranges are measured in
/// the variable's own encoded representation; for a non-array `Variable<T>` the only valid range
/// is the whole value (offset 0, `len_bytes()`), since `T` need not be fixed-width. `Coarray`
/// implements this trait itself to expose true element-level ranges.
pub(crate) trait VariableSlot {
    fn type_name(&self) -> &'static str;
    fn len_bytes(&self) -> usize;
    fn read_range(&self, offset: usize, len: usize) -> Vec<u8>;
    fn write_range(&mut self, offset: usize, bytes: &[u8]);
}

struct VariableStorage<T: Message> {
    value: Rc<RefCell<T>>,
}

impl<T: Message> VariableSlot for VariableStorage<T> {
    fn type_name(&self) -> &'static str {
        T::type_name()
    }

    fn len_bytes(&self) -> usize {
        self.value.borrow().size_hint()
    }

    fn read_range(&self, offset: usize, len: usize) -> Vec<u8> {
        let bytes = WireCodec::encode(&*self.value.borrow());
        bytes[offset..offset + len].to_vec()
    }

    fn write_range(&mut self, offset: usize, bytes: &[u8]) {
        debug_assert_eq!(offset, 0, "a whole-value Variable put must start at offset 0");
        *self.value.borrow_mut() = WireCodec::decode::<T>(bytes);
    }
}

/// Owned memory with a globally-known handle: the value is local to this processor, but any
/// processor holding the same registration id can `put` into it or `get` from it via
/// [`Variable::at`].
pub struct Variable<T: Message, B: Transport> {
    world: World<B>,
    id: usize,
    value: Rc<RefCell<T>>,
}

impl<T: Message, B: Transport> Variable<T, B> {
    /// Registers a new variable, collectively, with the initial value `init`. Every processor
    /// must create variables in the same program order for registration ids to line up.
    pub fn new(world: &World<B>, init: T) -> Self {
        let value = Rc::new(RefCell::new(init));
        let storage = VariableStorage {
            value: value.clone(),
        };
        let id = world.register_variable::<T>(Box::new(storage));

        Variable {
            world: world.clone(),
            id,
            value,
        }
    }

    pub fn registration_id(&self) -> usize {
        self.id
    }

    pub fn value(&self) -> T {
        self.value.borrow().clone()
    }

    /// A mutable view of the local value, for in-place edits that don't warrant a full
    /// clone-mutate-`set` round trip.
    pub fn value_mut(&self) -> std::cell::RefMut<'_, T> {
        self.value.borrow_mut()
    }

    pub fn set(&self, value: T) {
        *self.value.borrow_mut() = value;
    }

    /// Yields a handle through which `put` and `get` can be scheduled against processor `dst`.
    pub fn at(&self, dst: usize) -> VariableImage<'_, T, B> {
        VariableImage {
            variable: self,
            dst,
        }
    }
}

impl<T: Message, B: Transport> Drop for Variable<T, B> {
    fn drop(&mut self) {
        self.world.unregister_variable(self.id);
    }
}

/// A `(variable, remote processor)` pair used to schedule one-sided operations.
pub struct VariableImage<'a, T: Message, B: Transport> {
    variable: &'a Variable<T, B>,
    dst: usize,
}

impl<'a, T: Message, B: Transport> VariableImage<'a, T, B> {
    /// Schedules a write of `v` into the remote variable at the next barrier. `v`'s bytes are
    /// captured now, not at the barrier, so later local mutations of the caller's own copy never
    /// change what is transmitted.
    pub fn try_put(&self, v: &T) -> crate::error::Result<()> {
        let bytes = WireCodec::encode(v);
        let len = bytes.len();
        self.variable
            .world
            .try_put(self.dst, self.variable.id, 0, len, bytes)
    }

    pub fn put(&self, v: &T) {
        self.try_put(v).expect("put failed");
    }

    /// Schedules a read; the returned future resolves to the remote value as of the start of the
    /// next barrier (i.e. before that barrier's puts are applied).
    pub fn try_get(&self) -> crate::error::Result<Future<T>> {
        let slot: Rc<RefCell<Take<T>>> = Rc::new(RefCell::new(Take::empty()));
        let resolver_slot = slot.clone();
        let resolver = Box::new(move |bytes: Vec<u8>| {
            resolver_slot.borrow_mut().put(WireCodec::decode::<T>(&bytes));
        });

        self.variable.world.try_get(
            self.dst,
            self.variable.id,
            0,
            1,
            0,
            true, // whole-value get: the owner's T need not be fixed-width
            resolver,
        )?;

        Ok(Future::new(slot, self.dst, self.variable.id))
    }

    pub fn get(&self) -> Future<T> {
        self.try_get().expect("get failed")
    }
}
