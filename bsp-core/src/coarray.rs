//! Array-shaped variables addressed by `(processor, index)` or `(processor, range)`.

use std::cell::RefCell;
use std::ops::Range;
use std::rc::Rc;

use crate::backend::Transport;
use crate::error::{Result, WorldError};
use crate::future::Future;
use crate::sentinel::Take;
use crate::serialize::{FixedWidth, Message};
use crate::variable::VariableSlot;
use crate::world::World;

struct CoarrayStorage<E: FixedWidth> {
    elements: Rc<RefCell<Vec<E>>>,
}

impl<E: FixedWidth> VariableSlot for CoarrayStorage<E> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<E>()
    }

    fn len_bytes(&self) -> usize {
        self.elements.borrow().len() * E::WIDTH
    }

    fn read_range(&self, offset: usize, len: usize) -> Vec<u8> {
        let elements = self.elements.borrow();
        let start = offset / E::WIDTH;
        let count = len / E::WIDTH;
        let mut out = vec![0u8; len];
        for (i, elem) in elements[start..start + count].iter().enumerate() {
            elem.write_to(&mut out[i * E::WIDTH..(i + 1) * E::WIDTH]);
        }
        out
    }

    fn write_range(&mut self, offset: usize, bytes: &[u8]) {
        let mut elements = self.elements.borrow_mut();
        let start = offset / E::WIDTH;
        let count = bytes.len() / E::WIDTH;
        for i in 0..count {
            elements[start + i] = E::read_from(&bytes[i * E::WIDTH..(i + 1) * E::WIDTH]);
        }
    }
}

/// A variable whose value is a fixed-size array of a fixed-width element type, addressable
/// element-wise (`at(dst).elem(i)`) or by half-open slice (`at(dst).slice(lo..hi)`), in addition
/// to ordinary local access (`get_local`/`set_local`).
pub struct Coarray<E: FixedWidth, B: Transport> {
    world: World<B>,
    id: usize,
    elements: Rc<RefCell<Vec<E>>>,
}

impl<E: FixedWidth, B: Transport> Coarray<E, B> {
    /// Registers a new coarray, collectively, with `len` elements initialized to `init`.
    pub fn new(world: &World<B>, len: usize, init: E) -> Self {
        let elements = Rc::new(RefCell::new(vec![init; len]));
        let storage = CoarrayStorage {
            elements: elements.clone(),
        };
        let id = world.register_variable::<E>(Box::new(storage));

        Coarray {
            world: world.clone(),
            id,
            elements,
        }
    }

    pub fn registration_id(&self) -> usize {
        self.id
    }

    pub fn len(&self) -> usize {
        self.elements.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_local(&self, index: usize) -> E {
        self.elements.borrow()[index]
    }

    pub fn set_local(&self, index: usize, value: E) {
        self.elements.borrow_mut()[index] = value;
    }

    fn check_bounds(&self, index: usize) -> Result<()> {
        let len = self.len();
        if index >= len {
            Err(WorldError::OutOfRange { index, len })
        } else {
            Ok(())
        }
    }

    fn check_range(&self, range: &Range<usize>) -> Result<()> {
        let len = self.len();
        if range.start > range.end || range.end > len {
            Err(WorldError::OutOfRange {
                index: range.end,
                len,
            })
        } else {
            Ok(())
        }
    }

    pub fn at(&self, dst: usize) -> CoarrayImage<'_, E, B> {
        CoarrayImage {
            coarray: self,
            dst,
        }
    }
}

impl<E: FixedWidth, B: Transport> Drop for Coarray<E, B> {
    fn drop(&mut self) {
        self.world.unregister_variable(self.id);
    }
}

/// A `(coarray, remote processor)` pair: the entry point for `elem`/`slice` images.
pub struct CoarrayImage<'a, E: FixedWidth, B: Transport> {
    coarray: &'a Coarray<E, B>,
    dst: usize,
}

impl<'a, E: FixedWidth, B: Transport> CoarrayImage<'a, E, B> {
    pub fn elem(&self, index: usize) -> Result<ElemImage<'a, E, B>> {
        self.coarray.check_bounds(index)?;
        Ok(ElemImage {
            coarray: self.coarray,
            dst: self.dst,
            index,
        })
    }

    pub fn slice(&self, range: Range<usize>) -> Result<SliceImage<'a, E, B>> {
        self.coarray.check_range(&range)?;
        Ok(SliceImage {
            coarray: self.coarray,
            dst: self.dst,
            range,
        })
    }
}

/// A single remote element, reached via `coarray.at(dst).elem(i)`.
pub struct ElemImage<'a, E: FixedWidth, B: Transport> {
    coarray: &'a Coarray<E, B>,
    dst: usize,
    index: usize,
}

impl<'a, E: FixedWidth, B: Transport> ElemImage<'a, E, B> {
    pub fn try_put(&self, value: E) -> Result<()> {
        let mut bytes = vec![0u8; E::WIDTH];
        value.write_to(&mut bytes);
        self.coarray
            .world
            .try_put(self.dst, self.coarray.id, self.index, E::WIDTH, bytes)
    }

    pub fn put(&self, value: E) {
        self.try_put(value).expect("coarray element put failed");
    }

    pub fn try_get(&self) -> Result<Future<E>> {
        let slot: Rc<RefCell<Take<E>>> = Rc::new(RefCell::new(Take::empty()));
        let resolver_slot = slot.clone();
        let resolver = Box::new(move |bytes: Vec<u8>| {
            resolver_slot.borrow_mut().put(E::read_from(&bytes));
        });

        self.coarray.world.try_get(
            self.dst,
            self.coarray.id,
            self.index,
            1,
            E::WIDTH,
            false,
            resolver,
        )?;

        Ok(Future::new(slot, self.dst, self.coarray.id))
    }

    pub fn get(&self) -> Future<E> {
        self.try_get().expect("coarray element get failed")
    }
}

/// A remote half-open slice, reached via `coarray.at(dst).slice(lo..hi)`.
pub struct SliceImage<'a, E: FixedWidth, B: Transport> {
    coarray: &'a Coarray<E, B>,
    dst: usize,
    range: Range<usize>,
}

impl<'a, E: FixedWidth, B: Transport> SliceImage<'a, E, B> {
    fn count(&self) -> usize {
        self.range.end - self.range.start
    }

    pub fn try_put(&self, values: &[E]) -> Result<()> {
        if values.len() != self.count() {
            return Err(WorldError::SizeMismatch {
                expected: self.count(),
                found: values.len(),
            });
        }

        let mut bytes = vec![0u8; values.len() * E::WIDTH];
        for (i, value) in values.iter().enumerate() {
            value.write_to(&mut bytes[i * E::WIDTH..(i + 1) * E::WIDTH]);
        }

        self.coarray.world.try_put(
            self.dst,
            self.coarray.id,
            self.range.start,
            E::WIDTH,
            bytes,
        )
    }

    pub fn put(&self, values: &[E]) {
        self.try_put(values).expect("coarray slice put failed");
    }

    pub fn try_get(&self) -> Result<Future<Vec<E>>> {
        let count = self.count();
        let slot: Rc<RefCell<Take<Vec<E>>>> = Rc::new(RefCell::new(Take::empty()));
        let resolver_slot = slot.clone();
        let resolver = Box::new(move |bytes: Vec<u8>| {
            let values = (0..count)
                .map(|i| E::read_from(&bytes[i * E::WIDTH..(i + 1) * E::WIDTH]))
                .collect();
            resolver_slot.borrow_mut().put(values);
        });

        self.coarray.world.try_get(
            self.dst,
            self.coarray.id,
            self.range.start,
            count,
            E::WIDTH,
            false,
            resolver,
        )?;

        Ok(Future::new(slot, self.dst, self.coarray.id))
    }

    pub fn get(&self) -> Future<Vec<E>> {
        self.try_get().expect("coarray slice get failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::local::LocalTransport;

    #[test]
    fn out_of_range_element_is_rejected_before_scheduling() {
        LocalTransport::run(1, |id, transport| {
            let world = World::new(transport, None::<slog::Logger>);
            let arr: Coarray<i32, _> = Coarray::new(&world, 4, 0);

            let err = arr.at(id).elem(4).unwrap_err();
            assert_eq!(err, WorldError::OutOfRange { index: 4, len: 4 });
        });
    }

    #[test]
    fn slice_out_of_range_is_rejected_before_scheduling() {
        LocalTransport::run(1, |id, transport| {
            let world = World::new(transport, None::<slog::Logger>);
            let arr: Coarray<i32, _> = Coarray::new(&world, 4, 0);

            let err = arr.at(id).slice(2..5).unwrap_err();
            assert_eq!(err, WorldError::OutOfRange { index: 5, len: 4 });
        });
    }

    #[test]
    fn slice_put_with_wrong_element_count_is_rejected() {
        LocalTransport::run(1, |id, transport| {
            let world = World::new(transport, None::<slog::Logger>);
            let arr: Coarray<i32, _> = Coarray::new(&world, 4, 0);

            let err = arr.at(id).slice(0..2).unwrap().try_put(&[1]).unwrap_err();
            assert_eq!(
                err,
                WorldError::SizeMismatch {
                    expected: 2,
                    found: 1,
                }
            );
        });
    }
}
