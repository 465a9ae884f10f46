//! Placeholder for the result of a `get`, resolved at the next barrier.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::sentinel::Take;
use crate::serialize::Message;

/// Holds the slot a `get` will populate once the barrier it was scheduled against completes.
///
/// The slot is genuinely absent until then — reading it early panics rather than returning stale
/// or zeroed memory, making the "undefined before its barrier" language in the data model
/// concrete and debuggable.
pub struct Future<T: Message> {
    slot: Rc<RefCell<Take<T>>>,
    processor: usize,
    var_id: usize,
}

impl<T: Message> Future<T> {
    pub(crate) fn new(slot: Rc<RefCell<Take<T>>>, processor: usize, var_id: usize) -> Self {
        Future {
            slot,
            processor,
            var_id,
        }
    }

    /// `true` once the barrier this future was scheduled against has completed.
    pub fn is_ready(&self) -> bool {
        !self.slot.borrow().is_empty()
    }

    /// The resolved value. Panics if called before the next `World::sync()` has returned.
    pub fn value(&self) -> T {
        if self.slot.borrow().is_empty() {
            panic!(
                "future for variable {} on processor {} read before its barrier resolved it",
                self.var_id, self.processor
            );
        }
        self.slot.borrow().get().clone()
    }
}

impl<T: Message> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("processor", &self.processor)
            .field("var_id", &self.var_id)
            .field("ready", &self.is_ready())
            .finish()
    }
}
