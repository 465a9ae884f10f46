//! Sentinel for values that are temporarily absent.
//!
//! [`Future`](crate::future::Future) models its slot as a value that is "undefined" before its
//! barrier resolves it. Rather than return stale or zeroed memory for an unresolved read, the slot
//! is genuinely empty and a read panics with a clear diagnostic.

use std::ops::{Deref, DerefMut};

#[repr(transparent)]
pub struct Take<T> {
    data: Option<T>,
}

impl<T> Take<T> {
    #[inline]
    pub fn empty() -> Self {
        Take { data: None }
    }

    #[inline]
    pub fn new(data: T) -> Self {
        Take { data: Some(data) }
    }

    /// Take the value out, leaving the sentinel empty.
    #[inline]
    pub fn take(&mut self) -> T {
        self.data.take().expect("value already taken")
    }

    /// Put a value in, overwriting whatever was there.
    #[inline]
    pub fn put(&mut self, data: T) {
        self.data = Some(data);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_none()
    }

    #[inline]
    pub fn get(&self) -> &T {
        self.data.as_ref().expect("value not yet resolved")
    }
}

impl<T> Deref for Take<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        self.get()
    }
}

impl<T> DerefMut for Take<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        self.data.as_mut().expect("value not yet resolved")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_starts_empty() {
        let slot: Take<i32> = Take::empty();
        assert!(slot.is_empty());
    }

    #[test]
    fn put_then_deref() {
        let mut slot = Take::empty();
        slot.put(5);
        assert_eq!(*slot, 5);
        assert!(!slot.is_empty());
    }

    #[test]
    fn take_empties_the_slot() {
        let mut slot = Take::new(5);
        assert_eq!(slot.take(), 5);
        assert!(slot.is_empty());
    }

    #[test]
    #[should_panic(expected = "value not yet resolved")]
    fn deref_before_resolved_panics() {
        let slot: Take<i32> = Take::empty();
        let _ = *slot;
    }
}
