//! Size-and-copy serialization of plain types, strings, and vectors into flat byte buffers.
//!
//! Puts, gets, and queue messages all move as contiguous byte blocks between barriers. This
//! module is the "internal format used between processors of the same world" the data model
//! describes: a cursor-based [`Encoder`]/[`Decoder`] pair for fixed-width fields, length-prefixed
//! strings, and length-prefixed arrays of fixed-width elements, plus the traits that let `World`
//! treat arbitrary application types uniformly.
//!
//! Portability across worlds, across runs, or across heterogeneous backends is explicitly not a
//! goal (§4.6): the wire format is native-endian and private to one run of one binary.

use byteorder::{ByteOrder, NativeEndian};

/// A contiguous, growable byte buffer with a write cursor.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn with_capacity(capacity: usize) -> Self {
        Encoder {
            buf: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn write_fixed<T: FixedWidth>(&mut self, value: &T) {
        let start = self.buf.len();
        self.buf.resize(start + T::WIDTH, 0);
        value.write_to(&mut self.buf[start..]);
    }

    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Length-prefixed string: a `u32` byte count followed by the UTF-8 bytes.
    pub fn write_str(&mut self, value: &str) {
        self.write_fixed(&(value.len() as u32));
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Length-prefixed array of fixed-width elements: a `u32` element count followed by
    /// `count * size_of(element)` bytes.
    pub fn write_array<T: FixedWidth>(&mut self, items: &[T]) {
        self.write_fixed(&(items.len() as u32));
        for item in items {
            self.write_fixed(item);
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

/// A read-only view over a byte buffer with a read cursor.
pub struct Decoder<'a> {
    buf: &'a [u8],
    cursor: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Decoder { buf, cursor: 0 }
    }

    #[inline]
    pub fn read_fixed<T: FixedWidth>(&mut self) -> T {
        let value = T::read_from(&self.buf[self.cursor..self.cursor + T::WIDTH]);
        self.cursor += T::WIDTH;
        value
    }

    #[inline]
    pub fn read_bytes(&mut self, len: usize) -> &'a [u8] {
        let slice = &self.buf[self.cursor..self.cursor + len];
        self.cursor += len;
        slice
    }

    pub fn read_str(&mut self) -> String {
        let len = self.read_fixed::<u32>() as usize;
        String::from_utf8_lossy(self.read_bytes(len)).into_owned()
    }

    pub fn read_array<T: FixedWidth>(&mut self) -> Vec<T> {
        let len = self.read_fixed::<u32>() as usize;
        (0..len).map(|_| self.read_fixed::<T>()).collect()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.cursor
    }
}

/// A scaler pass: computes the exact buffer size a set of values will need without copying them,
/// so `World` can allocate exchange buffers once per barrier rather than grow them incrementally.
#[derive(Debug, Default, Clone, Copy)]
pub struct SizeHint(usize);

impl SizeHint {
    pub fn zero() -> Self {
        SizeHint(0)
    }

    #[inline]
    pub fn add<T: Message>(mut self, value: &T) -> Self {
        self.0 += value.size_hint();
        self
    }

    #[inline]
    pub fn bytes(self) -> usize {
        self.0
    }
}

/// A byte-copyable fixed-width scalar. Implemented for the plain numeric types and `bool`; this
/// is the element type coarrays and array-valued messages are built from.
pub trait FixedWidth: Copy + Sized + 'static {
    const WIDTH: usize;

    fn write_to(&self, out: &mut [u8]);
    fn read_from(buf: &[u8]) -> Self;
}

macro_rules! impl_fixed_width_byte {
    ($ty:ty) => {
        impl FixedWidth for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();

            #[inline]
            fn write_to(&self, out: &mut [u8]) {
                out[0] = *self as u8;
            }

            #[inline]
            fn read_from(buf: &[u8]) -> Self {
                buf[0] as $ty
            }
        }
    };
}

macro_rules! impl_fixed_width_multibyte {
    ($ty:ty, $write:ident, $read:ident) => {
        impl FixedWidth for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();

            #[inline]
            fn write_to(&self, out: &mut [u8]) {
                NativeEndian::$write(out, *self);
            }

            #[inline]
            fn read_from(buf: &[u8]) -> Self {
                NativeEndian::$read(buf)
            }
        }
    };
}

impl_fixed_width_byte!(u8);
impl_fixed_width_byte!(i8);

impl FixedWidth for bool {
    const WIDTH: usize = 1;

    #[inline]
    fn write_to(&self, out: &mut [u8]) {
        out[0] = *self as u8;
    }

    #[inline]
    fn read_from(buf: &[u8]) -> Self {
        buf[0] != 0
    }
}

impl_fixed_width_multibyte!(u16, write_u16, read_u16);
impl_fixed_width_multibyte!(i16, write_i16, read_i16);
impl_fixed_width_multibyte!(u32, write_u32, read_u32);
impl_fixed_width_multibyte!(i32, write_i32, read_i32);
impl_fixed_width_multibyte!(u64, write_u64, read_u64);
impl_fixed_width_multibyte!(i64, write_i64, read_i64);
impl_fixed_width_multibyte!(f32, write_f32, read_f32);
impl_fixed_width_multibyte!(f64, write_f64, read_f64);

/// Names a type for collective-mismatch diagnostics. `#[derive(Payload)]` (from
/// `bsp-core-macros`) fills this in; see that crate for why nothing else needs deriving.
pub trait Payload: Sized {
    fn type_name() -> &'static str;
}

/// A value that can be captured into, and reconstructed from, the flat wire format: the contract
/// every `Variable`, `Coarray` element type, and `Queue` message type must satisfy.
pub trait Message: Payload + Clone {
    fn encode(&self, enc: &mut Encoder);
    fn decode(dec: &mut Decoder) -> Self;
    /// Exact encoded size in bytes, used by the scaler pass ([`SizeHint`]).
    fn size_hint(&self) -> usize;
}

/// A message whose content is array-shaped, enabling `Sender::send_many`: one message transports
/// many elements plus optional fixed trailing fields in a single call instead of looping.
pub trait ArrayMessage: Message {
    type Element: FixedWidth;
    type Tail: Message + Default;

    fn elements(&self) -> &[Self::Element];
    fn from_parts(elements: Vec<Self::Element>, tail: Self::Tail) -> Self;
}

impl<T: FixedWidth> Payload for T {
    fn type_name() -> &'static str {
        std::any::type_name::<T>()
    }
}

impl<T: FixedWidth> Message for T {
    #[inline]
    fn encode(&self, enc: &mut Encoder) {
        enc.write_fixed(self);
    }

    #[inline]
    fn decode(dec: &mut Decoder) -> Self {
        dec.read_fixed()
    }

    #[inline]
    fn size_hint(&self) -> usize {
        T::WIDTH
    }
}

impl Payload for () {
    fn type_name() -> &'static str {
        "()"
    }
}

impl Message for () {
    fn encode(&self, _enc: &mut Encoder) {}
    fn decode(_dec: &mut Decoder) -> Self {}
    fn size_hint(&self) -> usize {
        0
    }
}

impl Payload for String {
    fn type_name() -> &'static str {
        "String"
    }
}

impl Message for String {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_str(self);
    }

    fn decode(dec: &mut Decoder) -> Self {
        dec.read_str()
    }

    fn size_hint(&self) -> usize {
        4 + self.len()
    }
}

impl<E: FixedWidth> Payload for Vec<E> {
    fn type_name() -> &'static str {
        "Vec"
    }
}

impl<E: FixedWidth> Message for Vec<E> {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_array(self);
    }

    fn decode(dec: &mut Decoder) -> Self {
        dec.read_array()
    }

    fn size_hint(&self) -> usize {
        4 + self.len() * E::WIDTH
    }
}

impl<E: FixedWidth> ArrayMessage for Vec<E> {
    type Element = E;
    type Tail = ();

    fn elements(&self) -> &[E] {
        self
    }

    fn from_parts(elements: Vec<E>, _tail: ()) -> Self {
        elements
    }
}

/// Ties the scaler pass to the encode/decode contract: turns a `Message` into bytes (or back)
/// using exactly the buffer size its own `size_hint` reports.
pub struct WireCodec;

impl WireCodec {
    pub fn encode<T: Message>(value: &T) -> Vec<u8> {
        let mut enc = Encoder::with_capacity(value.size_hint());
        value.encode(&mut enc);
        enc.into_bytes()
    }

    pub fn decode<T: Message>(bytes: &[u8]) -> T {
        let mut dec = Decoder::new(bytes);
        T::decode(&mut dec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_width_round_trips() {
        let mut enc = Encoder::with_capacity(0);
        enc.write_fixed(&42u32);
        enc.write_fixed(&-7i16);
        enc.write_fixed(&true);
        enc.write_fixed(&3.25f64);
        let bytes = enc.into_bytes();

        let mut dec = Decoder::new(&bytes);
        assert_eq!(dec.read_fixed::<u32>(), 42);
        assert_eq!(dec.read_fixed::<i16>(), -7);
        assert_eq!(dec.read_fixed::<bool>(), true);
        assert_eq!(dec.read_fixed::<f64>(), 3.25);
    }

    #[test]
    fn string_round_trips() {
        let value = "hello bsp".to_string();
        let bytes = WireCodec::encode(&value);
        let decoded: String = WireCodec::decode(&bytes);
        assert_eq!(decoded, value);
    }

    #[test]
    fn vector_round_trips_and_is_an_array_message() {
        let value: Vec<i32> = vec![10, 20, 30];
        let bytes = WireCodec::encode(&value);
        let decoded: Vec<i32> = WireCodec::decode(&bytes);
        assert_eq!(decoded, value);

        assert_eq!(value.elements(), &[10, 20, 30]);
        assert_eq!(Vec::from_parts(vec![1, 2], ()), vec![1, 2]);
    }

    #[test]
    fn size_hint_matches_encoded_length() {
        let value: Vec<u8> = vec![1, 2, 3, 4];
        let bytes = WireCodec::encode(&value);
        assert_eq!(bytes.len(), value.size_hint());
    }
}
