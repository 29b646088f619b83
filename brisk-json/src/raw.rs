//! Raw JSON byte ranges.

use core::any::TypeId;
use core::mem::{align_of, size_of};

use brisk_core::{default_in_place_of, Kind, Shape, Shaped, VTable};

/// An opaque wrapper that round-trips a JSON byte range.
///
/// Decoding copies the exact extent of one value, whitespace and all;
/// encoding compacts the stored bytes into the output. The empty default
/// encodes as `null`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawMessage(pub Vec<u8>);

impl RawMessage {
    pub fn new(bytes: impl Into<Vec<u8>>) -> RawMessage {
        RawMessage(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for RawMessage {
    fn from(bytes: Vec<u8>) -> RawMessage {
        RawMessage(bytes)
    }
}

unsafe fn raw_is_empty(ptr: *const u8) -> bool {
    (*(ptr as *const RawMessage)).0.is_empty()
}

// The `Raw` kind is reserved for this exact type.
unsafe impl Shaped for RawMessage {
    const SHAPE: &'static Shape = &Shape {
        name: "RawMessage",
        size: size_of::<RawMessage>(),
        align: align_of::<RawMessage>(),
        type_id: TypeId::of::<RawMessage>,
        kind: Kind::Raw,
        vtable: VTable::new(default_in_place_of::<RawMessage>, raw_is_empty),
    };
}
