//! Cache Codec Implementations
//!
//! This module provides built-in implementations of the [`CacheCodec`](crate::traits::CacheCodec) trait
//! for different serialization backends.

mod json;
pub use json::JsonCodec;

#[cfg(feature = "simd_json")]
mod simd_json;
#[cfg(feature = "simd_json")]
#[cfg_attr(docsrs, doc(cfg(feature = "simd_json")))]
pub use simd_json::SimdJsonCodec;

#[cfg(feature = "postcard")]
mod postcard;
#[cfg(feature = "postcard")]
#[cfg_attr(docsrs, doc(cfg(feature = "postcard")))]
pub use postcard::PostcardCodec;

/// The reserved wire form for "known absent". No codec in this module ever
/// produces this exact byte string for a real value: JSON values always
/// start with a JSON token character, postcard/simd-json payloads are
/// similarly shaped, and this token does not overlap any of them at this
/// fixed length.
pub const TOMBSTONE_SENTINEL: &[u8] = b"@@NULL@@";

/// Whether a wire-form payload is the tombstone sentinel rather than an
/// encoded domain value.
#[must_use]
pub fn is_tombstone(wire: &[u8]) -> bool {
    wire == TOMBSTONE_SENTINEL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_never_produces_the_sentinel() {
        let codec = JsonCodec;
        let encoded = crate::traits::CacheCodec::serialize(&codec, &"@@NULL@@").unwrap();
        assert_ne!(encoded.as_slice(), TOMBSTONE_SENTINEL);
    }
}
