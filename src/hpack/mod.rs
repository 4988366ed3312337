//! HPACK header compression (RFC 7541): Huffman
//! codec, integer/string primitives, the encoding context, and the
//! compressor/decompressor built on top of it.

pub mod compressor;
pub mod context;
pub mod decompressor;
pub mod huffman;
pub mod primitives;
pub mod static_table;

pub use compressor::Compressor;
pub use context::{Command, EncodingContext, HuffmanPolicy, IndexPolicy, Options};
pub use decompressor::{Decompressor, ParseFrameContext};

use bytes::Bytes;

/// A single decoded or to-be-encoded header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: Bytes,
    pub value: Bytes,
}

impl Header {
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}
