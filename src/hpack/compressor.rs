//! Serializes a planned representation into wire bytes.

use crate::hpack::context::{Command, EncodingContext, HuffmanPolicy};
use crate::hpack::primitives::{encode_integer, encode_string};
use crate::hpack::Header;
use crate::error::Result;

pub struct Compressor;

impl Compressor {
    /// Plan, apply, and serialize a full header list into one HPACK block.
    pub fn compress(ctx: &mut EncodingContext, headers: &[Header]) -> Result<Vec<u8>> {
        ctx.begin_block();
        let plan = ctx.encode(headers);
        let mut out = Vec::new();
        for command in &plan {
            ctx.process(command)?;
            Self::serialize(ctx.options.huffman, command, &mut out);
        }
        Ok(out)
    }

    fn serialize(huffman: HuffmanPolicy, command: &Command, out: &mut Vec<u8>) {
        match command {
            Command::ChangeTableSize(new_max) => {
                out.extend_from_slice(&encode_integer(*new_max, 5, 0x20));
            }
            Command::Indexed(index) => {
                out.extend_from_slice(&encode_integer(index + 1, 7, 0x80));
            }
            Command::Incremental {
                name_index,
                name,
                value,
            } => Self::serialize_literal(out, huffman, *name_index, name, value, 6, 0x40),
            Command::NoIndex {
                name_index,
                name,
                value,
            } => Self::serialize_literal(out, huffman, *name_index, name, value, 4, 0x00),
            Command::NeverIndexed {
                name_index,
                name,
                value,
            } => Self::serialize_literal(out, huffman, *name_index, name, value, 4, 0x10),
        }
    }

    fn serialize_literal(
        out: &mut Vec<u8>,
        huffman: HuffmanPolicy,
        name_index: Option<usize>,
        name: &[u8],
        value: &[u8],
        prefix_bits: u8,
        type_bits: u8,
    ) {
        match name_index {
            Some(idx) => out.extend_from_slice(&encode_integer(idx + 1, prefix_bits, type_bits)),
            None => {
                out.extend_from_slice(&encode_integer(0, prefix_bits, type_bits));
                out.extend_from_slice(&encode_string(name, use_huffman(huffman, name)));
            }
        }
        out.extend_from_slice(&encode_string(value, use_huffman(huffman, value)));
    }
}

fn use_huffman(policy: HuffmanPolicy, s: &[u8]) -> bool {
    match policy {
        HuffmanPolicy::Always => true,
        HuffmanPolicy::Never => false,
        HuffmanPolicy::Shorter => crate::hpack::huffman::encoded_len(s) < s.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hpack::context::Options;
    use bytes::Bytes;

    #[test]
    fn indexed_header_is_single_byte() {
        let mut ctx = EncodingContext::new(Options::default());
        let headers = vec![Header {
            name: Bytes::from_static(b":method"),
            value: Bytes::from_static(b"GET"),
        }];
        let block = Compressor::compress(&mut ctx, &headers).unwrap();
        assert_eq!(block, vec![0x82]);
    }
}
