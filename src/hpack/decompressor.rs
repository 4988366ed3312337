//! Parses a wire HPACK block back into headers.

use crate::error::{H2Error, Result};
use crate::hpack::context::{Command, EncodingContext};
use crate::hpack::primitives::{decode_integer, decode_string};
use crate::hpack::Header;
use bytes::Bytes;

/// Optional sink for the fields the connection/stream layer cares
/// about without re-scanning the decoded header list.
#[derive(Debug, Default, Clone)]
pub struct ParseFrameContext {
    pub status: Option<u16>,
    pub method: Option<Bytes>,
    pub content_length: Option<u64>,
    pub trailer: Vec<Bytes>,
}

pub struct Decompressor;

impl Decompressor {
    pub fn decompress(
        data: &[u8],
        ctx: &mut EncodingContext,
        mut frame_ctx: Option<&mut ParseFrameContext>,
    ) -> Result<Vec<Header>> {
        ctx.begin_block();
        let mut headers = Vec::new();
        let mut pos = 0;
        let mut seen_regular = false;

        while pos < data.len() {
            let byte = data[pos];
            let header = if byte & 0x80 != 0 {
                let (wire_index, consumed) = decode_integer(&data[pos..], 7)?;
                pos += consumed;
                if wire_index == 0 {
                    return Err(H2Error::compression("indexed representation with index 0"));
                }
                let header = ctx.dereference(wire_index - 1)?;
                ctx.process(&Command::Indexed(wire_index - 1))?;
                header
            } else if byte & 0x40 != 0 {
                let (header, consumed) = Self::read_literal(&data[pos..], ctx, 6)?;
                pos += consumed;
                ctx.process(&Command::Incremental {
                    name_index: None,
                    name: header.name.clone(),
                    value: header.value.clone(),
                })?;
                header
            } else if byte & 0x20 != 0 {
                let (new_size, consumed) = decode_integer(&data[pos..], 5)?;
                pos += consumed;
                ctx.process(&Command::ChangeTableSize(new_size))?;
                continue;
            } else if byte & 0x10 != 0 {
                let (header, consumed) = Self::read_literal(&data[pos..], ctx, 4)?;
                pos += consumed;
                ctx.process(&Command::NeverIndexed {
                    name_index: None,
                    name: header.name.clone(),
                    value: header.value.clone(),
                })?;
                header
            } else {
                let (header, consumed) = Self::read_literal(&data[pos..], ctx, 4)?;
                pos += consumed;
                ctx.process(&Command::NoIndex {
                    name_index: None,
                    name: header.name.clone(),
                    value: header.value.clone(),
                })?;
                header
            };

            validate(&header, &mut seen_regular)?;
            if let Some(fc) = frame_ctx.as_deref_mut() {
                apply_frame_context(fc, &header);
            }
            headers.push(header);
        }

        Ok(headers)
    }

    /// Reads the (possibly indexed) name followed by the literal value.
    /// Returns `(header, bytes_consumed)`.
    fn read_literal(data: &[u8], ctx: &EncodingContext, prefix_bits: u8) -> Result<(Header, usize)> {
        let (wire_index, mut pos) = decode_integer(data, prefix_bits)?;
        let name = if wire_index == 0 {
            let (s, consumed) = decode_string(&data[pos..])?;
            pos += consumed;
            s
        } else {
            ctx.dereference(wire_index - 1)?.name
        };
        let (value, consumed) = decode_string(&data[pos..])?;
        pos += consumed;
        Ok((Header { name, value }, pos))
    }
}

fn validate(header: &Header, seen_regular: &mut bool) -> Result<()> {
    let is_pseudo = header.name.first() == Some(&b':');
    if is_pseudo && *seen_regular {
        return Err(H2Error::protocol("pseudo-header after regular header"));
    }
    if !is_pseudo {
        *seen_regular = true;
    }
    if header.name.iter().any(u8::is_ascii_uppercase) {
        return Err(H2Error::protocol("header name contains an upper-case letter"));
    }
    if header.name.as_ref() == b"connection" || header.name.as_ref() == b"te" {
        return Err(H2Error::protocol(format!(
            "forbidden header field {:?}",
            String::from_utf8_lossy(&header.name)
        )));
    }
    Ok(())
}

fn apply_frame_context(fc: &mut ParseFrameContext, header: &Header) {
    match header.name.as_ref() {
        b":status" => {
            if let Ok(s) = std::str::from_utf8(&header.value) {
                fc.status = s.parse().ok();
            }
        }
        b":method" => fc.method = Some(header.value.clone()),
        b"content-length" => {
            if let Ok(s) = std::str::from_utf8(&header.value) {
                fc.content_length = s.parse().ok();
            }
        }
        b"trailer" => fc.trailer.push(header.value.clone()),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hpack::compressor::Compressor;
    use crate::hpack::context::Options;

    #[test]
    fn decodes_indexed_header() {
        let mut ctx = EncodingContext::new(Options::default());
        let headers = Decompressor::decompress(&[0x82], &mut ctx, None).unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].name.as_ref(), b":method");
        assert_eq!(headers[0].value.as_ref(), b"GET");
    }

    #[test]
    fn zero_index_is_compression_error() {
        let mut ctx = EncodingContext::new(Options::default());
        let err = Decompressor::decompress(&[0x80], &mut ctx, None);
        assert!(err.is_err());
    }

    #[test]
    fn uppercase_name_is_protocol_error() {
        let mut encoder_ctx = EncodingContext::new(Options::default());
        // hand-build a literal-without-indexing, new name, "X-Foo"/"bar"
        let mut block = vec![0x00u8];
        block.push(5);
        block.extend_from_slice(b"X-Foo");
        block.push(3);
        block.extend_from_slice(b"bar");
        let err = Decompressor::decompress(&block, &mut encoder_ctx, None);
        assert!(err.is_err());
    }

    #[test]
    fn forbidden_header_connection_is_protocol_error() {
        let mut ctx = EncodingContext::new(Options::default());
        let mut block = vec![0x00u8];
        block.push(10);
        block.extend_from_slice(b"connection");
        block.push(5);
        block.extend_from_slice(b"close");
        assert!(Decompressor::decompress(&block, &mut ctx, None).is_err());
    }

    #[test]
    fn pseudo_after_regular_is_protocol_error() {
        let mut ctx = EncodingContext::new(Options::default());
        let headers = vec![
            Header {
                name: Bytes::from_static(b"host"),
                value: Bytes::from_static(b"example.com"),
            },
            Header {
                name: Bytes::from_static(b":path"),
                value: Bytes::from_static(b"/"),
            },
        ];
        // Build the block directly so ordering is NOT auto-corrected by the planner.
        let mut block = Vec::new();
        for h in &headers {
            block.push(0x00);
            block.extend_from_slice(&crate::hpack::primitives::encode_string(&h.name, false));
            block.extend_from_slice(&crate::hpack::primitives::encode_string(&h.value, false));
        }
        assert!(Decompressor::decompress(&block, &mut ctx, None).is_err());
    }

    #[test]
    fn round_trips_through_compressor() {
        let mut enc_ctx = EncodingContext::new(Options::default());
        let mut dec_ctx = EncodingContext::new(Options::default());
        let headers = vec![
            Header {
                name: Bytes::from_static(b":method"),
                value: Bytes::from_static(b"GET"),
            },
            Header {
                name: Bytes::from_static(b":path"),
                value: Bytes::from_static(b"/"),
            },
            Header {
                name: Bytes::from_static(b"host"),
                value: Bytes::from_static(b"example.com"),
            },
        ];
        let block = Compressor::compress(&mut enc_ctx, &headers).unwrap();
        let decoded = Decompressor::decompress(&block, &mut dec_ctx, None).unwrap();
        assert_eq!(decoded.len(), headers.len());
        for (got, want) in decoded.iter().zip(headers.iter()) {
            assert_eq!(got.name, want.name);
            assert_eq!(got.value, want.value);
        }
    }

    #[test]
    fn extracts_parse_frame_context() {
        let mut ctx = EncodingContext::new(Options::default());
        let headers = vec![
            Header {
                name: Bytes::from_static(b":status"),
                value: Bytes::from_static(b"200"),
            },
            Header {
                name: Bytes::from_static(b"content-length"),
                value: Bytes::from_static(b"42"),
            },
        ];
        let mut enc_ctx = EncodingContext::new(Options::default());
        let block = Compressor::compress(&mut enc_ctx, &headers).unwrap();
        let mut fc = ParseFrameContext::default();
        Decompressor::decompress(&block, &mut ctx, Some(&mut fc)).unwrap();
        assert_eq!(fc.status, Some(200));
        assert_eq!(fc.content_length, Some(42));
    }
}
