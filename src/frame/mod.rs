//! The binary frame codec: bit-exact encode/decode of
//! every HTTP/2 frame type, including padding, CONTINUATION splitting,
//! priority, and unknown-type handling.

pub mod flags;

use crate::buffer::Buffer;
use crate::error::{H2Error, Result};
use bytes::Bytes;

pub use flags::{
    ContinuationFlags, DataFlags, HeadersFlags, PingFlags, PushPromiseFlags, SettingsFlags,
};

/// The 24-byte client connection preface (RFC 7540 §3.5).
pub const CONNECTION_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

const FRAME_HEADER_LEN: usize = 9;
const U31_MASK: u32 = 0x7fff_ffff;

/// RFC 7540 §6.5.2 frame type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Data,
    Headers,
    Priority,
    RstStream,
    Settings,
    PushPromise,
    Ping,
    GoAway,
    WindowUpdate,
    Continuation,
    AltSvc,
    Origin,
    Unknown(u8),
}

impl FrameType {
    fn from_u8(b: u8) -> Self {
        match b {
            0x0 => FrameType::Data,
            0x1 => FrameType::Headers,
            0x2 => FrameType::Priority,
            0x3 => FrameType::RstStream,
            0x4 => FrameType::Settings,
            0x5 => FrameType::PushPromise,
            0x6 => FrameType::Ping,
            0x7 => FrameType::GoAway,
            0x8 => FrameType::WindowUpdate,
            0x9 => FrameType::Continuation,
            0xa => FrameType::AltSvc,
            0xc => FrameType::Origin,
            other => FrameType::Unknown(other),
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            FrameType::Data => 0x0,
            FrameType::Headers => 0x1,
            FrameType::Priority => 0x2,
            FrameType::RstStream => 0x3,
            FrameType::Settings => 0x4,
            FrameType::PushPromise => 0x5,
            FrameType::Ping => 0x6,
            FrameType::GoAway => 0x7,
            FrameType::WindowUpdate => 0x8,
            FrameType::Continuation => 0x9,
            FrameType::AltSvc => 0xa,
            FrameType::Origin => 0xc,
            FrameType::Unknown(other) => other,
        }
    }
}

/// Stream priority parameters carried by HEADERS (when PRIORITY is set)
/// and by standalone PRIORITY frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priority {
    pub exclusive: bool,
    pub dependency: u32,
    /// Actual weight, 1–256 (wire encodes `weight - 1`).
    pub weight: u16,
}

/// A fully parsed/to-be-encoded HTTP/2 frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Data {
        stream_id: u32,
        end_stream: bool,
        padding: Option<u8>,
        payload: Bytes,
    },
    Headers {
        stream_id: u32,
        end_stream: bool,
        end_headers: bool,
        padding: Option<u8>,
        priority: Option<Priority>,
        header_block: Bytes,
    },
    Priority {
        stream_id: u32,
        priority: Priority,
    },
    RstStream {
        stream_id: u32,
        error: u32,
    },
    Settings {
        ack: bool,
        params: Vec<(u16, u32)>,
    },
    PushPromise {
        stream_id: u32,
        promise_stream_id: u32,
        end_headers: bool,
        padding: Option<u8>,
        header_block: Bytes,
    },
    Ping {
        ack: bool,
        payload: [u8; 8],
    },
    GoAway {
        last_stream_id: u32,
        error: u32,
        debug: Bytes,
    },
    WindowUpdate {
        stream_id: u32,
        increment: u32,
    },
    Continuation {
        stream_id: u32,
        end_headers: bool,
        header_block: Bytes,
    },
    #[cfg(feature = "rfc7838")]
    AltSvc {
        stream_id: u32,
        origin: Bytes,
        value: Bytes,
    },
    #[cfg(feature = "rfc8336")]
    Origin {
        stream_id: u32,
        origins: Vec<Bytes>,
    },
    /// A frame of an unrecognized type, kept verbatim for the caller
    /// to discard (RFC 7540 §4.1: unknown frame types are ignored).
    Unknown {
        frame_type: u8,
        stream_id: u32,
        flags: u8,
        payload: Bytes,
    },
}

impl Frame {
    pub fn stream_id(&self) -> u32 {
        match self {
            Frame::Data { stream_id, .. }
            | Frame::Headers { stream_id, .. }
            | Frame::Priority { stream_id, .. }
            | Frame::RstStream { stream_id, .. }
            | Frame::PushPromise { stream_id, .. }
            | Frame::WindowUpdate { stream_id, .. }
            | Frame::Continuation { stream_id, .. }
            | Frame::Unknown { stream_id, .. } => *stream_id,
            #[cfg(feature = "rfc7838")]
            Frame::AltSvc { stream_id, .. } => *stream_id,
            #[cfg(feature = "rfc8336")]
            Frame::Origin { stream_id, .. } => *stream_id,
            Frame::Settings { .. } | Frame::Ping { .. } | Frame::GoAway { .. } => 0,
        }
    }

    /// True for frame types that must appear only inside a header
    /// block in progress (i.e. CONTINUATION).
    pub fn is_continuation(&self) -> bool {
        matches!(self, Frame::Continuation { .. })
    }

    pub fn ends_headers(&self) -> bool {
        match self {
            Frame::Headers { end_headers, .. } => *end_headers,
            Frame::PushPromise { end_headers, .. } => *end_headers,
            Frame::Continuation { end_headers, .. } => *end_headers,
            _ => true,
        }
    }

    pub fn header_block(&self) -> Option<&Bytes> {
        match self {
            Frame::Headers { header_block, .. } => Some(header_block),
            Frame::PushPromise { header_block, .. } => Some(header_block),
            Frame::Continuation { header_block, .. } => Some(header_block),
            _ => None,
        }
    }
}

/// Encodes/decodes frames against negotiated max-frame-size limits.
#[derive(Debug, Clone, Copy)]
pub struct Framer {
    pub local_max_frame_size: u32,
    pub remote_max_frame_size: u32,
}

impl Default for Framer {
    fn default() -> Self {
        Self {
            local_max_frame_size: 16_384,
            remote_max_frame_size: 16_384,
        }
    }
}

impl Framer {
    pub fn new(local_max_frame_size: u32, remote_max_frame_size: u32) -> Self {
        Self {
            local_max_frame_size,
            remote_max_frame_size,
        }
    }

    /// Parse exactly one frame from the front of `buf`, or `None` if
    /// the buffer does not yet contain a complete frame. Partial reads
    /// never consume bytes.
    pub fn parse(&self, buf: &mut Buffer) -> Result<Option<Frame>> {
        if buf.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }
        let header = buf.byteslice(0, FRAME_HEADER_LEN);
        let length = ((header[0] as u32) << 16) | ((header[1] as u32) << 8) | header[2] as u32;
        let frame_type = FrameType::from_u8(header[3]);
        let raw_flags = header[4];
        let stream_id = u32::from_be_bytes([header[5], header[6], header[7], header[8]]) & U31_MASK;

        if length > self.local_max_frame_size {
            return Err(H2Error::protocol(format!(
                "frame length {} exceeds local max frame size {}",
                length, self.local_max_frame_size
            )));
        }

        let total = FRAME_HEADER_LEN + length as usize;
        if buf.len() < total {
            return Ok(None);
        }

        buf.read(FRAME_HEADER_LEN);
        let payload = buf.read(length as usize);

        let frame = Self::decode_payload(frame_type, raw_flags, stream_id, length, payload)?;
        Ok(Some(frame))
    }

    fn decode_payload(
        frame_type: FrameType,
        raw_flags: u8,
        stream_id: u32,
        length: u32,
        payload: Bytes,
    ) -> Result<Frame> {
        match frame_type {
            FrameType::Data => {
                let flags = DataFlags::from_bits_truncate(raw_flags);
                let (padding, body) = strip_padding(flags.contains(DataFlags::PADDED), payload)?;
                Ok(Frame::Data {
                    stream_id,
                    end_stream: flags.contains(DataFlags::END_STREAM),
                    padding,
                    payload: body,
                })
            }
            FrameType::Headers => {
                let flags = HeadersFlags::from_bits_truncate(raw_flags);
                let (padding, mut body) =
                    strip_padding(flags.contains(HeadersFlags::PADDED), payload)?;
                let priority = if flags.contains(HeadersFlags::PRIORITY) {
                    if body.len() < 5 {
                        return Err(H2Error::frame_size("HEADERS priority field truncated"));
                    }
                    let raw = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
                    let exclusive = raw & 0x8000_0000 != 0;
                    let dependency = raw & U31_MASK;
                    let weight = body[4] as u16 + 1;
                    body = body.slice(5..);
                    Some(Priority {
                        exclusive,
                        dependency,
                        weight,
                    })
                } else {
                    None
                };
                Ok(Frame::Headers {
                    stream_id,
                    end_stream: flags.contains(HeadersFlags::END_STREAM),
                    end_headers: flags.contains(HeadersFlags::END_HEADERS),
                    padding,
                    priority,
                    header_block: body,
                })
            }
            FrameType::Priority => {
                if length != 5 {
                    return Err(H2Error::frame_size(format!(
                        "PRIORITY frame must be exactly 5 bytes, got {}",
                        length
                    )));
                }
                let raw = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
                Ok(Frame::Priority {
                    stream_id,
                    priority: Priority {
                        exclusive: raw & 0x8000_0000 != 0,
                        dependency: raw & U31_MASK,
                        weight: payload[4] as u16 + 1,
                    },
                })
            }
            FrameType::RstStream => {
                if length != 4 {
                    return Err(H2Error::frame_size(format!(
                        "RST_STREAM frame must be exactly 4 bytes, got {}",
                        length
                    )));
                }
                let error = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
                Ok(Frame::RstStream { stream_id, error })
            }
            FrameType::Settings => {
                let flags = SettingsFlags::from_bits_truncate(raw_flags);
                if stream_id != 0 {
                    return Err(H2Error::protocol("SETTINGS with nonzero stream id"));
                }
                if flags.contains(SettingsFlags::ACK) {
                    if length != 0 {
                        return Err(H2Error::frame_size("SETTINGS ACK must be empty"));
                    }
                    return Ok(Frame::Settings {
                        ack: true,
                        params: Vec::new(),
                    });
                }
                if length % 6 != 0 {
                    return Err(H2Error::frame_size(format!(
                        "SETTINGS length {} not divisible by 6",
                        length
                    )));
                }
                let mut params = Vec::with_capacity(payload.len() / 6);
                for chunk in payload.chunks(6) {
                    let id = u16::from_be_bytes([chunk[0], chunk[1]]);
                    let value = u32::from_be_bytes([chunk[2], chunk[3], chunk[4], chunk[5]]);
                    // Unknown setting ids are silently ignored on decode (RFC 7540 §6.5.2).
                    params.push((id, value));
                }
                Ok(Frame::Settings { ack: false, params })
            }
            FrameType::PushPromise => {
                let flags = PushPromiseFlags::from_bits_truncate(raw_flags);
                let (padding, mut body) =
                    strip_padding(flags.contains(PushPromiseFlags::PADDED), payload)?;
                if body.len() < 4 {
                    return Err(H2Error::frame_size("PUSH_PROMISE missing promised id"));
                }
                let promise_stream_id =
                    u32::from_be_bytes([body[0], body[1], body[2], body[3]]) & U31_MASK;
                body = body.slice(4..);
                Ok(Frame::PushPromise {
                    stream_id,
                    promise_stream_id,
                    end_headers: flags.contains(PushPromiseFlags::END_HEADERS),
                    padding,
                    header_block: body,
                })
            }
            FrameType::Ping => {
                if length != 8 {
                    return Err(H2Error::frame_size(format!(
                        "PING frame must be exactly 8 bytes, got {}",
                        length
                    )));
                }
                let flags = PingFlags::from_bits_truncate(raw_flags);
                let mut data = [0u8; 8];
                data.copy_from_slice(&payload[..8]);
                Ok(Frame::Ping {
                    ack: flags.contains(PingFlags::ACK),
                    payload: data,
                })
            }
            FrameType::GoAway => {
                if length < 8 {
                    return Err(H2Error::frame_size("GOAWAY frame too short"));
                }
                let last_stream_id =
                    u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) & U31_MASK;
                let error = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
                let debug = payload.slice(8..);
                Ok(Frame::GoAway {
                    last_stream_id,
                    error,
                    debug,
                })
            }
            FrameType::WindowUpdate => {
                if length % 4 != 0 || length == 0 {
                    return Err(H2Error::frame_size(format!(
                        "WINDOW_UPDATE length {} not a positive multiple of 4",
                        length
                    )));
                }
                let increment =
                    u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) & U31_MASK;
                if increment == 0 {
                    return Err(H2Error::protocol("WINDOW_UPDATE increment must be nonzero"));
                }
                Ok(Frame::WindowUpdate {
                    stream_id,
                    increment,
                })
            }
            FrameType::Continuation => {
                let flags = ContinuationFlags::from_bits_truncate(raw_flags);
                Ok(Frame::Continuation {
                    stream_id,
                    end_headers: flags.contains(ContinuationFlags::END_HEADERS),
                    header_block: payload,
                })
            }
            #[cfg(feature = "rfc7838")]
            FrameType::AltSvc => {
                if payload.len() < 2 {
                    return Err(H2Error::frame_size("ALTSVC frame too short"));
                }
                let origin_len = u16::from_be_bytes([payload[0], payload[1]]) as usize;
                if payload.len() < 2 + origin_len {
                    return Err(H2Error::frame_size("ALTSVC origin length out of range"));
                }
                let origin = payload.slice(2..2 + origin_len);
                let value = payload.slice(2 + origin_len..);
                Ok(Frame::AltSvc {
                    stream_id,
                    origin,
                    value,
                })
            }
            #[cfg(not(feature = "rfc7838"))]
            FrameType::AltSvc => Ok(Frame::Unknown {
                frame_type: FrameType::AltSvc.to_u8(),
                stream_id,
                flags: raw_flags,
                payload,
            }),
            #[cfg(feature = "rfc8336")]
            FrameType::Origin => {
                let mut origins = Vec::new();
                let mut pos = 0usize;
                while pos + 2 <= payload.len() {
                    let len = u16::from_be_bytes([payload[pos], payload[pos + 1]]) as usize;
                    pos += 2;
                    if pos + len > payload.len() {
                        return Err(H2Error::frame_size("ORIGIN entry length out of range"));
                    }
                    origins.push(payload.slice(pos..pos + len));
                    pos += len;
                }
                Ok(Frame::Origin { stream_id, origins })
            }
            #[cfg(not(feature = "rfc8336"))]
            FrameType::Origin => Ok(Frame::Unknown {
                frame_type: FrameType::Origin.to_u8(),
                stream_id,
                flags: raw_flags,
                payload,
            }),
            FrameType::Unknown(t) => Ok(Frame::Unknown {
                frame_type: t,
                stream_id,
                flags: raw_flags,
                payload,
            }),
        }
    }

    /// Encode a frame, enforcing encode-time wire invariants (violations
    /// are reported as compression errors).
    pub fn encode(&self, frame: &Frame) -> Result<Vec<u8>> {
        if frame.stream_id() > U31_MASK {
            return Err(H2Error::compression("stream id exceeds 2^31-1"));
        }
        let (frame_type, flags, body) = self.encode_payload(frame)?;
        if body.len() > self.remote_max_frame_size as usize {
            return Err(H2Error::compression(format!(
                "encoded payload {} exceeds remote max frame size {}",
                body.len(),
                self.remote_max_frame_size
            )));
        }
        let mut out = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
        let len = body.len() as u32;
        out.push((len >> 16) as u8);
        out.push((len >> 8) as u8);
        out.push(len as u8);
        out.push(frame_type);
        out.push(flags);
        out.extend_from_slice(&frame.stream_id().to_be_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }

    fn encode_payload(&self, frame: &Frame) -> Result<(u8, u8, Vec<u8>)> {
        match frame {
            Frame::Data {
                end_stream,
                padding,
                payload,
                ..
            } => {
                let mut flags = DataFlags::empty();
                if *end_stream {
                    flags |= DataFlags::END_STREAM;
                }
                let mut body = Vec::new();
                if let Some(pad) = padding {
                    flags |= DataFlags::PADDED;
                    body.push(*pad);
                }
                body.extend_from_slice(payload);
                push_padding(&mut body, *padding);
                Ok((FrameType::Data.to_u8(), flags.bits(), body))
            }
            Frame::Headers {
                end_stream,
                end_headers,
                padding,
                priority,
                header_block,
                ..
            } => {
                let mut flags = HeadersFlags::empty();
                if *end_stream {
                    flags |= HeadersFlags::END_STREAM;
                }
                if *end_headers {
                    flags |= HeadersFlags::END_HEADERS;
                }
                let mut body = Vec::new();
                if let Some(pad) = padding {
                    flags |= HeadersFlags::PADDED;
                    body.push(*pad);
                }
                if let Some(p) = priority {
                    flags |= HeadersFlags::PRIORITY;
                    let mut raw = p.dependency & U31_MASK;
                    if p.exclusive {
                        raw |= 0x8000_0000;
                    }
                    body.extend_from_slice(&raw.to_be_bytes());
                    body.push((p.weight.saturating_sub(1)) as u8);
                }
                body.extend_from_slice(header_block);
                push_padding(&mut body, *padding);
                Ok((FrameType::Headers.to_u8(), flags.bits(), body))
            }
            Frame::Priority { priority, .. } => {
                let mut raw = priority.dependency & U31_MASK;
                if priority.exclusive {
                    raw |= 0x8000_0000;
                }
                let mut body = raw.to_be_bytes().to_vec();
                body.push((priority.weight.saturating_sub(1)) as u8);
                Ok((FrameType::Priority.to_u8(), 0, body))
            }
            Frame::RstStream { error, .. } => {
                Ok((FrameType::RstStream.to_u8(), 0, error.to_be_bytes().to_vec()))
            }
            Frame::Settings { ack, params } => {
                if *ack {
                    return Ok((FrameType::Settings.to_u8(), SettingsFlags::ACK.bits(), Vec::new()));
                }
                let mut body = Vec::with_capacity(params.len() * 6);
                for (id, value) in params {
                    if !(1..=6).contains(id) {
                        return Err(H2Error::compression(format!(
                            "unknown SETTINGS identifier 0x{:x}",
                            id
                        )));
                    }
                    body.extend_from_slice(&id.to_be_bytes());
                    body.extend_from_slice(&value.to_be_bytes());
                }
                Ok((FrameType::Settings.to_u8(), 0, body))
            }
            Frame::PushPromise {
                promise_stream_id,
                end_headers,
                padding,
                header_block,
                ..
            } => {
                if *promise_stream_id > U31_MASK {
                    return Err(H2Error::compression("promised stream id exceeds 2^31-1"));
                }
                let mut flags = PushPromiseFlags::empty();
                if *end_headers {
                    flags |= PushPromiseFlags::END_HEADERS;
                }
                let mut body = Vec::new();
                if let Some(pad) = padding {
                    flags |= PushPromiseFlags::PADDED;
                    body.push(*pad);
                }
                body.extend_from_slice(&promise_stream_id.to_be_bytes());
                body.extend_from_slice(header_block);
                push_padding(&mut body, *padding);
                Ok((FrameType::PushPromise.to_u8(), flags.bits(), body))
            }
            Frame::Ping { ack, payload } => {
                let flags = if *ack { PingFlags::ACK.bits() } else { 0 };
                Ok((FrameType::Ping.to_u8(), flags, payload.to_vec()))
            }
            Frame::GoAway {
                last_stream_id,
                error,
                debug,
            } => {
                if *last_stream_id > U31_MASK {
                    return Err(H2Error::compression("last stream id exceeds 2^31-1"));
                }
                let mut body = Vec::with_capacity(8 + debug.len());
                body.extend_from_slice(&last_stream_id.to_be_bytes());
                body.extend_from_slice(&error.to_be_bytes());
                body.extend_from_slice(debug);
                Ok((FrameType::GoAway.to_u8(), 0, body))
            }
            Frame::WindowUpdate { increment, .. } => {
                if *increment > U31_MASK {
                    return Err(H2Error::compression("window increment exceeds 2^31-1"));
                }
                if *increment == 0 {
                    return Err(H2Error::compression("window increment must be nonzero"));
                }
                Ok((
                    FrameType::WindowUpdate.to_u8(),
                    0,
                    increment.to_be_bytes().to_vec(),
                ))
            }
            Frame::Continuation {
                end_headers,
                header_block,
                ..
            } => {
                let flags = if *end_headers {
                    ContinuationFlags::END_HEADERS.bits()
                } else {
                    0
                };
                Ok((FrameType::Continuation.to_u8(), flags, header_block.to_vec()))
            }
            #[cfg(feature = "rfc7838")]
            Frame::AltSvc { origin, value, .. } => {
                if origin.len() > u16::MAX as usize {
                    return Err(H2Error::compression("ALTSVC origin too long"));
                }
                let mut body = Vec::with_capacity(2 + origin.len() + value.len());
                body.extend_from_slice(&(origin.len() as u16).to_be_bytes());
                body.extend_from_slice(origin);
                body.extend_from_slice(value);
                Ok((FrameType::AltSvc.to_u8(), 0, body))
            }
            #[cfg(feature = "rfc8336")]
            Frame::Origin { origins, .. } => {
                let mut body = Vec::new();
                for o in origins {
                    if o.len() > u16::MAX as usize {
                        return Err(H2Error::compression("ORIGIN entry too long"));
                    }
                    body.extend_from_slice(&(o.len() as u16).to_be_bytes());
                    body.extend_from_slice(o);
                }
                Ok((FrameType::Origin.to_u8(), 0, body))
            }
            Frame::Unknown {
                frame_type,
                flags,
                payload,
                ..
            } => Ok((*frame_type, *flags, payload.to_vec())),
        }
    }
}

fn strip_padding(padded: bool, payload: Bytes) -> Result<(Option<u8>, Bytes)> {
    if !padded {
        return Ok((None, payload));
    }
    if payload.is_empty() {
        return Err(H2Error::protocol("PADDED frame with no payload"));
    }
    let pad_length = payload[0];
    let rest = payload.slice(1..);
    if pad_length as usize > rest.len() {
        return Err(H2Error::protocol("padding length exceeds payload"));
    }
    let body = rest.slice(..rest.len() - pad_length as usize);
    Ok((Some(pad_length), body))
}

fn push_padding(body: &mut Vec<u8>, padding: Option<u8>) {
    if let Some(pad) = padding {
        body.resize(body.len() + pad as usize, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framer() -> Framer {
        Framer::new(16_384, 16_384)
    }

    #[test]
    fn data_round_trips() {
        let f = Frame::Data {
            stream_id: 1,
            end_stream: true,
            padding: None,
            payload: Bytes::from_static(b"hello"),
        };
        let encoded = framer().encode(&f).unwrap();
        let mut buf = Buffer::new();
        buf.append(&encoded);
        let parsed = framer().parse(&mut buf).unwrap().unwrap();
        assert_eq!(parsed, f);
        assert!(buf.is_empty());
    }

    #[test]
    fn data_with_padding_round_trips() {
        let f = Frame::Data {
            stream_id: 3,
            end_stream: false,
            padding: Some(4),
            payload: Bytes::from_static(b"hi"),
        };
        let encoded = framer().encode(&f).unwrap();
        // length = 1 (pad len byte) + 2 (payload) + 4 (padding) = 7
        assert_eq!(encoded[2], 7);
        let mut buf = Buffer::new();
        buf.append(&encoded);
        let parsed = framer().parse(&mut buf).unwrap().unwrap();
        assert_eq!(parsed, f);
    }

    #[test]
    fn headers_with_priority_round_trips() {
        let f = Frame::Headers {
            stream_id: 1,
            end_stream: true,
            end_headers: true,
            padding: None,
            priority: Some(Priority {
                exclusive: true,
                dependency: 5,
                weight: 42,
            }),
            header_block: Bytes::from_static(b"\x82\x84"),
        };
        let encoded = framer().encode(&f).unwrap();
        let mut buf = Buffer::new();
        buf.append(&encoded);
        let parsed = framer().parse(&mut buf).unwrap().unwrap();
        assert_eq!(parsed, f);
    }

    #[test]
    fn priority_frame_wrong_length_is_frame_size_error() {
        let mut buf = Buffer::new();
        // length=4, type=PRIORITY(2), flags=0, stream=1, 4-byte payload
        buf.append(&[0, 0, 4, 2, 0, 0, 0, 0, 1, 0, 0, 0, 0]);
        let err = framer().parse(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            H2Error::Connection(crate::error::ConnectionErrorKind::FrameSizeError(_))
        ));
    }

    #[test]
    fn rst_stream_round_trips() {
        let f = Frame::RstStream {
            stream_id: 7,
            error: 8,
        };
        let encoded = framer().encode(&f).unwrap();
        let mut buf = Buffer::new();
        buf.append(&encoded);
        assert_eq!(framer().parse(&mut buf).unwrap().unwrap(), f);
    }

    #[test]
    fn settings_nonzero_stream_is_protocol_error() {
        let mut buf = Buffer::new();
        buf.append(&[0, 0, 0, 4, 0, 0, 0, 0, 1]);
        let err = framer().parse(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            H2Error::Connection(crate::error::ConnectionErrorKind::ProtocolError(_))
        ));
    }

    #[test]
    fn settings_unknown_ids_ignored_on_decode() {
        let mut buf = Buffer::new();
        // one entry with id=0x99 (unknown)
        buf.append(&[0, 0, 6, 4, 0, 0, 0, 0, 0, 0, 0x99, 0, 0, 0, 1]);
        let frame = framer().parse(&mut buf).unwrap().unwrap();
        match frame {
            Frame::Settings { params, .. } => assert_eq!(params, vec![(0x99, 1)]),
            _ => panic!("expected settings"),
        }
    }

    #[test]
    fn settings_encode_rejects_unknown_id() {
        let f = Frame::Settings {
            ack: false,
            params: vec![(0x99, 1)],
        };
        assert!(framer().encode(&f).is_err());
    }

    #[test]
    fn ping_round_trips() {
        let f = Frame::Ping {
            ack: true,
            payload: *b"abcdefgh",
        };
        let encoded = framer().encode(&f).unwrap();
        let mut buf = Buffer::new();
        buf.append(&encoded);
        assert_eq!(framer().parse(&mut buf).unwrap().unwrap(), f);
    }

    #[test]
    fn window_update_zero_increment_is_protocol_error() {
        let mut buf = Buffer::new();
        buf.append(&[0, 0, 4, 8, 0, 0, 0, 0, 1, 0, 0, 0, 0]);
        let err = framer().parse(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            H2Error::Connection(crate::error::ConnectionErrorKind::ProtocolError(_))
        ));
    }

    #[test]
    fn window_update_indivisible_length_is_frame_size_error() {
        let mut buf = Buffer::new();
        buf.append(&[0, 0, 5, 8, 0, 0, 0, 0, 1, 0, 0, 0, 1, 0]);
        let err = framer().parse(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            H2Error::Connection(crate::error::ConnectionErrorKind::FrameSizeError(_))
        ));
    }

    #[test]
    fn partial_frame_returns_none_without_consuming() {
        let mut buf = Buffer::new();
        buf.append(&[0, 0, 5, 0, 1, 0, 0, 0, 1, b'h', b'e']);
        let before = buf.len();
        assert!(framer().parse(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), before);
    }

    #[test]
    fn encode_over_remote_max_frame_size_is_compression_error() {
        let small = Framer::new(16_384, 10);
        let f = Frame::Data {
            stream_id: 1,
            end_stream: false,
            padding: None,
            payload: Bytes::from(vec![0u8; 20]),
        };
        let err = small.encode(&f).unwrap_err();
        assert!(matches!(
            err,
            H2Error::Connection(crate::error::ConnectionErrorKind::CompressionError(_))
        ));
    }

    #[test]
    fn decode_over_local_max_frame_size_is_protocol_error() {
        let small = Framer::new(10, 16_384);
        let mut buf = Buffer::new();
        buf.append(&[0, 0, 20, 0, 0, 0, 0, 0, 1]);
        buf.append(&[0u8; 20]);
        let err = small.parse(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            H2Error::Connection(crate::error::ConnectionErrorKind::ProtocolError(_))
        ));
    }

    #[test]
    fn unknown_frame_type_is_parsed_as_unknown() {
        let mut buf = Buffer::new();
        buf.append(&[0, 0, 2, 0x63, 0, 0, 0, 0, 9, 1, 2]);
        let frame = framer().parse(&mut buf).unwrap().unwrap();
        assert!(matches!(frame, Frame::Unknown { frame_type: 0x63, .. }));
    }
}
