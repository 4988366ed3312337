//! Typed errors for the engine.
//!
//! Two error classes exist: stream-local (recoverable — results in an
//! RST_STREAM, the connection stays usable) and connection-level
//! (fatal — results in a GOAWAY and a transition to `Closed`).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, H2Error>;

/// RFC 7540 §7 error codes, as carried on the wire in RST_STREAM/GOAWAY.
pub mod error_code {
    pub const NO_ERROR: u32 = 0x0;
    pub const PROTOCOL_ERROR: u32 = 0x1;
    pub const INTERNAL_ERROR: u32 = 0x2;
    pub const FLOW_CONTROL_ERROR: u32 = 0x3;
    pub const SETTINGS_TIMEOUT: u32 = 0x4;
    pub const STREAM_CLOSED: u32 = 0x5;
    pub const FRAME_SIZE_ERROR: u32 = 0x6;
    pub const REFUSED_STREAM: u32 = 0x7;
    pub const CANCEL: u32 = 0x8;
    pub const COMPRESSION_ERROR: u32 = 0x9;
    pub const CONNECT_ERROR: u32 = 0xa;
    pub const ENHANCE_YOUR_CALM: u32 = 0xb;
    pub const INADEQUATE_SECURITY: u32 = 0xc;
    pub const HTTP_1_1_REQUIRED: u32 = 0xd;
}

/// Recoverable, stream-local error kinds.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamErrorKind {
    #[error("stream closed")]
    StreamClosed,
    #[error("refused stream")]
    RefusedStream,
    #[error("cancel")]
    Cancel,
    #[error("stream limit exceeded")]
    StreamLimitExceeded,
}

impl StreamErrorKind {
    pub fn code(self) -> u32 {
        match self {
            StreamErrorKind::StreamClosed => error_code::STREAM_CLOSED,
            StreamErrorKind::RefusedStream => error_code::REFUSED_STREAM,
            StreamErrorKind::Cancel => error_code::CANCEL,
            StreamErrorKind::StreamLimitExceeded => error_code::ENHANCE_YOUR_CALM,
        }
    }
}

/// Fatal, connection-level error kinds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    #[error("protocol error: {0}")]
    ProtocolError(String),
    #[error("flow control error: {0}")]
    FlowControlError(String),
    #[error("compression error: {0}")]
    CompressionError(String),
    #[error("frame size error: {0}")]
    FrameSizeError(String),
    #[error("internal error: {0}")]
    InternalError(String),
    #[error("handshake error: {0}")]
    HandshakeError(String),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("enhance your calm: {0}")]
    EnhanceYourCalm(String),
}

impl ConnectionErrorKind {
    pub fn code(&self) -> u32 {
        match self {
            ConnectionErrorKind::ProtocolError(_) => error_code::PROTOCOL_ERROR,
            ConnectionErrorKind::FlowControlError(_) => error_code::FLOW_CONTROL_ERROR,
            ConnectionErrorKind::CompressionError(_) => error_code::COMPRESSION_ERROR,
            ConnectionErrorKind::FrameSizeError(_) => error_code::FRAME_SIZE_ERROR,
            ConnectionErrorKind::InternalError(_) => error_code::INTERNAL_ERROR,
            ConnectionErrorKind::HandshakeError(_) => error_code::PROTOCOL_ERROR,
            ConnectionErrorKind::ConnectionClosed => error_code::NO_ERROR,
            ConnectionErrorKind::EnhanceYourCalm(_) => error_code::ENHANCE_YOUR_CALM,
        }
    }

    pub fn debug_data(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum H2Error {
    #[error("stream {stream_id}: {kind}")]
    Stream {
        stream_id: u32,
        kind: StreamErrorKind,
    },
    #[error(transparent)]
    Connection(#[from] ConnectionErrorKind),
}

impl H2Error {
    pub fn protocol(msg: impl Into<String>) -> Self {
        ConnectionErrorKind::ProtocolError(msg.into()).into()
    }

    pub fn compression(msg: impl Into<String>) -> Self {
        ConnectionErrorKind::CompressionError(msg.into()).into()
    }

    pub fn frame_size(msg: impl Into<String>) -> Self {
        ConnectionErrorKind::FrameSizeError(msg.into()).into()
    }

    pub fn flow_control(msg: impl Into<String>) -> Self {
        ConnectionErrorKind::FlowControlError(msg.into()).into()
    }

    pub fn handshake(msg: impl Into<String>) -> Self {
        ConnectionErrorKind::HandshakeError(msg.into()).into()
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ConnectionErrorKind::InternalError(msg.into()).into()
    }

    pub fn stream(stream_id: u32, kind: StreamErrorKind) -> Self {
        H2Error::Stream { stream_id, kind }
    }

    /// True if this is a connection-fatal error (GOAWAY + close) rather
    /// than a stream-local one (RST_STREAM only).
    pub fn is_fatal(&self) -> bool {
        matches!(self, H2Error::Connection(_))
    }
}
