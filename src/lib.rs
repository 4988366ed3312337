//! h2-sans-io: a sans-I/O HTTP/2 protocol engine.
//!
//! This crate implements RFC 7540 framing, RFC 7541 HPACK, stream
//! state, and flow control as a pure state machine: it consumes and
//! produces byte buffers only, with no socket, TLS, or async runtime
//! dependency. The caller owns I/O and drives the engine through
//! [`Connection::receive`] and the `send_*` methods, observing results
//! via [`Connection::subscribe`].
//!
//! # Quick Start
//!
//! ```rust
//! use h2_engine::{Config, Connection, Header, Signal};
//!
//! let mut client = Connection::client(Config::default()).unwrap();
//! client.subscribe(Signal::Frame, Box::new(|_event| {
//!     // hand `bytes` off to the transport
//! }));
//!
//! let stream_id = client.open_stream();
//! client.send_headers(
//!     stream_id,
//!     vec![
//!         Header::new(&b":method"[..], &b"GET"[..]),
//!         Header::new(&b":scheme"[..], &b"https"[..]),
//!         Header::new(&b":authority"[..], &b"example.com"[..]),
//!         Header::new(&b":path"[..], &b"/"[..]),
//!     ],
//!     true,
//!     true,
//! ).unwrap();
//! ```
//!
//! # Architecture
//!
//! This crate is intentionally layered, bottom to top:
//! - [`frame`]: binary codec for every HTTP/2 frame type
//! - [`hpack`]: RFC 7541 header compression
//! - [`flow`]: per-endpoint flow-control buffering
//! - [`stream`]: the per-stream state machine
//! - [`connection`]: the top-level controller tying it together
//!
//! It does NOT provide TCP/TLS transport or a connection pool — the
//! caller supplies bytes and drives wall-clock timers.

pub mod buffer;
pub mod config;
pub mod connection;
pub mod emitter;
pub mod error;
pub mod flow;
pub mod frame;
pub mod hpack;
pub mod stream;

pub use config::{settings_id, Config, Settings};
pub use connection::{Connection, ConnectionState, Role};
pub use emitter::{Event, Signal};
pub use error::{error_code, ConnectionErrorKind, H2Error, Result, StreamErrorKind};
pub use frame::{Frame, FrameType, Framer, Priority, CONNECTION_PREFACE};
pub use hpack::{Header, HuffmanPolicy, IndexPolicy};
pub use stream::{ClosedReason, Stream, StreamState};
