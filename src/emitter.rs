//! Event subscription plumbing: an event emitter backed by a typed
//! callback registry. A map from a closed enum of signal kinds to a
//! list of callbacks, invoked synchronously during frame dispatch —
//! no dynamic reflection, no per-signal trait objects.

use crate::hpack::Header;
use bytes::Bytes;
use std::collections::HashMap;

/// The fixed vocabulary of signals a caller may subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Frame,
    FrameSent,
    FrameReceived,
    Stream,
    Promise,
    Reserved,
    Active,
    Headers,
    Data,
    PromiseHeaders,
    HalfClose,
    Close,
    GoAway,
    Ack,
    SettingsAck,
    AltSvc,
    Origin,
}

/// The payload carried alongside a signal.
#[derive(Debug, Clone)]
pub enum Event {
    Frame { bytes: Bytes },
    FrameSent { stream_id: u32 },
    FrameReceived { stream_id: u32 },
    Stream { stream_id: u32 },
    Promise { stream_id: u32, promised_stream_id: u32 },
    Reserved { stream_id: u32 },
    Active { stream_id: u32 },
    Headers {
        stream_id: u32,
        headers: Vec<Header>,
        end_stream: bool,
    },
    Data {
        stream_id: u32,
        payload: Bytes,
        end_stream: bool,
    },
    PromiseHeaders {
        stream_id: u32,
        headers: Vec<Header>,
    },
    HalfClose { stream_id: u32 },
    Close { stream_id: u32, error: Option<u32> },
    GoAway {
        last_stream_id: u32,
        error: u32,
        debug: Bytes,
    },
    Ack { payload: [u8; 8] },
    SettingsAck,
    AltSvc {
        stream_id: u32,
        origin: Bytes,
        value: Bytes,
    },
    Origin { origins: Vec<Bytes> },
}

type Handler = Box<dyn FnMut(&Event)>;

/// Registry of signal subscribers, invoked synchronously as the
/// connection dispatches frames.
#[derive(Default)]
pub struct Emitter {
    handlers: HashMap<Signal, Vec<Handler>>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, signal: Signal, handler: Handler) {
        self.handlers.entry(signal).or_default().push(handler);
    }

    pub fn emit(&mut self, signal: Signal, event: &Event) {
        if let Some(handlers) = self.handlers.get_mut(&signal) {
            for handler in handlers.iter_mut() {
                handler(event);
            }
        }
    }
}
