//! Per-stream state machine and flow-control-aware DATA bookkeeping
//! States and transitions follow RFC 7540 §5.1.

use crate::config::Settings;
use crate::error::{H2Error, Result, StreamErrorKind};
use crate::flow::FlowBuffer;
use crate::frame::{Frame, Priority};
use bytes::Bytes;

/// Why a stream ended up `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosedReason {
    LocalRst,
    RemoteRst,
    LocalClosed,
    RemoteClosed,
    HalfClosedLocal,
    HalfClosedRemote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    ReservedLocal,
    ReservedRemote,
    Open,
    HalfClosedLocal,
    HalfClosedRemote,
    /// Transient: entered on the END_STREAM-carrying frame so the
    /// caller can finish dispatching it before `:half_close` fires.
    HalfClosing,
    /// Transient: same idea, for the transition into `Closed`.
    Closing,
    Closed(ClosedReason),
}

/// Which side sent/received the frame driving a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Recv,
}

pub struct Stream {
    pub id: u32,
    pub state: StreamState,
    pending_state: Option<StreamState>,

    pub weight: u16,
    pub dependency: u32,
    pub exclusive: bool,

    pub local_window: i64,
    pub local_window_max: u32,
    pub outbound: FlowBuffer,

    pub content_length_remaining: Option<i64>,
    pub expected_trailers: Option<Vec<Bytes>>,
    pub seen_final_status: bool,
    pub waiting_on_trailers: bool,
}

impl Stream {
    pub fn new(id: u32, local_settings: &Settings, remote_settings: &Settings) -> Self {
        Self {
            id,
            state: StreamState::Idle,
            pending_state: None,
            weight: 16,
            dependency: 0,
            exclusive: false,
            local_window: local_settings.initial_window_size as i64,
            local_window_max: local_settings.initial_window_size,
            outbound: FlowBuffer::new(remote_settings.initial_window_size),
            content_length_remaining: None,
            expected_trailers: None,
            seen_final_status: false,
            waiting_on_trailers: false,
        }
    }

    /// True when this stream counts toward `active_stream_count`
    /// (excludes idle/reserved/closed).
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            StreamState::Open
                | StreamState::HalfClosedLocal
                | StreamState::HalfClosedRemote
                | StreamState::HalfClosing
                | StreamState::Closing
        )
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, StreamState::Closed(_))
    }

    fn enter_half_closing(&mut self, target: StreamState) {
        self.pending_state = Some(target);
        self.state = StreamState::HalfClosing;
    }

    fn enter_closing(&mut self, target: StreamState) {
        self.pending_state = Some(target);
        self.state = StreamState::Closing;
    }

    /// Call once the triggering frame has been fully dispatched to the
    /// application. Returns `Some(true)` for a half-close settle,
    /// `Some(false)` for a full close settle, `None` if nothing pending.
    pub fn settle(&mut self) -> Option<bool> {
        match self.state {
            StreamState::HalfClosing => {
                self.state = self.pending_state.take().unwrap_or(StreamState::Open);
                Some(true)
            }
            StreamState::Closing => {
                self.state = self
                    .pending_state
                    .take()
                    .unwrap_or(StreamState::Closed(ClosedReason::LocalClosed));
                Some(false)
            }
            _ => None,
        }
    }

    fn invalid_transition(&self) -> H2Error {
        H2Error::stream(self.id, StreamErrorKind::StreamClosed)
    }

    pub fn send_headers(&mut self, end_stream: bool) -> Result<()> {
        match (self.state, end_stream) {
            (StreamState::Idle, false) => self.state = StreamState::Open,
            (StreamState::Idle, true) => self.enter_half_closing(StreamState::HalfClosedLocal),
            (StreamState::ReservedLocal, _) => {
                self.enter_half_closing(StreamState::HalfClosedRemote)
            }
            (StreamState::Open, false) => {}
            (StreamState::Open, true) => self.enter_half_closing(StreamState::HalfClosedLocal),
            (StreamState::HalfClosedRemote, true) => {
                self.enter_closing(StreamState::Closed(ClosedReason::LocalClosed))
            }
            _ => return Err(self.invalid_transition()),
        }
        Ok(())
    }

    pub fn recv_headers(&mut self, end_stream: bool) -> Result<()> {
        match (self.state, end_stream) {
            (StreamState::Idle, false) => self.state = StreamState::Open,
            (StreamState::Idle, true) => self.enter_half_closing(StreamState::HalfClosedRemote),
            (StreamState::ReservedRemote, _) => {
                self.enter_half_closing(StreamState::HalfClosedLocal)
            }
            (StreamState::Open, false) => {}
            (StreamState::Open, true) => self.enter_half_closing(StreamState::HalfClosedRemote),
            (StreamState::HalfClosedLocal, true) => {
                self.enter_closing(StreamState::Closed(ClosedReason::RemoteClosed))
            }
            _ => return Err(self.invalid_transition()),
        }
        Ok(())
    }

    pub fn send_push_promise(&mut self) -> Result<()> {
        match self.state {
            StreamState::Idle => {
                self.state = StreamState::ReservedLocal;
                Ok(())
            }
            _ => Err(self.invalid_transition()),
        }
    }

    pub fn recv_push_promise(&mut self) -> Result<()> {
        match self.state {
            StreamState::Idle => {
                self.state = StreamState::ReservedRemote;
                Ok(())
            }
            _ => Err(self.invalid_transition()),
        }
    }

    pub fn recv_priority(&mut self, p: Priority) {
        self.weight = p.weight;
        self.dependency = p.dependency;
        self.exclusive = p.exclusive;
    }

    pub fn send_rst_stream(&mut self) {
        self.state = StreamState::Closed(ClosedReason::LocalRst);
    }

    pub fn recv_rst_stream(&mut self) {
        self.state = StreamState::Closed(ClosedReason::RemoteRst);
    }

    /// Decrement `content_length_remaining` and the local flow window
    /// as DATA arrives. Returns the WINDOW_UPDATE increment
    /// needed to restore the local window, if any.
    pub fn recv_data(&mut self, payload_len: usize, padding: usize, end_stream: bool) -> Result<Option<u32>> {
        if matches!(
            self.state,
            StreamState::HalfClosedRemote | StreamState::Closed(_)
        ) {
            return Err(H2Error::stream(self.id, StreamErrorKind::StreamClosed));
        }

        if let Some(remaining) = self.content_length_remaining.as_mut() {
            *remaining -= payload_len as i64;
            if *remaining < 0 {
                return Err(H2Error::protocol("content-length exceeded by DATA payload"));
            }
        }

        self.local_window -= (payload_len + padding) as i64;

        if end_stream {
            if let Some(remaining) = self.content_length_remaining {
                if remaining != 0 {
                    return Err(H2Error::protocol("content-length mismatch at end of stream"));
                }
            }
            self.recv_headers_or_data_end_stream()?;
        }

        if self.local_window <= (self.local_window_max / 2) as i64 {
            let increment = self.local_window_max as i64 - self.local_window;
            self.local_window = self.local_window_max as i64;
            return Ok(Some(increment as u32));
        }
        Ok(None)
    }

    fn recv_headers_or_data_end_stream(&mut self) -> Result<()> {
        match self.state {
            StreamState::Open => {
                self.enter_half_closing(StreamState::HalfClosedRemote);
                Ok(())
            }
            StreamState::HalfClosedLocal => {
                self.enter_closing(StreamState::Closed(ClosedReason::RemoteClosed));
                Ok(())
            }
            _ => Err(self.invalid_transition()),
        }
    }

    /// Pre-chunk an outbound DATA payload by `remote_max_frame_size`
    /// and hand each chunk to the flow buffer.
    pub fn send_data(&mut self, payload: Bytes, end_stream: bool, remote_max_frame_size: u32) -> Vec<Frame> {
        let max = remote_max_frame_size as usize;
        if payload.len() <= max {
            return self.outbound.send_data(self.id, payload, end_stream);
        }
        let mut out = Vec::new();
        let mut rest = payload;
        while rest.len() > max {
            let chunk = rest.slice(0..max);
            rest = rest.slice(max..);
            out.extend(self.outbound.send_data(self.id, chunk, false));
        }
        out.extend(self.outbound.send_data(self.id, rest, end_stream));
        out
    }
}
