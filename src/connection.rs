//! The connection controller: handshake, demultiplexing,
//! CONTINUATION reassembly, SETTINGS lifecycle, GOAWAY, PING, and the
//! boundary API the transport/application drive the engine through.

use crate::buffer::Buffer;
use crate::config::{settings_id, Config, Settings};
use crate::emitter::{Emitter, Event, Signal};
use crate::error::{error_code, H2Error, Result};
use crate::frame::{Frame, Framer, Priority, CONNECTION_PREFACE};
use crate::hpack::{Compressor, Decompressor, EncodingContext, Header, Options as HpackOptions, ParseFrameContext};
use crate::stream::{ClosedReason, Stream, StreamState};
use bytes::Bytes;
use log::{debug, error, trace, warn};
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    WaitingMagic,
    WaitingConnectionPreface,
    Connected,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContinuationKind {
    Headers { priority: Option<Priority> },
    PushPromise { promised_stream_id: u32 },
}

struct ContinuationState {
    stream_id: u32,
    kind: ContinuationKind,
    end_stream: bool,
    buffer: Vec<u8>,
}

pub struct Connection {
    role: Role,
    pub state: ConnectionState,
    config: Config,

    framer: Framer,
    encoder_ctx: EncodingContext,
    decoder_ctx: EncodingContext,

    local_settings: Settings,
    remote_settings: Settings,
    pending_settings: VecDeque<Vec<(u16, u32)>>,

    recv_buf: Buffer,
    streams: HashMap<u32, Stream>,
    highest_received_stream_id: u32,
    next_local_stream_id: u32,
    closed_streams: VecDeque<(u32, u64)>,

    continuation: Option<ContinuationState>,
    awaiting_peer_first_frame: bool,
    h2c_upgraded: bool,

    connection_local_window: i64,
    connection_local_window_max: u32,
    connection_remote_window: i64,

    pending_pings: VecDeque<[u8; 8]>,
    emitter: Emitter,
    epoch: Instant,
    close_time: Option<std::time::Duration>,
}

impl Connection {
    fn new_common(role: Role, config: Config) -> Self {
        let local_settings = config.settings;
        let remote_settings = Settings::default();
        let hpack_options = HpackOptions {
            table_size: local_settings.header_table_size as usize,
            ..HpackOptions::default()
        };
        Self {
            role,
            state: ConnectionState::New,
            framer: Framer::new(local_settings.max_frame_size, remote_settings.max_frame_size),
            encoder_ctx: EncodingContext::new(HpackOptions {
                table_size: remote_settings.header_table_size as usize,
                ..hpack_options
            }),
            decoder_ctx: EncodingContext::new(hpack_options),
            local_settings,
            remote_settings,
            pending_settings: VecDeque::new(),
            recv_buf: Buffer::new(),
            streams: HashMap::new(),
            highest_received_stream_id: 0,
            next_local_stream_id: if role == Role::Client { 1 } else { 2 },
            closed_streams: VecDeque::new(),
            continuation: None,
            awaiting_peer_first_frame: true,
            h2c_upgraded: false,
            connection_local_window: local_settings.initial_window_size as i64,
            connection_local_window_max: local_settings.initial_window_size,
            connection_remote_window: remote_settings.initial_window_size as i64,
            pending_pings: VecDeque::new(),
            emitter: Emitter::new(),
            epoch: Instant::now(),
            close_time: None,
            config,
        }
    }

    /// Client role: sends the magic preface and initial SETTINGS at
    /// construction (RFC 7540 §3.5).
    pub fn client(config: Config) -> Result<Self> {
        let mut conn = Self::new_common(Role::Client, config);
        conn.state = ConnectionState::WaitingConnectionPreface;
        conn.send_client_preface()?;
        conn.state = ConnectionState::Connected;
        trace!("client connection constructed, preface and initial SETTINGS sent");
        Ok(conn)
    }

    /// Server role: waits for the 24-byte magic before parsing frames.
    pub fn server(config: Config) -> Self {
        trace!("server connection constructed, awaiting client preface");
        Self::new_common(Role::Server, config)
    }

    /// h2c upgrade entry point (RFC 7540 §3.2): marks the client upgraded,
    /// sends the preface, and allocates stream 1 directly in
    /// `half_closed_local` for the request that triggered the upgrade.
    pub fn client_upgrade_h2c(config: Config) -> Result<Self> {
        let mut conn = Self::client(config)?;
        conn.h2c_upgraded = true;
        let mut stream = Stream::new(1, &conn.local_settings, &conn.remote_settings);
        stream.state = StreamState::HalfClosedLocal;
        conn.streams.insert(1, stream);
        conn.next_local_stream_id = 3;
        Ok(conn)
    }

    fn send_client_preface(&mut self) -> Result<()> {
        self.emitter.emit(
            Signal::Frame,
            &Event::Frame {
                bytes: Bytes::from_static(CONNECTION_PREFACE),
            },
        );
        let params = self.local_settings.diff_from_default();
        self.pending_settings.push_back(params.clone());
        self.emit_frame(Frame::Settings {
            ack: false,
            params,
        })
    }

    /// Open a new locally-initiated stream id (odd for clients, even
    /// for server pushes) for use with [`Connection::send_headers`].
    pub fn open_stream(&mut self) -> u32 {
        let id = self.next_local_stream_id;
        self.next_local_stream_id += 2;
        id
    }

    pub fn subscribe(&mut self, signal: Signal, handler: Box<dyn FnMut(&Event)>) {
        self.emitter.subscribe(signal, handler);
    }

    // ---- inbound -----------------------------------------------------

    pub fn receive(&mut self, bytes: &[u8]) -> Result<()> {
        self.recv_buf.append(bytes);

        if self.role == Role::Server {
            match self.state {
                ConnectionState::New => {
                    self.state = ConnectionState::WaitingMagic;
                    self.try_match_preface()?;
                }
                ConnectionState::WaitingMagic => self.try_match_preface()?,
                _ => {}
            }
            if self.state == ConnectionState::WaitingMagic {
                return Ok(());
            }
        }

        self.parse_loop()
    }

    fn try_match_preface(&mut self) -> Result<()> {
        let prefix_len = CONNECTION_PREFACE.len();
        if self.recv_buf.len() < prefix_len {
            let have = self.recv_buf.as_slice();
            if !CONNECTION_PREFACE.starts_with(have) {
                return Err(H2Error::handshake("connection preface mismatch"));
            }
            return Ok(());
        }
        let head = self.recv_buf.byteslice(0, prefix_len);
        if head != CONNECTION_PREFACE {
            return Err(H2Error::handshake("connection preface mismatch"));
        }
        self.recv_buf.read(prefix_len);
        self.state = ConnectionState::WaitingConnectionPreface;
        Ok(())
    }

    fn parse_loop(&mut self) -> Result<()> {
        loop {
            let frame = match self.framer.parse(&mut self.recv_buf) {
                Ok(Some(f)) => f,
                Ok(None) => return Ok(()),
                Err(e) => return self.fail_connection(e),
            };
            if let Err(e) = self.route_frame(frame) {
                return self.fail_connection(e);
            }
        }
    }

    fn route_frame(&mut self, frame: Frame) -> Result<()> {
        trace!("recv {} on stream {}", frame_kind_name(&frame), frame.stream_id());
        if self.state == ConnectionState::Closed {
            return self.route_frame_while_closed(frame);
        }

        if self.awaiting_peer_first_frame {
            if !matches!(frame, Frame::Settings { ack: false, .. }) {
                return Err(H2Error::protocol("first frame from peer was not SETTINGS"));
            }
        }

        if let Some(cont) = &self.continuation {
            let same_stream = cont.stream_id;
            match &frame {
                Frame::Continuation { stream_id, .. } if *stream_id == same_stream => {
                    self.handle_continuation(frame)?;
                }
                _ => {
                    return Err(H2Error::protocol(
                        "expected CONTINUATION to complete the pending header block",
                    ))
                }
            }
            return Ok(());
        }

        let is_connection_frame = frame.stream_id() == 0
            || matches!(frame, Frame::Settings { .. } | Frame::Ping { .. } | Frame::GoAway { .. });

        if is_connection_frame {
            self.handle_connection_frame(frame)?;
        } else {
            self.handle_stream_frame(frame)?;
        }

        self.awaiting_peer_first_frame = false;
        if self.state == ConnectionState::WaitingConnectionPreface {
            self.state = ConnectionState::Connected;
        }
        Ok(())
    }

    fn route_frame_while_closed(&mut self, frame: Frame) -> Result<()> {
        match frame {
            Frame::GoAway { .. } => Err(H2Error::protocol("GOAWAY received after close")),
            Frame::Ping { ack: false, payload } => self.emit_frame(Frame::Ping { ack: true, payload }),
            _ => {
                let elapsed_ms = self.close_time.map(|d| d.as_millis() as u64).unwrap_or(0);
                let now_ms = self.epoch.elapsed().as_millis() as u64;
                if now_ms.saturating_sub(elapsed_ms) > self.config.closed_stream_retention_ms {
                    Err(H2Error::protocol("frame received 15s after connection close"))
                } else {
                    Ok(())
                }
            }
        }
    }

    fn handle_continuation(&mut self, frame: Frame) -> Result<()> {
        let Frame::Continuation {
            end_headers,
            header_block,
            ..
        } = frame
        else {
            unreachable!("checked by caller")
        };

        let cont = self.continuation.as_mut().expect("continuation state present");
        cont.buffer.extend_from_slice(&header_block);
        if cont.buffer.len() > self.config.max_header_block_size {
            warn!(
                "CONTINUATION flood: header block reached {} bytes on stream {}",
                cont.buffer.len(),
                cont.stream_id
            );
            return Err(H2Error::protocol("CONTINUATION flood: header block too large"));
        }

        if end_headers {
            let cont = self.continuation.take().unwrap();
            self.dispatch_header_block(cont.kind, cont.stream_id, cont.end_stream, Bytes::from(cont.buffer))?;
        }
        Ok(())
    }

    fn handle_connection_frame(&mut self, frame: Frame) -> Result<()> {
        match frame {
            Frame::Settings { ack, params } => self.handle_settings(ack, params),
            Frame::Ping { ack, payload } => self.handle_ping(ack, payload),
            Frame::GoAway {
                last_stream_id,
                error,
                debug,
            } => self.handle_goaway(last_stream_id, error, debug),
            Frame::WindowUpdate { stream_id: 0, increment } => self.handle_connection_window_update(increment),
            Frame::Unknown { .. } => Ok(()),
            #[cfg(feature = "rfc7838")]
            Frame::AltSvc { stream_id, origin, value } => {
                self.emitter
                    .emit(Signal::AltSvc, &Event::AltSvc { stream_id, origin, value });
                Ok(())
            }
            #[cfg(feature = "rfc8336")]
            Frame::Origin { origins, .. } => {
                self.emitter.emit(Signal::Origin, &Event::Origin { origins });
                Ok(())
            }
            other => Err(H2Error::protocol(format!(
                "unexpected connection-level frame {:?}",
                other
            ))),
        }
    }

    fn handle_settings(&mut self, ack: bool, params: Vec<(u16, u32)>) -> Result<()> {
        if ack {
            trace!("SETTINGS ack received");
            if let Some(batch) = self.pending_settings.pop_front() {
                for (id, value) in batch {
                    if id == settings_id::INITIAL_WINDOW_SIZE {
                        let delta = value as i64 - self.local_settings.initial_window_size as i64;
                        for stream in self.streams.values_mut() {
                            stream.local_window += delta;
                            stream.local_window_max = value;
                        }
                    }
                    self.local_settings.apply(id, value);
                }
            }
            self.emitter.emit(Signal::SettingsAck, &Event::SettingsAck);
            return Ok(());
        }

        for &(id, value) in &params {
            match id {
                settings_id::ENABLE_PUSH if value > 1 => {
                    return Err(H2Error::protocol("SETTINGS_ENABLE_PUSH must be 0 or 1"))
                }
                settings_id::INITIAL_WINDOW_SIZE if value as i64 > ((1u32 << 31) - 1) as i64 => {
                    return Err(H2Error::flow_control("SETTINGS_INITIAL_WINDOW_SIZE too large"))
                }
                settings_id::MAX_FRAME_SIZE if !(16_384..=16_777_215).contains(&value) => {
                    return Err(H2Error::protocol("SETTINGS_MAX_FRAME_SIZE out of range"))
                }
                _ => {}
            }
        }

        debug!("peer SETTINGS: {:?}", params);
        let old_initial_window = self.remote_settings.initial_window_size;
        for &(id, value) in &params {
            self.remote_settings.apply(id, value);
        }
        self.framer.remote_max_frame_size = self.remote_settings.max_frame_size;

        if let Some(&(_, new_value)) = params
            .iter()
            .find(|(id, _)| *id == settings_id::INITIAL_WINDOW_SIZE)
        {
            let delta = new_value as i64 - old_initial_window as i64;
            let ids: Vec<u32> = self.streams.keys().copied().collect();
            for id in ids {
                if let Some(stream) = self.streams.get_mut(&id) {
                    stream.outbound.adjust_window(delta);
                }
                self.flush_stream(id)?;
            }
        }

        self.emit_frame(Frame::Settings {
            ack: true,
            params: Vec::new(),
        })
    }

    fn handle_ping(&mut self, ack: bool, payload: [u8; 8]) -> Result<()> {
        if ack {
            if let Some(pos) = self.pending_pings.iter().position(|p| p == &payload) {
                self.pending_pings.remove(pos);
            }
            self.emitter.emit(Signal::Ack, &Event::Ack { payload });
            Ok(())
        } else {
            self.emit_frame(Frame::Ping { ack: true, payload })
        }
    }

    fn handle_goaway(&mut self, last_stream_id: u32, error: u32, debug: Bytes) -> Result<()> {
        debug!(
            "GOAWAY received: last_stream_id={} error={}",
            last_stream_id, error
        );
        self.emitter.emit(
            Signal::GoAway,
            &Event::GoAway {
                last_stream_id,
                error,
                debug,
            },
        );
        Ok(())
    }

    fn handle_connection_window_update(&mut self, increment: u32) -> Result<()> {
        if increment == 0 {
            return Err(H2Error::protocol("WINDOW_UPDATE increment must be nonzero"));
        }
        let new_window = self.connection_remote_window + increment as i64;
        if new_window > ((1u32 << 31) - 1) as i64 {
            return Err(H2Error::flow_control("connection flow control window overflow"));
        }
        self.connection_remote_window = new_window;
        let ids: Vec<u32> = self.streams.keys().copied().collect();
        for id in ids {
            self.flush_stream(id)?;
        }
        Ok(())
    }

    fn handle_stream_frame(&mut self, frame: Frame) -> Result<()> {
        let stream_id = frame.stream_id();
        match frame {
            Frame::Headers {
                stream_id,
                end_stream,
                end_headers,
                priority,
                header_block,
                ..
            } => {
                if end_headers {
                    self.dispatch_header_block(
                        ContinuationKind::Headers { priority },
                        stream_id,
                        end_stream,
                        header_block,
                    )
                } else {
                    self.continuation = Some(ContinuationState {
                        stream_id,
                        kind: ContinuationKind::Headers { priority },
                        end_stream,
                        buffer: header_block.to_vec(),
                    });
                    Ok(())
                }
            }
            Frame::PushPromise {
                stream_id,
                promise_stream_id,
                end_headers,
                header_block,
                ..
            } => {
                if end_headers {
                    self.dispatch_header_block(
                        ContinuationKind::PushPromise { promised_stream_id: promise_stream_id },
                        stream_id,
                        false,
                        header_block,
                    )
                } else {
                    self.continuation = Some(ContinuationState {
                        stream_id,
                        kind: ContinuationKind::PushPromise { promised_stream_id: promise_stream_id },
                        end_stream: false,
                        buffer: header_block.to_vec(),
                    });
                    Ok(())
                }
            }
            Frame::Data {
                stream_id,
                end_stream,
                padding,
                payload,
            } => self.handle_data(stream_id, end_stream, padding, payload),
            Frame::Priority { stream_id, priority } => {
                if let Some(stream) = self.streams.get_mut(&stream_id) {
                    stream.recv_priority(priority);
                }
                Ok(())
            }
            Frame::RstStream { stream_id, error } => self.handle_rst_stream(stream_id, error),
            Frame::WindowUpdate { stream_id, increment } => {
                match self.streams.get_mut(&stream_id) {
                    Some(stream) => {
                        let frames = stream.outbound.process_window_update(increment)?;
                        self.gate_and_emit(stream_id, frames)
                    }
                    None => self.ignore_if_recently_closed(stream_id),
                }
            }
            Frame::Continuation { .. } => Err(H2Error::protocol("unexpected CONTINUATION")),
            Frame::Unknown { .. } => Ok(()),
            #[cfg(feature = "rfc7838")]
            Frame::AltSvc { stream_id, origin, value } => {
                self.emitter
                    .emit(Signal::AltSvc, &Event::AltSvc { stream_id, origin, value });
                Ok(())
            }
            #[cfg(feature = "rfc8336")]
            Frame::Origin { .. } => Ok(()),
            _ => Err(H2Error::internal(format!(
                "frame of stream {} reached stream dispatch unexpectedly",
                stream_id
            ))),
        }
    }

    fn ignore_if_recently_closed(&self, stream_id: u32) -> Result<()> {
        if self.closed_streams.iter().any(|(id, _)| *id == stream_id) {
            Ok(())
        } else {
            Err(H2Error::protocol(format!("frame for unknown stream {}", stream_id)))
        }
    }

    fn handle_rst_stream(&mut self, stream_id: u32, error: u32) -> Result<()> {
        match self.streams.get_mut(&stream_id) {
            Some(stream) => {
                if stream.is_closed() {
                    return Ok(());
                }
                warn!("stream {} reset by peer: error={}", stream_id, error);
                stream.recv_rst_stream();
                self.emitter.emit(
                    Signal::Close,
                    &Event::Close {
                        stream_id,
                        error: Some(error),
                    },
                );
                self.mark_closed(stream_id);
                Ok(())
            }
            None => self.ignore_if_recently_closed(stream_id),
        }
    }

    fn handle_data(&mut self, stream_id: u32, end_stream: bool, padding: Option<u8>, payload: Bytes) -> Result<()> {
        let pad = padding.unwrap_or(0) as usize;
        let stream = self
            .streams
            .get_mut(&stream_id)
            .ok_or_else(|| H2Error::protocol(format!("DATA for unknown stream {}", stream_id)))?;
        let increment = stream.recv_data(payload.len(), pad, end_stream)?;

        self.connection_local_window -= (payload.len() + pad) as i64;
        let conn_increment = if self.connection_local_window <= (self.connection_local_window_max / 2) as i64 {
            let inc = self.connection_local_window_max as i64 - self.connection_local_window;
            self.connection_local_window = self.connection_local_window_max as i64;
            Some(inc as u32)
        } else {
            None
        };

        self.emitter.emit(
            Signal::Data,
            &Event::Data {
                stream_id,
                payload,
                end_stream,
            },
        );

        if let Some(inc) = increment {
            self.emit_frame(Frame::WindowUpdate { stream_id, increment: inc })?;
        }
        if let Some(inc) = conn_increment {
            self.emit_frame(Frame::WindowUpdate {
                stream_id: 0,
                increment: inc,
            })?;
        }
        self.settle_stream(stream_id)
    }

    fn dispatch_header_block(
        &mut self,
        kind: ContinuationKind,
        stream_id: u32,
        end_stream: bool,
        block: Bytes,
    ) -> Result<()> {
        match kind {
            ContinuationKind::Headers { priority } => self.dispatch_headers(stream_id, end_stream, priority, block),
            ContinuationKind::PushPromise { promised_stream_id } => {
                self.dispatch_push_promise(stream_id, promised_stream_id, block)
            }
        }
    }

    fn dispatch_headers(
        &mut self,
        stream_id: u32,
        end_stream: bool,
        priority: Option<Priority>,
        block: Bytes,
    ) -> Result<()> {
        let mut fc = ParseFrameContext::default();
        let headers = Decompressor::decompress(&block, &mut self.decoder_ctx, Some(&mut fc))?;

        let is_new = !self.streams.contains_key(&stream_id);
        if is_new {
            if self.role == Role::Server {
                self.validate_peer_initiated_id(stream_id, true)?;
            } else {
                return Err(H2Error::protocol("unsolicited new stream from server"));
            }
            self.streams.insert(
                stream_id,
                Stream::new(stream_id, &self.local_settings, &self.remote_settings),
            );
            self.emitter.emit(Signal::Stream, &Event::Stream { stream_id });
        }

        let stream = self.streams.get_mut(&stream_id).unwrap();
        if let Some(p) = priority {
            stream.recv_priority(p);
        }

        let waiting_on_trailers = stream.waiting_on_trailers;
        if waiting_on_trailers {
            if !end_stream {
                return Err(H2Error::protocol("trailers must carry END_STREAM"));
            }
            if let Some(expected) = &stream.expected_trailers {
                let names: Vec<Bytes> = headers.iter().map(|h| h.name.clone()).collect();
                if !same_name_set(&names, expected) {
                    return Err(H2Error::protocol("trailer names do not match advertisement"));
                }
            }
            stream.waiting_on_trailers = false;
            stream.expected_trailers = None;
        }

        if let Some(content_length) = fc.content_length {
            stream.content_length_remaining = Some(content_length as i64);
        }
        if !fc.trailer.is_empty() {
            stream.expected_trailers = Some(fc.trailer.clone());
            stream.waiting_on_trailers = true;
        }

        stream.recv_headers(end_stream)?;

        self.emitter.emit(
            Signal::Headers,
            &Event::Headers {
                stream_id,
                headers,
                end_stream,
            },
        );
        self.settle_stream(stream_id)
    }

    fn dispatch_push_promise(&mut self, parent_id: u32, promised_stream_id: u32, block: Bytes) -> Result<()> {
        let mut fc = ParseFrameContext::default();
        let headers = Decompressor::decompress(&block, &mut self.decoder_ctx, Some(&mut fc))?;

        if self.role != Role::Client {
            return Err(H2Error::protocol("PUSH_PROMISE received by a server"));
        }
        let parent = self
            .streams
            .get(&parent_id)
            .ok_or_else(|| H2Error::protocol("PUSH_PROMISE for unknown parent stream"))?;
        if parent.state == StreamState::Closed(ClosedReason::LocalRst) {
            self.emit_frame(Frame::RstStream {
                stream_id: promised_stream_id,
                error: error_code::REFUSED_STREAM,
            })?;
            return Ok(());
        }

        self.validate_peer_initiated_id(promised_stream_id, false)?;
        let mut promised = Stream::new(promised_stream_id, &self.local_settings, &self.remote_settings);
        promised.recv_push_promise()?;
        self.streams.insert(promised_stream_id, promised);

        self.emitter.emit(
            Signal::Promise,
            &Event::Promise {
                stream_id: parent_id,
                promised_stream_id,
            },
        );
        self.emitter.emit(
            Signal::PromiseHeaders,
            &Event::PromiseHeaders {
                stream_id: promised_stream_id,
                headers,
            },
        );
        Ok(())
    }

    /// Enforces odd/even-per-role and strict monotonicity for a
    /// peer-initiated stream id (RFC 7540 §5.1.1).
    fn validate_peer_initiated_id(&mut self, id: u32, from_client_request: bool) -> Result<()> {
        let expected_odd = from_client_request;
        if (id % 2 == 1) != expected_odd {
            return Err(H2Error::protocol("stream id parity mismatch for initiating role"));
        }
        if id <= self.highest_received_stream_id && self.highest_received_stream_id != 0 {
            return Err(H2Error::protocol("stream id is not strictly increasing"));
        }
        self.highest_received_stream_id = self.highest_received_stream_id.max(id);
        Ok(())
    }

    fn settle_stream(&mut self, stream_id: u32) -> Result<()> {
        let outcome = self.streams.get_mut(&stream_id).and_then(Stream::settle);
        match outcome {
            Some(true) => {
                self.emitter.emit(Signal::HalfClose, &Event::HalfClose { stream_id });
            }
            Some(false) => {
                self.emitter.emit(
                    Signal::Close,
                    &Event::Close {
                        stream_id,
                        error: None,
                    },
                );
                self.mark_closed(stream_id);
            }
            None => {}
        }
        Ok(())
    }

    fn mark_closed(&mut self, stream_id: u32) {
        self.streams.remove(&stream_id);
        let now_ms = self.epoch.elapsed().as_millis() as u64;
        self.closed_streams.push_back((stream_id, now_ms));
        self.trim_closed_streams(now_ms);
    }

    fn trim_closed_streams(&mut self, now_ms: u64) {
        while let Some(&(_, closed_at)) = self.closed_streams.front() {
            if now_ms.saturating_sub(closed_at) > self.config.closed_stream_retention_ms {
                self.closed_streams.pop_front();
            } else {
                break;
            }
        }
    }

    // ---- outbound ------------------------------------------------------

    pub fn send_headers(
        &mut self,
        stream_id: u32,
        headers: Vec<Header>,
        end_stream: bool,
        end_headers: bool,
    ) -> Result<()> {
        let block = Compressor::compress(&mut self.encoder_ctx, &headers)?;
        let stream = self
            .streams
            .entry(stream_id)
            .or_insert_with(|| Stream::new(stream_id, &self.local_settings, &self.remote_settings));
        stream.send_headers(end_stream)?;

        let frames = build_header_frames(
            self.framer.remote_max_frame_size,
            stream_id,
            HeaderFrameKind::Headers { priority: None },
            end_stream,
            end_headers,
            block,
        );
        for frame in frames {
            self.emit_frame(frame)?;
        }
        self.settle_stream(stream_id)
    }

    pub fn send_push_promise(
        &mut self,
        parent_stream_id: u32,
        promised_stream_id: u32,
        headers: Vec<Header>,
        end_headers: bool,
    ) -> Result<()> {
        let block = Compressor::compress(&mut self.encoder_ctx, &headers)?;
        if !self.streams.contains_key(&parent_stream_id) {
            return Err(H2Error::internal("unknown parent stream"));
        }
        let mut promised = Stream::new(promised_stream_id, &self.local_settings, &self.remote_settings);
        promised.send_push_promise()?;
        self.streams.insert(promised_stream_id, promised);

        let frames = build_header_frames(
            self.framer.remote_max_frame_size,
            parent_stream_id,
            HeaderFrameKind::PushPromise { promised_stream_id },
            false,
            end_headers,
            block,
        );
        for frame in frames {
            self.emit_frame(frame)?;
        }
        Ok(())
    }

    pub fn send_data(&mut self, stream_id: u32, bytes: Bytes, end_stream: bool) -> Result<()> {
        let max_frame = self.framer.remote_max_frame_size;
        let frames = {
            let stream = self
                .streams
                .get_mut(&stream_id)
                .ok_or_else(|| H2Error::internal("unknown stream"))?;
            stream.send_data(bytes, end_stream, max_frame)
        };
        self.gate_and_emit(stream_id, frames)?;
        self.settle_stream(stream_id)
    }

    pub fn close(&mut self, stream_id: u32, error: u32) -> Result<()> {
        if let Some(stream) = self.streams.get_mut(&stream_id) {
            stream.send_rst_stream();
        }
        self.emit_frame(Frame::RstStream { stream_id, error })?;
        self.mark_closed(stream_id);
        Ok(())
    }

    pub fn settings(&mut self, params: Vec<(u16, u32)>) -> Result<()> {
        self.pending_settings.push_back(params.clone());
        self.emit_frame(Frame::Settings { ack: false, params })
    }

    pub fn ping(&mut self, payload: [u8; 8]) -> Result<()> {
        self.pending_pings.push_back(payload);
        self.emit_frame(Frame::Ping { ack: false, payload })
    }

    pub fn goaway(&mut self, error: u32, debug: Bytes) -> Result<()> {
        self.emit_goaway_and_close(error, debug);
        Ok(())
    }

    fn emit_goaway_and_close(&mut self, error: u32, debug: Bytes) {
        debug!("closing connection: error={} last_stream_id={}", error, self.highest_received_stream_id);
        let last_stream_id = self.highest_received_stream_id;
        let _ = self.emit_frame(Frame::GoAway {
            last_stream_id,
            error,
            debug: debug.clone(),
        });
        self.state = ConnectionState::Closed;
        self.close_time = Some(self.epoch.elapsed());
        self.emitter.emit(
            Signal::GoAway,
            &Event::GoAway {
                last_stream_id,
                error,
                debug,
            },
        );
    }

    fn fail_connection(&mut self, err: H2Error) -> Result<()> {
        error!("connection failed: {:?}", err);
        let (code, debug) = match &err {
            H2Error::Connection(kind) => (kind.code(), kind.debug_data()),
            H2Error::Stream { kind, .. } => (kind.code(), Vec::new()),
        };
        self.emit_goaway_and_close(code, Bytes::from(debug));
        Err(err)
    }

    fn gate_and_emit(&mut self, stream_id: u32, frames: Vec<Frame>) -> Result<()> {
        for frame in frames {
            match frame {
                Frame::Data {
                    stream_id: sid,
                    end_stream,
                    payload,
                    padding,
                } => {
                    let len = payload.len() as i64;
                    if len <= self.connection_remote_window {
                        self.connection_remote_window -= len;
                        self.emit_frame(Frame::Data {
                            stream_id: sid,
                            end_stream,
                            padding,
                            payload,
                        })?;
                    } else {
                        let allowed = self.connection_remote_window.max(0) as usize;
                        if allowed > 0 {
                            let sent = payload.slice(0..allowed);
                            let rest = payload.slice(allowed..);
                            self.connection_remote_window = 0;
                            self.emit_frame(Frame::Data {
                                stream_id: sid,
                                end_stream: false,
                                padding: None,
                                payload: sent,
                            })?;
                            if let Some(stream) = self.streams.get_mut(&sid) {
                                stream.outbound.requeue_front(sid, rest, end_stream);
                            }
                        } else if let Some(stream) = self.streams.get_mut(&sid) {
                            stream.outbound.requeue_front(sid, payload, end_stream);
                        }
                        break;
                    }
                }
                other => self.emit_frame(other)?,
            }
        }
        Ok(())
    }

    fn flush_stream(&mut self, stream_id: u32) -> Result<()> {
        let frames = match self.streams.get_mut(&stream_id) {
            Some(stream) => stream.outbound.drain(),
            None => return Ok(()),
        };
        self.gate_and_emit(stream_id, frames)
    }

    fn emit_frame(&mut self, frame: Frame) -> Result<()> {
        trace!("send {} on stream {}", frame_kind_name(&frame), frame.stream_id());
        let bytes = self.framer.encode(&frame)?;
        let stream_id = frame.stream_id();
        self.emitter.emit(
            Signal::Frame,
            &Event::Frame {
                bytes: Bytes::from(bytes),
            },
        );
        self.emitter.emit(Signal::FrameSent, &Event::FrameSent { stream_id });
        Ok(())
    }
}

enum HeaderFrameKind {
    Headers { priority: Option<Priority> },
    PushPromise { promised_stream_id: u32 },
}

fn frame_kind_name(frame: &Frame) -> &'static str {
    match frame {
        Frame::Data { .. } => "DATA",
        Frame::Headers { .. } => "HEADERS",
        Frame::Priority { .. } => "PRIORITY",
        Frame::RstStream { .. } => "RST_STREAM",
        Frame::Settings { .. } => "SETTINGS",
        Frame::PushPromise { .. } => "PUSH_PROMISE",
        Frame::Ping { .. } => "PING",
        Frame::GoAway { .. } => "GOAWAY",
        Frame::WindowUpdate { .. } => "WINDOW_UPDATE",
        Frame::Continuation { .. } => "CONTINUATION",
        Frame::Unknown { .. } => "UNKNOWN",
        #[cfg(feature = "rfc7838")]
        Frame::AltSvc { .. } => "ALTSVC",
        #[cfg(feature = "rfc8336")]
        Frame::Origin { .. } => "ORIGIN",
    }
}

fn build_header_frames(
    remote_max_frame_size: u32,
    stream_id: u32,
    kind: HeaderFrameKind,
    end_stream: bool,
    end_headers: bool,
    block: Vec<u8>,
) -> Vec<Frame> {
    let max = (remote_max_frame_size as usize).max(1);
    let mut chunks: Vec<&[u8]> = if block.is_empty() {
        vec![&block[..]]
    } else {
        block.chunks(max).collect()
    };
    if chunks.is_empty() {
        chunks.push(&[]);
    }
    let last = chunks.len() - 1;

    let mut frames = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.into_iter().enumerate() {
        let is_last = i == last;
        if i == 0 {
            match &kind {
                HeaderFrameKind::Headers { priority } => frames.push(Frame::Headers {
                    stream_id,
                    end_stream,
                    end_headers: is_last && end_headers,
                    padding: None,
                    priority: *priority,
                    header_block: Bytes::copy_from_slice(chunk),
                }),
                HeaderFrameKind::PushPromise { promised_stream_id } => frames.push(Frame::PushPromise {
                    stream_id,
                    promise_stream_id: *promised_stream_id,
                    end_headers: is_last && end_headers,
                    padding: None,
                    header_block: Bytes::copy_from_slice(chunk),
                }),
            }
        } else {
            frames.push(Frame::Continuation {
                stream_id,
                end_headers: is_last && end_headers,
                header_block: Bytes::copy_from_slice(chunk),
            });
        }
    }
    frames
}

fn same_name_set(names: &[Bytes], expected: &[Bytes]) -> bool {
    if names.len() != expected.len() {
        return false;
    }
    expected.iter().all(|e| names.contains(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hpack::Header;

    fn handshake_bytes(settings_params: &[(u16, u32)]) -> Vec<u8> {
        let mut bytes = CONNECTION_PREFACE.to_vec();
        let framer = Framer::default();
        bytes.extend(
            framer
                .encode(&Frame::Settings {
                    ack: false,
                    params: settings_params.to_vec(),
                })
                .unwrap(),
        );
        bytes
    }

    #[test]
    fn client_sends_preface_and_settings_on_construction() {
        let frames = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut conn = Connection::client(Config::default()).unwrap();
        let f = frames.clone();
        conn.subscribe(
            Signal::Frame,
            Box::new(move |event| {
                if let Event::Frame { bytes } = event {
                    f.borrow_mut().push(bytes.clone());
                }
            }),
        );
        assert_eq!(conn.state, ConnectionState::Connected);
    }

    #[test]
    fn server_requires_preface_before_parsing_frames() {
        let mut server = Connection::server(Config::default());
        let bytes = handshake_bytes(&[]);
        server.receive(&bytes).unwrap();
        assert_eq!(server.state, ConnectionState::Connected);
    }

    #[test]
    fn server_rejects_bad_preface() {
        let mut server = Connection::server(Config::default());
        let err = server.receive(b"GET / HTTP/1.1\r\n\r\n");
        assert!(err.is_err());
    }

    #[test]
    fn client_get_request_response_round_trip() {
        let mut server = Connection::server(Config::default());
        server.receive(&handshake_bytes(&[])).unwrap();

        let headers_seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let hs = headers_seen.clone();
        server.subscribe(
            Signal::Headers,
            Box::new(move |event| {
                if let Event::Headers { stream_id, end_stream, .. } = event {
                    hs.borrow_mut().push((*stream_id, *end_stream));
                }
            }),
        );

        let headers = vec![
            Header::new(&b":method"[..], &b"GET"[..]),
            Header::new(&b":scheme"[..], &b"https"[..]),
            Header::new(&b":authority"[..], &b"www.example.com"[..]),
            Header::new(&b":path"[..], &b"/"[..]),
        ];
        let mut client_ctx = EncodingContext::new(HpackOptions::default());
        let block = Compressor::compress(&mut client_ctx, &headers).unwrap();
        let framer = Framer::default();
        let frame = Frame::Headers {
            stream_id: 1,
            end_stream: true,
            end_headers: true,
            padding: None,
            priority: None,
            header_block: Bytes::from(block),
        };
        server.receive(&framer.encode(&frame).unwrap()).unwrap();

        assert_eq!(headers_seen.borrow().as_slice(), &[(1, true)]);
    }

    #[test]
    fn continuation_reassembly_across_two_frames() {
        let mut server = Connection::server(Config::default());
        server.receive(&handshake_bytes(&[])).unwrap();

        let headers = vec![
            Header::new(&b":method"[..], &b"GET"[..]),
            Header::new(&b":path"[..], &b"/"[..]),
            Header::new(&b"x-custom"[..], &b"value"[..]),
        ];
        let mut ctx = EncodingContext::new(HpackOptions::default());
        let block = Compressor::compress(&mut ctx, &headers).unwrap();
        let split_at = block.len() / 2;
        let framer = Framer::default();

        let first = Frame::Headers {
            stream_id: 1,
            end_stream: false,
            end_headers: false,
            padding: None,
            priority: None,
            header_block: Bytes::copy_from_slice(&block[..split_at]),
        };
        let second = Frame::Continuation {
            stream_id: 1,
            end_headers: true,
            header_block: Bytes::copy_from_slice(&block[split_at..]),
        };

        let seen = std::rc::Rc::new(std::cell::RefCell::new(0usize));
        let s = seen.clone();
        server.subscribe(
            Signal::Headers,
            Box::new(move |event| {
                if let Event::Headers { headers, .. } = event {
                    *s.borrow_mut() = headers.len();
                }
            }),
        );

        server.receive(&framer.encode(&first).unwrap()).unwrap();
        server.receive(&framer.encode(&second).unwrap()).unwrap();
        assert_eq!(*seen.borrow(), 3);
    }

    #[test]
    fn unrelated_frame_mid_header_block_is_protocol_error() {
        let mut server = Connection::server(Config::default());
        server.receive(&handshake_bytes(&[])).unwrap();
        let framer = Framer::default();
        let headers = Frame::Headers {
            stream_id: 1,
            end_stream: false,
            end_headers: false,
            padding: None,
            priority: None,
            header_block: Bytes::from_static(b"\x82"),
        };
        server.receive(&framer.encode(&headers).unwrap()).unwrap();
        let ping = Frame::Ping {
            ack: false,
            payload: [0; 8],
        };
        assert!(server.receive(&framer.encode(&ping).unwrap()).is_err());
    }

    #[test]
    fn even_stream_id_from_client_is_protocol_error() {
        let mut server = Connection::server(Config::default());
        server.receive(&handshake_bytes(&[])).unwrap();
        let framer = Framer::default();
        let headers = Frame::Headers {
            stream_id: 2,
            end_stream: true,
            end_headers: true,
            padding: None,
            priority: None,
            header_block: Bytes::from_static(b"\x82"),
        };
        assert!(server.receive(&framer.encode(&headers).unwrap()).is_err());
    }

    #[test]
    fn connection_level_flow_control_blocks_and_drains() {
        let mut conn = Connection::client(Config::default()).unwrap();
        conn.connection_remote_window = 1000;
        conn.remote_settings.initial_window_size = 1000;

        conn.streams.insert(
            1,
            Stream::new(1, &conn.local_settings, &conn.remote_settings),
        );
        conn.streams.insert(
            3,
            Stream::new(3, &conn.local_settings, &conn.remote_settings),
        );

        let emitted = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let e = emitted.clone();
        conn.subscribe(
            Signal::Frame,
            Box::new(move |event| {
                if let Event::Frame { bytes } = event {
                    e.borrow_mut().push(bytes.len());
                }
            }),
        );

        conn.send_data(1, Bytes::from(vec![0u8; 900]), false).unwrap();
        conn.send_data(3, Bytes::from(vec![0u8; 200]), false).unwrap();
        assert_eq!(conn.connection_remote_window, 0);
        assert!(!conn.streams.get(&3).unwrap().outbound.is_empty());

        conn.handle_connection_window_update(1000).unwrap();
        assert_eq!(conn.connection_remote_window, 900);
        assert!(conn.streams.get(&3).unwrap().outbound.is_empty());
    }
}
