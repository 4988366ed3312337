//! Engine-level configuration: the SETTINGS a connection seeds its
//! `local_settings` with, plus two non-wire knobs (CONTINUATION flood
//! cap, closed-stream retention).

/// RFC 7540 §6.5.2 SETTINGS identifiers.
pub mod settings_id {
    pub const HEADER_TABLE_SIZE: u16 = 0x1;
    pub const ENABLE_PUSH: u16 = 0x2;
    pub const MAX_CONCURRENT_STREAMS: u16 = 0x3;
    pub const INITIAL_WINDOW_SIZE: u16 = 0x4;
    pub const MAX_FRAME_SIZE: u16 = 0x5;
    pub const MAX_HEADER_LIST_SIZE: u16 = 0x6;
}

/// A negotiated (or about-to-be-negotiated) SETTINGS parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub header_table_size: u32,
    pub enable_push: bool,
    pub max_concurrent_streams: u32,
    pub initial_window_size: u32,
    pub max_frame_size: u32,
    pub max_header_list_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            header_table_size: 4096,
            enable_push: true,
            max_concurrent_streams: u32::MAX,
            initial_window_size: 65_535,
            max_frame_size: 16_384,
            max_header_list_size: u32::MAX,
        }
    }
}

impl Settings {
    /// Returns the (id, value) pairs that differ from the RFC 7540
    /// defaults, in wire order for the initial client SETTINGS frame.
    /// Settings that match the default may be omitted entirely.
    pub fn diff_from_default(&self) -> Vec<(u16, u32)> {
        let default = Settings::default();
        let mut out = Vec::new();
        if self.header_table_size != default.header_table_size {
            out.push((settings_id::HEADER_TABLE_SIZE, self.header_table_size));
        }
        if self.enable_push != default.enable_push {
            out.push((settings_id::ENABLE_PUSH, self.enable_push as u32));
        }
        if self.max_concurrent_streams != default.max_concurrent_streams {
            out.push((
                settings_id::MAX_CONCURRENT_STREAMS,
                self.max_concurrent_streams,
            ));
        }
        if self.initial_window_size != default.initial_window_size {
            out.push((settings_id::INITIAL_WINDOW_SIZE, self.initial_window_size));
        }
        if self.max_frame_size != default.max_frame_size {
            out.push((settings_id::MAX_FRAME_SIZE, self.max_frame_size));
        }
        if self.max_header_list_size != default.max_header_list_size {
            out.push((
                settings_id::MAX_HEADER_LIST_SIZE,
                self.max_header_list_size,
            ));
        }
        out
    }

    pub fn apply(&mut self, id: u16, value: u32) {
        match id {
            settings_id::HEADER_TABLE_SIZE => self.header_table_size = value,
            settings_id::ENABLE_PUSH => self.enable_push = value != 0,
            settings_id::MAX_CONCURRENT_STREAMS => self.max_concurrent_streams = value,
            settings_id::INITIAL_WINDOW_SIZE => self.initial_window_size = value,
            settings_id::MAX_FRAME_SIZE => self.max_frame_size = value,
            settings_id::MAX_HEADER_LIST_SIZE => self.max_header_list_size = value,
            _ => {}
        }
    }
}

/// Top-level engine configuration: seeds `Connection::local_settings`
/// plus two engine-only knobs with no wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub settings: Settings,
    /// CONTINUATION flood defense cap: cumulative buffered
    /// header-block payload may not exceed this many bytes.
    pub max_header_block_size: usize,
    /// How long a closed stream id is remembered to distinguish
    /// "recently closed" (ignored) from "never existed" (protocol
    /// error) frames, in milliseconds (15s default).
    pub closed_stream_retention_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            max_header_block_size: 256 * 1024,
            closed_stream_retention_ms: 15_000,
        }
    }
}
