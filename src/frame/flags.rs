//! Per-type flag vocabularies (RFC 7540 §6.*), one bitflags set per
//! frame type — mirrors `natkeo559-htoo::flags` and `Atte-http2::flags`.

use bitflags::bitflags;

bitflags! {
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DataFlags: u8 {
        const END_STREAM = 0x1;
        const PADDED     = 0x8;
    }
}

bitflags! {
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HeadersFlags: u8 {
        const END_STREAM  = 0x1;
        const END_HEADERS = 0x4;
        const PADDED      = 0x8;
        const PRIORITY    = 0x20;
    }
}

bitflags! {
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SettingsFlags: u8 {
        const ACK = 0x1;
    }
}

bitflags! {
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PushPromiseFlags: u8 {
        const END_HEADERS = 0x4;
        const PADDED      = 0x8;
    }
}

bitflags! {
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PingFlags: u8 {
        const ACK = 0x1;
    }
}

bitflags! {
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ContinuationFlags: u8 {
        const END_HEADERS = 0x4;
    }
}
