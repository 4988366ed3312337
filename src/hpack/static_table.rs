//! The frozen HPACK static table (RFC 7541 Appendix A), plus the
//! reverse-lookup indexes the encoder planner needs.

use std::collections::HashMap;
use std::sync::OnceLock;

/// 61 entries, 0-based here ("index 0 refers to the first
/// static entry"); the wire's 1-based index is `internal + 1`.
pub const STATIC_TABLE: &[(&[u8], &[u8])] = &[
    (b":authority", b""),
    (b":method", b"GET"),
    (b":method", b"POST"),
    (b":path", b"/"),
    (b":path", b"/index.html"),
    (b":scheme", b"http"),
    (b":scheme", b"https"),
    (b":status", b"200"),
    (b":status", b"204"),
    (b":status", b"206"),
    (b":status", b"304"),
    (b":status", b"400"),
    (b":status", b"404"),
    (b":status", b"500"),
    (b"accept-charset", b""),
    (b"accept-encoding", b"gzip, deflate"),
    (b"accept-language", b""),
    (b"accept-ranges", b""),
    (b"accept", b""),
    (b"access-control-allow-origin", b""),
    (b"age", b""),
    (b"allow", b""),
    (b"authorization", b""),
    (b"cache-control", b""),
    (b"content-disposition", b""),
    (b"content-encoding", b""),
    (b"content-language", b""),
    (b"content-length", b""),
    (b"content-location", b""),
    (b"content-range", b""),
    (b"content-type", b""),
    (b"cookie", b""),
    (b"date", b""),
    (b"etag", b""),
    (b"expect", b""),
    (b"expires", b""),
    (b"from", b""),
    (b"host", b""),
    (b"if-match", b""),
    (b"if-modified-since", b""),
    (b"if-none-match", b""),
    (b"if-range", b""),
    (b"if-unmodified-since", b""),
    (b"last-modified", b""),
    (b"link", b""),
    (b"location", b""),
    (b"max-forwards", b""),
    (b"proxy-authenticate", b""),
    (b"proxy-authorization", b""),
    (b"range", b""),
    (b"referer", b""),
    (b"refresh", b""),
    (b"retry-after", b""),
    (b"server", b""),
    (b"set-cookie", b""),
    (b"strict-transport-security", b""),
    (b"transfer-encoding", b""),
    (b"user-agent", b""),
    (b"vary", b""),
    (b"via", b""),
    (b"www-authenticate", b""),
];

pub const STATIC_SIZE: usize = STATIC_TABLE.len();

fn exact_index() -> &'static HashMap<(&'static [u8], &'static [u8]), usize> {
    static INDEX: OnceLock<HashMap<(&'static [u8], &'static [u8]), usize>> = OnceLock::new();
    INDEX.get_or_init(|| {
        let mut map = HashMap::with_capacity(STATIC_TABLE.len());
        for (i, entry) in STATIC_TABLE.iter().enumerate() {
            map.entry(*entry).or_insert(i);
        }
        map
    })
}

fn name_index() -> &'static HashMap<&'static [u8], usize> {
    static INDEX: OnceLock<HashMap<&'static [u8], usize>> = OnceLock::new();
    INDEX.get_or_init(|| {
        let mut map = HashMap::with_capacity(STATIC_TABLE.len());
        for (i, (name, _)) in STATIC_TABLE.iter().enumerate() {
            map.entry(*name).or_insert(i);
        }
        map
    })
}

pub fn find_exact(name: &[u8], value: &[u8]) -> Option<usize> {
    exact_index().get(&(name, value)).copied()
}

pub fn find_name(name: &[u8]) -> Option<usize> {
    name_index().get(name).copied()
}
