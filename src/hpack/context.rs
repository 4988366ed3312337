//! The encoding context: the frozen static table, the
//! mutable dynamic table, and the planner that turns a header list
//! into a sequence of representation commands.

use crate::error::{H2Error, Result};
use crate::hpack::static_table::{self, STATIC_SIZE};
use crate::hpack::Header;
use bytes::Bytes;

const ENTRY_OVERHEAD: usize = 32;

/// When to use Huffman string encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuffmanPolicy {
    Always,
    Never,
    Shorter,
}

/// Which representations the encoder planner is allowed to use
/// ("never", "static-only", or "static and dynamic").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPolicy {
    Never,
    Static,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    pub huffman: HuffmanPolicy,
    pub index: IndexPolicy,
    /// The negotiated maximum dynamic table size
    /// "negotiated max"), independent of the table's live capacity.
    pub table_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            huffman: HuffmanPolicy::Shorter,
            index: IndexPolicy::All,
            table_size: 4096,
        }
    }
}

/// A planned representation, independent of wire encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ChangeTableSize(usize),
    /// 0-based combined-table index of an exact name+value match.
    Indexed(usize),
    Incremental {
        name_index: Option<usize>,
        name: Bytes,
        value: Bytes,
    },
    NoIndex {
        name_index: Option<usize>,
        name: Bytes,
        value: Bytes,
    },
    NeverIndexed {
        name_index: Option<usize>,
        name: Bytes,
        value: Bytes,
    },
}

#[derive(Debug, Clone, Default)]
struct DynamicTable {
    entries: Vec<(Bytes, Bytes)>,
    size: usize,
    max_size: usize,
}

impl DynamicTable {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn get(&self, index: usize) -> Option<&(Bytes, Bytes)> {
        self.entries.get(index)
    }

    fn insert(&mut self, name: Bytes, value: Bytes) {
        let entry_size = name.len() + value.len() + ENTRY_OVERHEAD;
        while self.size + entry_size > self.max_size && !self.entries.is_empty() {
            let (n, v) = self.entries.pop().unwrap();
            self.size -= n.len() + v.len() + ENTRY_OVERHEAD;
        }
        if entry_size <= self.max_size {
            self.size += entry_size;
            self.entries.insert(0, (name, value));
        }
    }

    fn set_max_size(&mut self, new_max: usize) {
        self.max_size = new_max;
        while self.size > self.max_size && !self.entries.is_empty() {
            let (n, v) = self.entries.pop().unwrap();
            self.size -= n.len() + v.len() + ENTRY_OVERHEAD;
        }
    }

    fn find_exact(&self, name: &[u8], value: &[u8]) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, v)| n.as_ref() == name && v.as_ref() == value)
    }

    fn find_name(&self, name: &[u8]) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n.as_ref() == name)
    }
}

/// Holds the static table reference, the dynamic table, and the
/// per-direction options driving the encoder planner.
pub struct EncodingContext {
    dynamic: DynamicTable,
    pub options: Options,
    table_updated: bool,
}

impl EncodingContext {
    pub fn new(options: Options) -> Self {
        let mut dynamic = DynamicTable::default();
        dynamic.max_size = options.table_size;
        Self {
            dynamic,
            options,
            table_updated: false,
        }
    }

    /// Must be called before decoding/encoding a new header block so
    /// a dynamic table size update is only honored at the block's start.
    pub fn begin_block(&mut self) {
        self.table_updated = false;
    }

    /// Resolve a 0-based combined index into a header:
    /// "index 0 refers to the first static entry; indices beyond
    /// STATIC_SIZE index the dynamic table counting from newest."
    pub fn dereference(&self, index: usize) -> Result<Header> {
        if index < STATIC_SIZE {
            let (name, value) = static_table::STATIC_TABLE[index];
            return Ok(Header {
                name: Bytes::from_static(name),
                value: Bytes::from_static(value),
            });
        }
        let dyn_index = index - STATIC_SIZE;
        match self.dynamic.get(dyn_index) {
            Some((name, value)) => Ok(Header {
                name: name.clone(),
                value: value.clone(),
            }),
            None => Err(H2Error::compression("HPACK index out of range")),
        }
    }

    /// Apply one decoded (or about-to-be-transmitted) command,
    /// updating dynamic table state.
    pub fn process(&mut self, command: &Command) -> Result<()> {
        match command {
            Command::ChangeTableSize(new_max) => {
                if self.table_updated {
                    return Err(H2Error::compression(
                        "dynamic table size update after a table update",
                    ));
                }
                if *new_max > self.options.table_size {
                    return Err(H2Error::compression(
                        "dynamic table size update exceeds negotiated max",
                    ));
                }
                self.dynamic.set_max_size(*new_max);
            }
            Command::Indexed(_) => {
                self.table_updated = true;
            }
            Command::Incremental { name, value, .. } => {
                self.dynamic.insert(name.clone(), value.clone());
                self.table_updated = true;
            }
            Command::NoIndex { .. } | Command::NeverIndexed { .. } => {
                self.table_updated = true;
            }
        }
        Ok(())
    }

    /// Plan the wire representation for a list of headers.
    /// Pseudo-headers (name starting with `:`) are emitted first.
    pub fn encode(&self, headers: &[Header]) -> Vec<Command> {
        let mut ordered: Vec<&Header> = headers.iter().collect();
        ordered.sort_by_key(|h| if h.name.first() == Some(&b':') { 0 } else { 1 });

        ordered
            .into_iter()
            .map(|header| self.plan_one(header))
            .collect()
    }

    fn plan_one(&self, header: &Header) -> Command {
        let name = lowercase_if_needed(&header.name);
        let value = if name.as_ref() == b":path" as &[u8] && header.value.is_empty() {
            Bytes::from_static(b"/")
        } else {
            header.value.clone()
        };

        if let Some(idx) = static_table::find_exact(&name, &value) {
            return Command::Indexed(idx);
        }
        if self.options.index == IndexPolicy::All {
            if let Some(idx) = self.dynamic.find_exact(&name, &value) {
                return Command::Indexed(STATIC_SIZE + idx);
            }
        }

        if let Some(idx) = static_table::find_name(&name) {
            return self.literal_with_name_index(Some(idx), name, value);
        }
        if self.options.index == IndexPolicy::All {
            if let Some(idx) = self.dynamic.find_name(&name) {
                return self.literal_with_name_index(Some(STATIC_SIZE + idx), name, value);
            }
        }

        self.literal_with_name_index(None, name, value)
    }

    fn literal_with_name_index(&self, name_index: Option<usize>, name: Bytes, value: Bytes) -> Command {
        match self.options.index {
            IndexPolicy::All => Command::Incremental {
                name_index,
                name,
                value,
            },
            IndexPolicy::Static | IndexPolicy::Never => Command::NoIndex {
                name_index,
                name,
                value,
            },
        }
    }
}

fn lowercase_if_needed(name: &[u8]) -> Bytes {
    if name.iter().any(u8::is_ascii_uppercase) {
        Bytes::from(name.to_ascii_lowercase())
    } else {
        Bytes::copy_from_slice(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_table_evicts_oldest() {
        let mut ctx = EncodingContext::new(Options {
            table_size: 70,
            ..Options::default()
        });
        ctx.process(&Command::Incremental {
            name_index: None,
            name: Bytes::from_static(b"a"),
            value: Bytes::from_static(b"b"),
        })
        .unwrap();
        ctx.process(&Command::Incremental {
            name_index: None,
            name: Bytes::from_static(b"c"),
            value: Bytes::from_static(b"d"),
        })
        .unwrap();
        ctx.process(&Command::Incremental {
            name_index: None,
            name: Bytes::from_static(b"e"),
            value: Bytes::from_static(b"f"),
        })
        .unwrap();
        assert_eq!(ctx.dynamic.len(), 2);
        assert_eq!(ctx.dynamic.get(0).unwrap().0.as_ref(), b"e");
        assert_eq!(ctx.dynamic.get(1).unwrap().0.as_ref(), b"c");
    }

    #[test]
    fn change_table_size_after_update_is_rejected() {
        let mut ctx = EncodingContext::new(Options::default());
        ctx.begin_block();
        ctx.process(&Command::Indexed(1)).unwrap();
        let err = ctx.process(&Command::ChangeTableSize(100));
        assert!(err.is_err());
    }

    #[test]
    fn change_table_size_above_negotiated_max_is_rejected() {
        let mut ctx = EncodingContext::new(Options {
            table_size: 100,
            ..Options::default()
        });
        ctx.begin_block();
        assert!(ctx.process(&Command::ChangeTableSize(200)).is_err());
        assert!(ctx.process(&Command::ChangeTableSize(50)).is_ok());
    }

    #[test]
    fn plan_prefers_exact_static_match() {
        let ctx = EncodingContext::new(Options::default());
        let headers = vec![Header {
            name: Bytes::from_static(b":method"),
            value: Bytes::from_static(b"GET"),
        }];
        let plan = ctx.encode(&headers);
        assert_eq!(plan, vec![Command::Indexed(1)]);
    }

    #[test]
    fn plan_emits_pseudo_headers_first() {
        let ctx = EncodingContext::new(Options::default());
        let headers = vec![
            Header {
                name: Bytes::from_static(b"host"),
                value: Bytes::from_static(b"example.com"),
            },
            Header {
                name: Bytes::from_static(b":method"),
                value: Bytes::from_static(b"GET"),
            },
        ];
        let plan = ctx.encode(&headers);
        assert_eq!(plan[0], Command::Indexed(1));
    }

    #[test]
    fn empty_path_value_is_substituted() {
        let ctx = EncodingContext::new(Options::default());
        let headers = vec![Header {
            name: Bytes::from_static(b":path"),
            value: Bytes::new(),
        }];
        let plan = ctx.encode(&headers);
        assert_eq!(plan, vec![Command::Indexed(3)]);
    }

    #[test]
    fn never_index_policy_uses_noindex() {
        let ctx = EncodingContext::new(Options {
            index: IndexPolicy::Never,
            ..Options::default()
        });
        let headers = vec![Header {
            name: Bytes::from_static(b"x-custom"),
            value: Bytes::from_static(b"value"),
        }];
        let plan = ctx.encode(&headers);
        assert!(matches!(plan[0], Command::NoIndex { .. }));
    }
}
