//! Cross-reference table resolution.
//!
//! The logical object table of a PDF is reconstructed from one or more
//! xref sections appended by successive incremental updates. Sections are
//! walked newest to oldest through the trailer `Prev` links; entries from
//! newer sections shadow older ones.

use super::error::{SigError, SigResult};
use super::lexer;
use super::navigator::{self, DictKey, IndirectRef};
use super::source::Source;
use log::debug;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// How far back from end-of-file the `startxref` keyword is searched.
pub const XREF_SEARCH_OFFSET: u64 = 1024;

/// Bound on the number of xref sections walked through `Prev` links.
///
/// The only defence against a circular `Prev` chain. Overridable per
/// document via [`crate::core::Document::set_max_updates`].
pub const MAX_FILE_UPDATES: usize = 1024;

/// A single row of a cross-reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrefEntry {
    /// Byte offset of the `N G obj` header (in-use entries only; for free
    /// entries this field carries the next-free object number)
    pub byte_offset: u64,
    pub gen_num: u16,
    pub in_use: bool,
}

impl XrefEntry {
    pub fn in_use(byte_offset: u64, gen_num: u16) -> Self {
        XrefEntry {
            byte_offset,
            gen_num,
            in_use: true,
        }
    }

    pub fn free(next_free: u64, gen_num: u16) -> Self {
        XrefEntry {
            byte_offset: next_free,
            gen_num,
            in_use: false,
        }
    }
}

/// Classification of an xref section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefKind {
    /// Classic `xref` keyword followed by subsections of 20-byte rows
    Table,
    /// PDF 1.5+ cross-reference stream (an indirect object)
    Stream,
}

/// The logical object table.
///
/// Maps object numbers to the entries seen for them, one per generation.
/// During resolution the newest section is walked first, so the first
/// entry recorded for a given `(object, generation)` pair is the current
/// one; later (older) duplicates are ignored.
#[derive(Debug, Default)]
pub struct XrefTable {
    entries: FxHashMap<u32, SmallVec<[XrefEntry; 1]>>,
    /// `Size` declared by the newest trailer
    pub size: u64,
    /// Offset of the previous xref section, 0 once the root is reached
    pub prev_section: u64,
}

impl XrefTable {
    pub fn new() -> Self {
        XrefTable::default()
    }

    /// Records an entry unless one with the same `(object, generation)`
    /// already exists.
    pub fn add_entry(&mut self, obj_num: u32, entry: XrefEntry) {
        let generations = self.entries.entry(obj_num).or_default();
        if generations.iter().all(|e| e.gen_num != entry.gen_num) {
            generations.push(entry);
        }
    }

    /// Looks up the entry for an exact `(object, generation)` pair.
    pub fn entry(&self, obj_num: u32, gen_num: u16) -> Option<&XrefEntry> {
        self.entries
            .get(&obj_num)?
            .iter()
            .find(|e| e.gen_num == gen_num)
    }

    /// Number of distinct object numbers in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all recorded entries, ordered by object number.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &XrefEntry)> {
        let mut obj_nums: Vec<u32> = self.entries.keys().copied().collect();
        obj_nums.sort_unstable();
        obj_nums.into_iter().flat_map(|num| {
            self.entries[&num].iter().map(move |entry| (num, entry))
        })
    }
}

/// Locates the most recent xref section offset.
///
/// Scans backward from `len - 9` over at most [`XREF_SEARCH_OFFSET`]
/// bytes for the literal `startxref`, then parses the decimal offset that
/// follows it.
pub fn read_startxref(src: &mut dyn Source) -> SigResult<u64> {
    let size = src.len();
    let mut tmp = [0u8; 9];

    for back in 9..=XREF_SEARCH_OFFSET {
        if back > size {
            break;
        }

        src.seek(size - back)?;
        src.read_exact(&mut tmp)?;

        if &tmp == b"startxref" {
            let offset = lexer::parse_number(src)?;
            if offset == 0 {
                return Err(SigError::malformed("startxref offset is zero"));
            }
            debug!("startxref found {} bytes from end, offset {}", back, offset);
            return Ok(offset);
        }
    }

    Err(SigError::malformed("startxref not found"))
}

/// Classifies the xref section at the cursor.
///
/// `x` introduces the classic `xref` keyword; a digit introduces an
/// indirect object holding a cross-reference stream.
pub fn classify(src: &mut dyn Source) -> SigResult<XrefKind> {
    lexer::skip_whitespace(src)?;
    let at = src.pos();

    match src.peek_byte()? {
        Some(b'x') => Ok(XrefKind::Table),
        Some(ch) if lexer::is_digit(ch) => Ok(XrefKind::Stream),
        _ => Err(SigError::malformed_at("unrecognized xref section", at)),
    }
}

/// Trailer keys relevant to resolution.
struct TrailerInfo {
    size: u64,
    root: Option<IndirectRef>,
    prev: u64,
}

fn read_trailer(src: &mut dyn Source) -> SigResult<TrailerInfo> {
    lexer::skip_word(src, b"trailer")?;
    lexer::skip_word(src, b"<<")?;

    let mut info = TrailerInfo {
        size: 0,
        root: None,
        prev: 0,
    };

    while let Some(key) = navigator::parse_dict_key(src)? {
        match key {
            DictKey::Size => info.size = lexer::parse_number(src)?,
            DictKey::Root => info.root = Some(navigator::parse_indirect_ref(src)?),
            DictKey::Prev => info.prev = lexer::parse_number(src)?,
            _ => navigator::skip_dict_unknown_value(src)?,
        }
    }

    Ok(info)
}

/// Reads one classic xref table into `table`.
///
/// Subsections are `first count` headers followed by `count` rows of
/// `offset generation (n|f)`. The cursor is left before the `trailer`
/// keyword.
fn read_xref_table(src: &mut dyn Source, table: &mut XrefTable) -> SigResult<()> {
    lexer::skip_word(src, b"xref")?;
    let file_len = src.len();

    loop {
        // a subsection starts with a number; anything else is the trailer
        let first = match lexer::parse_number(src) {
            Ok(n) => n,
            Err(_) => return Ok(()),
        };
        let count = lexer::parse_number(src)?;
        if count == 0 {
            return Err(SigError::malformed_at("empty xref subsection", src.pos()));
        }

        for i in 0..count {
            let at = src.pos();
            let offset = lexer::parse_number(src)?;
            let generation = lexer::parse_number(src)?;
            let generation = u16::try_from(generation)
                .map_err(|_| SigError::malformed_at("generation number out of range", at))?;

            let obj_num = first
                .checked_add(i)
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| SigError::malformed_at("object number out of range", at))?;

            if lexer::skip_word(src, b"f").is_ok() {
                table.add_entry(obj_num, XrefEntry::free(offset, generation));
                continue;
            }
            lexer::skip_word(src, b"n")?;

            if offset >= file_len {
                return Err(SigError::malformed_at(
                    format!("xref offset for object {} outside file", obj_num),
                    at,
                ));
            }
            table.add_entry(obj_num, XrefEntry::in_use(offset, generation));
        }
    }
}

/// Builds the object table by walking the xref chain from `startxref`.
///
/// Returns the table together with the catalog reference from the newest
/// trailer carrying a `Root`. The walk is bounded by `max_updates`;
/// exhausting the bound with sections still pending is treated as a
/// malformed (circular) chain.
pub fn resolve(
    src: &mut dyn Source,
    startxref: u64,
    max_updates: usize,
) -> SigResult<(XrefTable, IndirectRef)> {
    let mut table = XrefTable::new();
    let mut catalog: Option<IndirectRef> = None;
    let mut next_section = startxref;
    let mut remaining = max_updates;

    while next_section > 0 {
        if remaining == 0 {
            return Err(SigError::malformed(format!(
                "more than {} incremental updates",
                max_updates
            )));
        }
        remaining -= 1;

        if next_section >= src.len() {
            return Err(SigError::malformed_at("xref offset outside file", next_section));
        }
        src.seek(next_section)?;

        match classify(src)? {
            XrefKind::Table => {}
            XrefKind::Stream => {
                // PDF 1.5+ cross-reference streams; extension hook
                return Err(SigError::Unsupported("cross-reference streams"));
            }
        }

        read_xref_table(src, &mut table)?;
        let trailer = read_trailer(src)?;

        // the newest section's trailer wins
        if table.size == 0 {
            table.size = trailer.size;
        }
        if catalog.is_none() {
            catalog = trailer.root;
        }

        table.prev_section = trailer.prev;
        next_section = trailer.prev;
    }

    let catalog = catalog.ok_or_else(|| SigError::content("trailer has no Root entry"))?;
    debug!(
        "xref resolved: {} objects over {} section(s), catalog {}",
        table.len(),
        max_updates - remaining,
        catalog
    );

    Ok((table, catalog))
}
