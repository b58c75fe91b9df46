use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::Range;

use crate::leaves::LeafAtom;
use crate::sample_entry::SampleEntry;

/// Four-character atom type code.
///
/// The same code can mean different things depending on the enclosing atom
/// (`rtp ` under `hnti` vs. under `stsd`), so a `FourCC` alone does not
/// identify the semantics of a box.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub fn from_str(s: &str) -> Option<Self> {
        let b = s.as_bytes();
        if b.len() == 4 {
            Some(FourCC([b[0], b[1], b[2], b[3]]))
        } else {
            // "©nam" is five bytes of UTF-8 but one Latin-1 type code
            let chars: Vec<char> = s.chars().collect();
            if chars.len() == 4 && chars.iter().all(|&c| (c as u32) < 0x100) {
                Some(FourCC([
                    chars[0] as u8,
                    chars[1] as u8,
                    chars[2] as u8,
                    chars[3] as u8,
                ]))
            } else {
                None
            }
        }
    }

    pub fn from_u32(v: u32) -> Self {
        FourCC(v.to_be_bytes())
    }

    pub fn as_str_lossy(&self) -> String {
        self.0
            .iter()
            .map(|&c| match c {
                32..=126 => c as char,
                0xA9 => '©',
                _ => '.',
            })
            .collect()
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}

impl Serialize for FourCC {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.as_str_lossy())
    }
}

/// Resolved header of one atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AtomHeader {
    pub typ: FourCC,
    /// Resolved total size including the header. 0 only when the atom was
    /// declared "to end of stream" and the stream size was unknown.
    pub size: u64,
    /// 8, or 16 for the 64-bit size form.
    pub header_size: u64,
    /// Stream offset of the first header byte.
    pub start: u64,
}

impl AtomHeader {
    pub fn payload_offset(&self) -> u64 {
        self.start + self.header_size
    }

    /// Bytes a constructor is allowed to read after the header.
    pub fn payload_size(&self) -> u64 {
        self.size.saturating_sub(self.header_size)
    }

    pub fn end(&self) -> u64 {
        self.start + self.size
    }
}

/// Version and flags of a "full" atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FullHeader {
    pub version: u8,
    pub flags: u32,
}

/// Fields some containers carry between their header and their children.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Preamble {
    None,
    /// `stsd` / `dref`: declared number of child entries.
    EntryCount(u32),
    SampleEntry(SampleEntry),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerAtom {
    pub full_header: Option<FullHeader>,
    pub preamble: Preamble,
    pub children: Vec<Atom>,
}

/// Payload range of an atom nobody parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OpaqueAtom {
    pub data_offset: u64,
    pub data_len: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AtomBody {
    Container(ContainerAtom),
    Leaf(LeafAtom),
    Opaque(OpaqueAtom),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Atom {
    #[serde(flatten)]
    pub header: AtomHeader,
    pub body: AtomBody,
}

impl Atom {
    pub fn new(header: AtomHeader, body: AtomBody) -> Self {
        Atom { header, body }
    }

    /// Generic atom that keeps only type, size and payload range.
    pub fn opaque(header: AtomHeader) -> Self {
        Atom {
            header,
            body: AtomBody::Opaque(OpaqueAtom {
                data_offset: header.payload_offset(),
                data_len: header.payload_size(),
            }),
        }
    }

    pub fn typ(&self) -> FourCC {
        self.header.typ
    }

    pub fn size(&self) -> u64 {
        self.header.size
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self.body, AtomBody::Opaque(_))
    }

    pub fn as_container(&self) -> Option<&ContainerAtom> {
        match &self.body {
            AtomBody::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafAtom> {
        match &self.body {
            AtomBody::Leaf(l) => Some(l),
            _ => None,
        }
    }

    /// Byte range of the payload in the source stream.
    pub fn payload_range(&self) -> Range<u64> {
        self.header.payload_offset()..self.header.end().max(self.header.payload_offset())
    }

    /// Children in file order; empty for leaves and opaque atoms.
    pub fn children(&self) -> &[Atom] {
        match &self.body {
            AtomBody::Container(c) => &c.children,
            _ => &[],
        }
    }

    pub fn child(&self, typ: FourCC) -> Option<&Atom> {
        self.children().iter().find(|c| c.typ() == typ)
    }

    /// Resolve a dotted path below this atom, e.g. `mdia.minf.stbl`.
    pub fn find(&self, path: &str) -> Option<&Atom> {
        select_by_path(self.children(), path).into_iter().next()
    }
}

/// Select atoms by a dotted path such as `moov.trak[0].mdia.minf.stbl`.
///
/// The first segment matches against `roots`, later segments against the
/// children of the previous selection. `[n]` picks the n-th match of a segment.
pub fn select_by_path<'a>(roots: &'a [Atom], path: &str) -> Vec<&'a Atom> {
    let mut current: Vec<&'a Atom> = Vec::new();

    for (depth, seg) in path.split('.').enumerate() {
        let (name, idx) = parse_segment(seg);
        let Some(fourcc) = FourCC::from_str(name) else {
            return Vec::new();
        };

        let mut matches: Vec<&'a Atom> = if depth == 0 {
            roots.iter().filter(|a| a.typ() == fourcc).collect()
        } else {
            current
                .iter()
                .copied()
                .flat_map(|a: &'a Atom| a.children())
                .filter(|a| a.typ() == fourcc)
                .collect()
        };

        current = match idx {
            Some(i) if i < matches.len() => vec![matches.swap_remove(i)],
            Some(_) => Vec::new(),
            None => matches,
        };
        if current.is_empty() {
            break;
        }
    }

    current
}

fn parse_segment(seg: &str) -> (&str, Option<usize>) {
    if let Some(l) = seg.find('[') {
        let name = &seg[..l];
        if let Some(r) = seg[l + 1..].find(']') {
            let idx = seg[l + 1..l + 1 + r].parse::<usize>().ok();
            return (name, idx);
        }
        (name, None)
    } else {
        (seg, None)
    }
}
