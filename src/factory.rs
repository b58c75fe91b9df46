use crate::boxes::{Atom, AtomBody, AtomHeader, ContainerAtom, FourCC};
use crate::known_boxes::*;
use crate::leaves::{self, LeafResult};
use crate::metadata::MetadataHandler;
use crate::parser::{read_atom_header, Result};
use crate::sample_entry;
use crate::stream::ByteStream;
use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, LazyLock};
use tracing::{debug, trace};

/// Extension point for atom types the factory does not know.
///
/// Handlers are offered every type missing from the built-in table, in
/// registration order, with the stream positioned just past the header.
/// Returning `Ok(None)` passes the atom on to the next handler; an error is
/// treated the same way. Handlers may consume any part of the payload (the
/// factory repositions the stream afterwards) but must not read past
/// `header.payload_size()` bytes. The header of a returned atom is replaced
/// by the one the factory resolved.
///
/// `depth` is the nesting level of the atom; pass it on when expanding
/// children through [`ContainerAtom::expand`].
pub trait TypeHandler: Send + Sync {
    fn try_create(
        &self,
        header: &AtomHeader,
        stream: &mut dyn ByteStream,
        context: Option<FourCC>,
        depth: usize,
        factory: &AtomFactory,
    ) -> Result<Option<Atom>>;
}

type NestedFn = fn(&AtomHeader, &mut dyn ByteStream, &AtomFactory, usize) -> Result<Option<AtomBody>>;
type LeafFn = fn(&AtomHeader, &mut dyn Read) -> LeafResult;

#[derive(Clone, Copy)]
enum BuiltIn {
    /// Reads only its own payload.
    Leaf(LeafFn),
    /// Has its own fields and child atoms.
    Nested(NestedFn),
    Container,
    FullContainer,
}

static BUILT_INS: LazyLock<HashMap<FourCC, BuiltIn>> = LazyLock::new(|| {
    use BuiltIn::*;
    HashMap::from([
        (MOOV, Container),
        (TRAK, Container),
        (MVHD, Leaf(leaves::mvhd)),
        (TKHD, Leaf(leaves::tkhd)),
        (MDHD, Leaf(leaves::mdhd)),
        (HDLR, Leaf(leaves::hdlr)),
        (DREF, Nested(sample_entry::entry_table)),
        (URL, Leaf(leaves::url)),
        (STSD, Nested(sample_entry::entry_table)),
        (STSC, Leaf(leaves::stsc)),
        (STCO, Leaf(leaves::stco)),
        (STSZ, Leaf(leaves::stsz)),
        (STTS, Leaf(leaves::stts)),
        (CTTS, Leaf(leaves::ctts)),
        (STSS, Leaf(leaves::stss)),
        (MP4S, Nested(sample_entry::system_entry)),
        (MP4A, Nested(sample_entry::audio_entry)),
        (MP4V, Nested(sample_entry::visual_entry)),
        (AVC1, Nested(sample_entry::visual_entry)),
        (ENCA, Nested(sample_entry::audio_entry)),
        (ENCV, Nested(sample_entry::visual_entry)),
        (DRMS, Nested(sample_entry::audio_entry)),
        (DRMI, Nested(sample_entry::visual_entry)),
        (ESDS, Leaf(leaves::esds)),
        (VMHD, Leaf(leaves::vmhd)),
        (SMHD, Leaf(leaves::smhd)),
        (NMHD, Leaf(leaves::nmhd)),
        (HMHD, Leaf(leaves::hmhd)),
        (FRMA, Leaf(leaves::frma)),
        (SCHM, Leaf(leaves::schm)),
        (FTYP, Leaf(leaves::ftyp)),
        (TIMS, Leaf(leaves::tims)),
        (SDP, Leaf(leaves::sdp)),
        (IKMS, Leaf(leaves::ikms)),
        (ISFM, Leaf(leaves::isfm)),
        (ISLT, Leaf(leaves::islt)),
        (HINT, Leaf(leaves::track_reference)),
        (TREF, Container),
        (HNTI, Container),
        (STBL, Container),
        (MDIA, Container),
        (DINF, Container),
        (MINF, Container),
        (SCHI, Container),
        (SINF, Container),
        (UDTA, Container),
        (ILST, Container),
        (EDTS, Container),
        (META, FullContainer),
    ])
});

/// Whether `typ` is handled by the factory itself rather than by handlers.
pub fn is_built_in(typ: FourCC) -> bool {
    typ == RTP || BUILT_INS.contains_key(&typ)
}

/// Builds atoms from a stream.
///
/// The factory holds no per-parse state: the parent type that disambiguates
/// context-dependent codes travels as an argument, so a factory can be shared
/// between threads as long as each thread parses its own stream.
#[derive(Clone, Default)]
pub struct AtomFactory {
    handlers: Vec<Arc<dyn TypeHandler>>,
}

impl AtomFactory {
    /// A factory with no type handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory with the built-in metadata handler registered.
    pub fn with_defaults() -> Self {
        let mut factory = Self::new();
        factory.add_type_handler(Arc::new(MetadataHandler));
        factory
    }

    pub fn add_type_handler(&mut self, handler: Arc<dyn TypeHandler>) {
        self.handlers.push(handler);
    }

    /// Remove a handler by identity. Returns whether it was registered.
    pub fn remove_type_handler(&mut self, handler: &Arc<dyn TypeHandler>) -> bool {
        match self.handlers.iter().position(|h| Arc::ptr_eq(h, handler)) {
            Some(i) => {
                self.handlers.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Construct one atom at the current position.
    ///
    /// On success the stream is left exactly at the end of the atom and
    /// `bytes_available` is reduced by its resolved size, whatever the
    /// constructor actually read. Header and size errors leave both the
    /// stream and the budget untouched.
    pub fn construct(
        &self,
        stream: &mut dyn ByteStream,
        bytes_available: &mut u64,
        context: Option<FourCC>,
    ) -> Result<Atom> {
        self.construct_at(stream, bytes_available, context, 0)
    }

    /// [`construct`](Self::construct) for an atom nested `depth` levels
    /// below the top. Containers at [`MAX_DEPTH`](crate::container::MAX_DEPTH)
    /// are built without children.
    pub fn construct_at(
        &self,
        stream: &mut dyn ByteStream,
        bytes_available: &mut u64,
        context: Option<FourCC>,
        depth: usize,
    ) -> Result<Atom> {
        let header = read_atom_header(stream, *bytes_available)?;
        trace!(typ = %header.typ, start = header.start, size = header.size, depth, "atom");

        let atom = match self.dispatch(&header, stream, context, depth) {
            Some(atom) => atom,
            None => {
                // an opaque atom reads nothing, a failed rewind here is
                // caught by the final seek below
                let _ = stream.seek_to(header.payload_offset());
                Atom::opaque(header)
            }
        };

        *bytes_available -= header.size;
        stream.seek_to(header.end())?;
        Ok(atom)
    }

    /// Construct a top-level atom. The budget is the rest of the stream, or
    /// unbounded if the stream size is unknown.
    pub fn construct_top_level(&self, stream: &mut dyn ByteStream) -> Result<Atom> {
        let mut available = top_level_budget(stream)?;
        self.construct(stream, &mut available, None)
    }

    /// Parse every top-level atom until the stream is exhausted.
    pub fn parse_all(&self, stream: &mut dyn ByteStream) -> Result<Vec<Atom>> {
        let mut available = top_level_budget(stream)?;
        let mut atoms = Vec::new();
        loop {
            match self.construct(stream, &mut available, None) {
                Ok(atom) => {
                    let to_end = atom.size() == 0;
                    atoms.push(atom);
                    if to_end {
                        break;
                    }
                }
                Err(e) if e.is_end_of_stream() => break,
                Err(e) => return Err(e),
            }
        }
        Ok(atoms)
    }

    /// Built-in table, then handlers. `None` means "keep it opaque".
    fn dispatch(
        &self,
        header: &AtomHeader,
        stream: &mut dyn ByteStream,
        context: Option<FourCC>,
        depth: usize,
    ) -> Option<Atom> {
        let built_in = if header.typ == RTP {
            if context == Some(HNTI) {
                Some(BuiltIn::Leaf(leaves::rtp_hint_info))
            } else {
                Some(BuiltIn::Nested(sample_entry::rtp_hint_entry))
            }
        } else {
            BUILT_INS.get(&header.typ).copied()
        };

        match built_in {
            Some(b) => match self.build(b, header, stream, depth) {
                Ok(Some(body)) => Some(Atom::new(*header, body)),
                Ok(None) => None,
                Err(e) => {
                    debug!(typ = %header.typ, start = header.start, error = %e, "kept as opaque atom");
                    None
                }
            },
            None => self.try_handlers(header, stream, context, depth),
        }
    }

    fn build(
        &self,
        built_in: BuiltIn,
        header: &AtomHeader,
        stream: &mut dyn ByteStream,
        depth: usize,
    ) -> Result<Option<AtomBody>> {
        match built_in {
            BuiltIn::Leaf(f) => {
                let mut payload = (&mut *stream).take(header.payload_size());
                Ok(f(header, &mut payload)?.map(AtomBody::Leaf))
            }
            BuiltIn::Nested(f) => f(header, stream, self, depth),
            BuiltIn::Container => Ok(Some(AtomBody::Container(ContainerAtom::expand(
                header, false, stream, self, depth,
            )?))),
            BuiltIn::FullContainer => Ok(Some(AtomBody::Container(ContainerAtom::expand(
                header, true, stream, self, depth,
            )?))),
        }
    }

    fn try_handlers(
        &self,
        header: &AtomHeader,
        stream: &mut dyn ByteStream,
        context: Option<FourCC>,
        depth: usize,
    ) -> Option<Atom> {
        for (i, handler) in self.handlers.iter().enumerate() {
            if i > 0 && stream.seek_to(header.payload_offset()).is_err() {
                return None;
            }
            match handler.try_create(header, stream, context, depth, self) {
                Ok(Some(mut atom)) => {
                    if atom.header != *header {
                        debug!(typ = %header.typ, handler = i, "handler header replaced by the resolved one");
                    }
                    atom.header = *header;
                    return Some(atom);
                }
                Ok(None) => {}
                Err(e) => debug!(typ = %header.typ, handler = i, error = %e, "type handler failed"),
            }
        }
        None
    }
}

fn top_level_budget(stream: &mut dyn ByteStream) -> Result<u64> {
    match stream.size() {
        Ok(total) if total > 0 => Ok(total.saturating_sub(stream.tell()?)),
        _ => Ok(u64::MAX),
    }
}
