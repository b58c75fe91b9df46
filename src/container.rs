use crate::boxes::{Atom, AtomHeader, ContainerAtom, FourCC, FullHeader, Preamble};
use crate::factory::AtomFactory;
use crate::parser::{read_full_header, AtomError, Result, BASIC_HEADER_SIZE, FULL_HEADER_SIZE};
use crate::stream::ByteStream;
use tracing::warn;

/// Deepest nesting level that still gets its children expanded. Top-level
/// atoms are at depth 0.
pub const MAX_DEPTH: usize = 64;

impl ContainerAtom {
    /// Expand a plain or full container whose header was just read.
    ///
    /// `depth` is the nesting level of the container itself. Only a missing
    /// or unreadable version/flags field fails the atom; problems in the
    /// children end the expansion early instead.
    pub fn expand(
        header: &AtomHeader,
        is_full: bool,
        stream: &mut dyn ByteStream,
        factory: &AtomFactory,
        depth: usize,
    ) -> Result<ContainerAtom> {
        if !is_full {
            return Ok(Self::with_preamble(header, None, Preamble::None, 0, stream, factory, depth));
        }
        if header.payload_size() < FULL_HEADER_SIZE {
            return Err(AtomError::InvalidFormat("full container too small"));
        }
        let full = read_full_header(stream)
            .map_err(|_| AtomError::InvalidFormat("unreadable full atom header"))?;
        Ok(Self::with_preamble(
            header,
            Some(full),
            Preamble::None,
            FULL_HEADER_SIZE,
            stream,
            factory,
            depth,
        ))
    }

    /// Expand the children that follow `consumed` bytes of type-specific
    /// fields the caller already read.
    pub fn with_preamble(
        header: &AtomHeader,
        full_header: Option<FullHeader>,
        preamble: Preamble,
        consumed: u64,
        stream: &mut dyn ByteStream,
        factory: &AtomFactory,
        depth: usize,
    ) -> ContainerAtom {
        let budget = header.payload_size().saturating_sub(consumed);
        ContainerAtom {
            full_header,
            preamble,
            children: expand_children(stream, budget, header.typ, factory, depth),
        }
    }
}

/// Construct children until fewer than 8 bytes of `budget` remain.
///
/// `parent` is handed down as the context of every child, which are built
/// at `depth + 1`. A child error stops the loop and keeps what was built so
/// far; a parent already at [`MAX_DEPTH`] gets no children at all.
pub fn expand_children(
    stream: &mut dyn ByteStream,
    mut budget: u64,
    parent: FourCC,
    factory: &AtomFactory,
    depth: usize,
) -> Vec<Atom> {
    let mut children = Vec::new();
    if depth >= MAX_DEPTH {
        if budget >= BASIC_HEADER_SIZE {
            warn!(%parent, depth, "nesting too deep, children skipped");
        }
        return children;
    }
    while budget >= BASIC_HEADER_SIZE {
        match factory.construct_at(stream, &mut budget, Some(parent), depth + 1) {
            Ok(child) => {
                // a child running to end of stream leaves nothing after it
                let to_end = child.size() == 0;
                children.push(child);
                if to_end {
                    break;
                }
            }
            Err(AtomError::EndOfStream) => break,
            Err(e) => {
                warn!(%parent, budget, error = %e, "child atom failed, container truncated");
                break;
            }
        }
    }
    children
}
