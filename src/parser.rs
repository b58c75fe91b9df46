use crate::boxes::{AtomHeader, FourCC, FullHeader};
use crate::stream::ByteStream;
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{self, Read};

#[derive(thiserror::Error, Debug)]
pub enum AtomError {
    /// Fewer than 8 bytes left in the budget. Usually just the end of input.
    #[error("end of stream")]
    EndOfStream,
    #[error("invalid atom format: {0}")]
    InvalidFormat(&'static str),
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

impl AtomError {
    /// True for a clean end of input: an exhausted budget, or a header read
    /// that hit EOF because the caller's budget was unbounded.
    pub fn is_end_of_stream(&self) -> bool {
        match self {
            AtomError::EndOfStream => true,
            AtomError::Io(e) => e.kind() == io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AtomError>;

pub const BASIC_HEADER_SIZE: u64 = 8;
pub const LARGE_HEADER_SIZE: u64 = 16;
pub const FULL_HEADER_SIZE: u64 = 4;

/// Parse and validate an atom header at the current position.
///
/// On any failure the cursor is moved back to where it was on entry.
pub fn read_atom_header(stream: &mut dyn ByteStream, bytes_available: u64) -> Result<AtomHeader> {
    if bytes_available < BASIC_HEADER_SIZE {
        return Err(AtomError::EndOfStream);
    }
    let start = stream.tell()?;
    read_header_at(stream, start, bytes_available).inspect_err(|_| {
        // the original error matters more than a failed rewind
        let _ = stream.seek_to(start);
    })
}

fn read_header_at(stream: &mut dyn ByteStream, start: u64, bytes_available: u64) -> Result<AtomHeader> {
    let size32 = stream.read_u32::<BigEndian>()?;
    let typ = FourCC::from_u32(stream.read_u32::<BigEndian>()?);

    let (size, header_size) = match size32 {
        0 => {
            // extends to end of stream; unknown stream size resolves to 0
            let size = match stream.size() {
                Ok(total) if total >= start => total - start,
                _ => 0,
            };
            (size, BASIC_HEADER_SIZE)
        }
        1 => {
            if bytes_available < LARGE_HEADER_SIZE {
                return Err(AtomError::InvalidFormat("no room for 64-bit size"));
            }
            let high = stream.read_u32::<BigEndian>()?;
            let low = stream.read_u32::<BigEndian>()?;
            if high != 0 {
                return Err(AtomError::Unsupported("atom size above 4 GiB"));
            }
            (low as u64, LARGE_HEADER_SIZE)
        }
        n => (n as u64, BASIC_HEADER_SIZE),
    };

    if size > 0 && size < BASIC_HEADER_SIZE {
        return Err(AtomError::InvalidFormat("atom size smaller than header"));
    }
    if size > bytes_available {
        return Err(AtomError::InvalidFormat("atom size exceeds available bytes"));
    }

    Ok(AtomHeader { typ, size, header_size, start })
}

pub fn read_full_header<R: Read + ?Sized>(r: &mut R) -> io::Result<FullHeader> {
    let version = r.read_u8()?;
    let flags = r.read_u24::<BigEndian>()?;
    Ok(FullHeader { version, flags })
}
