//! Sample description entries (`stsd` children) and the `stsd`/`dref`
//! tables themselves. All of them carry a few fixed fields followed by child
//! atoms, so they are built as containers with a [`Preamble`].

use crate::boxes::{AtomBody, AtomHeader, ContainerAtom, Preamble};
use crate::factory::AtomFactory;
use crate::parser::{read_full_header, Result, FULL_HEADER_SIZE};
use crate::stream::ByteStream;
use crate::util::c_string;
use byteorder::{BigEndian, ReadBytesExt};
use serde::Serialize;
use std::io::Read;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleEntry {
    pub data_reference_index: u16,
    pub fields: SampleEntryFields,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleEntryFields {
    /// `mp4s`: nothing beyond the common fields.
    System,
    Visual(VisualFields),
    Audio(AudioFields),
    RtpHint(RtpHintFields),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualFields {
    pub width: u16,
    pub height: u16,
    /// 16.16 fixed point dpi
    pub horizontal_resolution: u32,
    pub vertical_resolution: u32,
    pub frame_count: u16,
    pub compressor_name: String,
    pub depth: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioFields {
    pub channel_count: u16,
    pub sample_size: u16,
    /// 16.16 fixed point
    pub sample_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RtpHintFields {
    pub hint_track_version: u16,
    pub highest_compatible_version: u16,
    pub max_packet_size: u32,
}

const COMMON_SIZE: u64 = 8;
const VISUAL_SIZE: u64 = 70;
const AUDIO_SIZE: u64 = 20;
const RTP_HINT_SIZE: u64 = 8;

#[derive(Clone, Copy)]
enum EntryKind {
    System,
    Visual,
    Audio,
    RtpHint,
}

impl EntryKind {
    fn fields_size(self) -> u64 {
        match self {
            EntryKind::System => 0,
            EntryKind::Visual => VISUAL_SIZE,
            EntryKind::Audio => AUDIO_SIZE,
            EntryKind::RtpHint => RTP_HINT_SIZE,
        }
    }
}

fn read_visual(r: &mut dyn Read) -> std::io::Result<VisualFields> {
    // pre_defined (2), reserved (2), pre_defined (12)
    let mut skip = [0u8; 16];
    r.read_exact(&mut skip)?;
    let width = r.read_u16::<BigEndian>()?;
    let height = r.read_u16::<BigEndian>()?;
    let horizontal_resolution = r.read_u32::<BigEndian>()?;
    let vertical_resolution = r.read_u32::<BigEndian>()?;
    let _reserved = r.read_u32::<BigEndian>()?;
    let frame_count = r.read_u16::<BigEndian>()?;
    let mut name = [0u8; 32];
    r.read_exact(&mut name)?;
    let len = (name[0] as usize).min(31);
    let compressor_name = c_string(&name[1..1 + len]);
    let depth = r.read_u16::<BigEndian>()?;
    let _pre_defined = r.read_i16::<BigEndian>()?;
    Ok(VisualFields {
        width,
        height,
        horizontal_resolution,
        vertical_resolution,
        frame_count,
        compressor_name,
        depth,
    })
}

fn read_audio(r: &mut dyn Read) -> std::io::Result<AudioFields> {
    // version, revision, vendor
    let mut skip = [0u8; 8];
    r.read_exact(&mut skip)?;
    let channel_count = r.read_u16::<BigEndian>()?;
    let sample_size = r.read_u16::<BigEndian>()?;
    let _compression_id = r.read_u16::<BigEndian>()?;
    let _packet_size = r.read_u16::<BigEndian>()?;
    let sample_rate = r.read_u32::<BigEndian>()?;
    Ok(AudioFields {
        channel_count,
        sample_size,
        sample_rate,
    })
}

/// Declines entries too small for their fixed fields; everything after the
/// fields is expanded as child atoms.
fn sample_entry(
    kind: EntryKind,
    header: &AtomHeader,
    stream: &mut dyn ByteStream,
    factory: &AtomFactory,
    depth: usize,
) -> Result<Option<AtomBody>> {
    let fixed = COMMON_SIZE + kind.fields_size();
    if header.payload_size() < fixed {
        debug!(typ = %header.typ, "sample entry shorter than its fixed fields");
        return Ok(None);
    }

    let mut r = (&mut *stream).take(fixed);
    let mut reserved = [0u8; 6];
    r.read_exact(&mut reserved)?;
    let data_reference_index = r.read_u16::<BigEndian>()?;
    let fields = match kind {
        EntryKind::System => SampleEntryFields::System,
        EntryKind::Visual => SampleEntryFields::Visual(read_visual(&mut r)?),
        EntryKind::Audio => SampleEntryFields::Audio(read_audio(&mut r)?),
        EntryKind::RtpHint => SampleEntryFields::RtpHint(RtpHintFields {
            hint_track_version: r.read_u16::<BigEndian>()?,
            highest_compatible_version: r.read_u16::<BigEndian>()?,
            max_packet_size: r.read_u32::<BigEndian>()?,
        }),
    };

    let preamble = Preamble::SampleEntry(SampleEntry {
        data_reference_index,
        fields,
    });
    Ok(Some(AtomBody::Container(ContainerAtom::with_preamble(
        header, None, preamble, fixed, stream, factory, depth,
    ))))
}

pub(crate) fn system_entry(h: &AtomHeader, s: &mut dyn ByteStream, f: &AtomFactory, depth: usize) -> Result<Option<AtomBody>> {
    sample_entry(EntryKind::System, h, s, f, depth)
}

pub(crate) fn visual_entry(h: &AtomHeader, s: &mut dyn ByteStream, f: &AtomFactory, depth: usize) -> Result<Option<AtomBody>> {
    sample_entry(EntryKind::Visual, h, s, f, depth)
}

pub(crate) fn audio_entry(h: &AtomHeader, s: &mut dyn ByteStream, f: &AtomFactory, depth: usize) -> Result<Option<AtomBody>> {
    sample_entry(EntryKind::Audio, h, s, f, depth)
}

/// `rtp ` anywhere but under `hnti`.
pub(crate) fn rtp_hint_entry(h: &AtomHeader, s: &mut dyn ByteStream, f: &AtomFactory, depth: usize) -> Result<Option<AtomBody>> {
    sample_entry(EntryKind::RtpHint, h, s, f, depth)
}

/// `stsd` and `dref`: version 0 full header and an entry count, then the
/// entries as children. The count is informational; the children are
/// whatever fits in the payload.
pub(crate) fn entry_table(
    header: &AtomHeader,
    stream: &mut dyn ByteStream,
    factory: &AtomFactory,
    depth: usize,
) -> Result<Option<AtomBody>> {
    if header.payload_size() < FULL_HEADER_SIZE + 4 {
        return Ok(None);
    }
    let full = read_full_header(stream)?;
    if full.version != 0 {
        debug!(typ = %header.typ, version = full.version, "unsupported atom version");
        return Ok(None);
    }
    let entry_count = stream.read_u32::<BigEndian>()?;
    Ok(Some(AtomBody::Container(ContainerAtom::with_preamble(
        header,
        Some(full),
        Preamble::EntryCount(entry_count),
        FULL_HEADER_SIZE + 4,
        stream,
        factory,
        depth,
    ))))
}
