//! Built-in leaf constructors.
//!
//! Each constructor receives the resolved header and a reader bounded to the
//! atom's payload. It returns `Ok(None)` to decline (the factory then keeps
//! the atom as opaque), and read errors from a truncated payload are degraded
//! the same way. Sample tables with a declared entry count larger than the
//! payload keep the entries that are present instead of failing.

use crate::boxes::{AtomHeader, FourCC, FullHeader};
use crate::metadata::{DataAtom, LocalizedString};
use crate::parser::{read_full_header, FULL_HEADER_SIZE};
use crate::util::{c_string, lang_from_u16, read_all, serialize_hex};
use byteorder::{BigEndian, ReadBytesExt};
use serde::Serialize;
use std::io::{self, Read};
use tracing::debug;

/// Kind-specific fields of a parsed leaf atom.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafAtom {
    FileType(FileType),
    MovieHeader(MovieHeader),
    TrackHeader(TrackHeader),
    MediaHeader(MediaHeader),
    HandlerRef(HandlerRef),
    DataEntryUrl(DataEntryUrl),
    TimeToSample(TimeToSample),
    CompositionOffset(CompositionOffset),
    SampleToChunk(SampleToChunk),
    SampleSize(SampleSize),
    ChunkOffset(ChunkOffset),
    SyncSample(SyncSample),
    EsDescriptor(EsDescriptor),
    VideoMediaHeader(VideoMediaHeader),
    SoundMediaHeader(SoundMediaHeader),
    NullMediaHeader(FullHeader),
    HintMediaHeader(HintMediaHeader),
    OriginalFormat(FourCC),
    SchemeType(SchemeType),
    KmsUri(KmsUri),
    IsmaFormat(IsmaFormat),
    IsmaSalt(#[serde(serialize_with = "serialize_hex")] [u8; 8]),
    RtpHintInfo(RtpHintInfo),
    SdpText(String),
    Timescale(u32),
    TrackReference(Vec<u32>),
    Data(DataAtom),
    MetaString { full: FullHeader, value: String },
    LocalizedString(LocalizedString),
    /// Fields produced by an application-supplied type handler.
    Custom(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileType {
    pub major_brand: FourCC,
    pub minor_version: u32,
    pub compatible_brands: Vec<FourCC>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieHeader {
    pub full: FullHeader,
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    /// 16.16 fixed point
    pub rate: u32,
    /// 8.8 fixed point
    pub volume: u16,
    pub next_track_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackHeader {
    pub full: FullHeader,
    pub creation_time: u64,
    pub modification_time: u64,
    pub track_id: u32,
    pub duration: u64,
    pub layer: i16,
    pub alternate_group: i16,
    pub volume: u16,
    /// 16.16 fixed point
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaHeader {
    pub full: FullHeader,
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerRef {
    pub full: FullHeader,
    pub handler_type: FourCC,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataEntryUrl {
    pub full: FullHeader,
    /// `None` when the media data is in the same file.
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeToSample {
    pub full: FullHeader,
    pub entries: Vec<TimeToSampleEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeToSampleEntry {
    pub sample_count: u32,
    pub sample_delta: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionOffset {
    pub full: FullHeader,
    pub entries: Vec<CompositionOffsetEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompositionOffsetEntry {
    pub sample_count: u32,
    pub sample_offset: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleToChunk {
    pub full: FullHeader,
    pub entries: Vec<SampleToChunkEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SampleToChunkEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleSize {
    pub full: FullHeader,
    pub sample_size: u32,
    pub sample_count: u32,
    /// Empty when `sample_size` is non-zero.
    pub entry_sizes: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkOffset {
    pub full: FullHeader,
    pub offsets: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncSample {
    pub full: FullHeader,
    pub sample_numbers: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EsDescriptor {
    pub full: FullHeader,
    #[serde(serialize_with = "serialize_hex")]
    pub descriptor: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoMediaHeader {
    pub full: FullHeader,
    pub graphics_mode: u16,
    pub opcolor: [u16; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoundMediaHeader {
    pub full: FullHeader,
    pub balance: i16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HintMediaHeader {
    pub full: FullHeader,
    pub max_pdu_size: u16,
    pub avg_pdu_size: u16,
    pub max_bitrate: u32,
    pub avg_bitrate: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemeType {
    pub full: FullHeader,
    pub scheme_type: FourCC,
    pub scheme_version: u32,
    pub scheme_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KmsUri {
    pub full: FullHeader,
    pub kms_uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IsmaFormat {
    pub full: FullHeader,
    pub selective_encryption: bool,
    pub key_indicator_length: u8,
    pub iv_length: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RtpHintInfo {
    pub description_format: FourCC,
    pub sdp_text: String,
}

pub(crate) type LeafResult = io::Result<Option<LeafAtom>>;

/// Tables grow past this as entries are actually read.
const PREALLOC_LIMIT: usize = 4096;

/// Full header that only accepts the versions a constructor understands.
fn versioned(r: &mut dyn Read, h: &AtomHeader, max_version: u8) -> io::Result<Option<FullHeader>> {
    let full = read_full_header(r)?;
    if full.version > max_version {
        debug!(typ = %h.typ, version = full.version, "unsupported atom version");
        return Ok(None);
    }
    Ok(Some(full))
}

/// Number of entries actually present, given what the payload can hold.
fn entry_count(h: &AtomHeader, declared: u32, consumed: u64, entry_size: u64) -> usize {
    let present = h.payload_size().saturating_sub(consumed) / entry_size;
    if declared as u64 > present {
        debug!(typ = %h.typ, declared, present, "entry table truncated");
    }
    (declared as u64).min(present) as usize
}

fn read_u32_table(r: &mut dyn Read, count: usize) -> io::Result<Vec<u32>> {
    let mut v = Vec::with_capacity(count.min(PREALLOC_LIMIT));
    for _ in 0..count {
        v.push(r.read_u32::<BigEndian>()?);
    }
    Ok(v)
}

fn read_fourcc(r: &mut dyn Read) -> io::Result<FourCC> {
    Ok(FourCC::from_u32(r.read_u32::<BigEndian>()?))
}

/// `(creation, modification)` times for version 0 (32-bit) or 1 (64-bit).
fn read_times(r: &mut dyn Read, version: u8) -> io::Result<(u64, u64)> {
    if version == 1 {
        Ok((r.read_u64::<BigEndian>()?, r.read_u64::<BigEndian>()?))
    } else {
        Ok((r.read_u32::<BigEndian>()? as u64, r.read_u32::<BigEndian>()? as u64))
    }
}

fn read_duration(r: &mut dyn Read, version: u8) -> io::Result<u64> {
    if version == 1 {
        r.read_u64::<BigEndian>()
    } else {
        Ok(r.read_u32::<BigEndian>()? as u64)
    }
}

fn skip(r: &mut dyn Read, n: u64) -> io::Result<()> {
    let copied = io::copy(&mut (&mut *r).take(n), &mut io::sink())?;
    if copied < n {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}

// ---------- File / movie / track ----------

pub(crate) fn ftyp(h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    if h.payload_size() < 8 {
        return Ok(None);
    }
    let major_brand = read_fourcc(r)?;
    let minor_version = r.read_u32::<BigEndian>()?;
    let count = ((h.payload_size() - 8) / 4) as usize;
    let compatible_brands = read_u32_table(r, count)?
        .into_iter()
        .map(FourCC::from_u32)
        .collect();
    Ok(Some(LeafAtom::FileType(FileType {
        major_brand,
        minor_version,
        compatible_brands,
    })))
}

/// Versions 0 and 1.
pub(crate) fn mvhd(h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    let Some(full) = versioned(r, h, 1)? else {
        return Ok(None);
    };
    let (creation_time, modification_time) = read_times(r, full.version)?;
    let timescale = r.read_u32::<BigEndian>()?;
    let duration = read_duration(r, full.version)?;
    let rate = r.read_u32::<BigEndian>()?;
    let volume = r.read_u16::<BigEndian>()?;
    // reserved (10), matrix (36), pre_defined (24)
    skip(r, 10 + 36 + 24)?;
    let next_track_id = r.read_u32::<BigEndian>()?;
    Ok(Some(LeafAtom::MovieHeader(MovieHeader {
        full,
        creation_time,
        modification_time,
        timescale,
        duration,
        rate,
        volume,
        next_track_id,
    })))
}

/// Versions 0 and 1.
pub(crate) fn tkhd(h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    let Some(full) = versioned(r, h, 1)? else {
        return Ok(None);
    };
    let (creation_time, modification_time) = read_times(r, full.version)?;
    let track_id = r.read_u32::<BigEndian>()?;
    let _reserved = r.read_u32::<BigEndian>()?;
    let duration = read_duration(r, full.version)?;
    skip(r, 8)?;
    let layer = r.read_i16::<BigEndian>()?;
    let alternate_group = r.read_i16::<BigEndian>()?;
    let volume = r.read_u16::<BigEndian>()?;
    // reserved (2), matrix (36)
    skip(r, 2 + 36)?;
    let width = r.read_u32::<BigEndian>()?;
    let height = r.read_u32::<BigEndian>()?;
    Ok(Some(LeafAtom::TrackHeader(TrackHeader {
        full,
        creation_time,
        modification_time,
        track_id,
        duration,
        layer,
        alternate_group,
        volume,
        width,
        height,
    })))
}

/// Versions 0 and 1.
pub(crate) fn mdhd(h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    let Some(full) = versioned(r, h, 1)? else {
        return Ok(None);
    };
    let (creation_time, modification_time) = read_times(r, full.version)?;
    let timescale = r.read_u32::<BigEndian>()?;
    let duration = read_duration(r, full.version)?;
    let language = lang_from_u16(r.read_u16::<BigEndian>()?);
    Ok(Some(LeafAtom::MediaHeader(MediaHeader {
        full,
        creation_time,
        modification_time,
        timescale,
        duration,
        language,
    })))
}

pub(crate) fn hdlr(h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    let Some(full) = versioned(r, h, 0)? else {
        return Ok(None);
    };
    let _pre_defined = r.read_u32::<BigEndian>()?;
    let handler_type = read_fourcc(r)?;
    skip(r, 12)?;
    let raw = read_all(r)?;
    // QuickTime writes a counted string, ISO a NUL-terminated one
    let name = match raw.split_first() {
        Some((&len, rest)) if len as usize == rest.len() && len > 0 => c_string(rest),
        _ => c_string(&raw),
    };
    Ok(Some(LeafAtom::HandlerRef(HandlerRef {
        full,
        handler_type,
        name,
    })))
}

pub(crate) fn url(h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    let Some(full) = versioned(r, h, 0)? else {
        return Ok(None);
    };
    let location = if full.flags & 1 != 0 {
        None
    } else {
        Some(c_string(&read_all(r)?))
    };
    Ok(Some(LeafAtom::DataEntryUrl(DataEntryUrl { full, location })))
}

// ---------- Sample tables ----------

pub(crate) fn stts(h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    let Some(full) = versioned(r, h, 0)? else {
        return Ok(None);
    };
    let declared = r.read_u32::<BigEndian>()?;
    let count = entry_count(h, declared, FULL_HEADER_SIZE + 4, 8);
    let mut entries = Vec::with_capacity(count.min(PREALLOC_LIMIT));
    for _ in 0..count {
        entries.push(TimeToSampleEntry {
            sample_count: r.read_u32::<BigEndian>()?,
            sample_delta: r.read_u32::<BigEndian>()?,
        });
    }
    Ok(Some(LeafAtom::TimeToSample(TimeToSample { full, entries })))
}

/// Version 1 offsets are signed; version 0 ones are stored in the same bits.
pub(crate) fn ctts(h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    let Some(full) = versioned(r, h, 1)? else {
        return Ok(None);
    };
    let declared = r.read_u32::<BigEndian>()?;
    let count = entry_count(h, declared, FULL_HEADER_SIZE + 4, 8);
    let mut entries = Vec::with_capacity(count.min(PREALLOC_LIMIT));
    for _ in 0..count {
        entries.push(CompositionOffsetEntry {
            sample_count: r.read_u32::<BigEndian>()?,
            sample_offset: r.read_i32::<BigEndian>()?,
        });
    }
    Ok(Some(LeafAtom::CompositionOffset(CompositionOffset { full, entries })))
}

pub(crate) fn stsc(h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    let Some(full) = versioned(r, h, 0)? else {
        return Ok(None);
    };
    let declared = r.read_u32::<BigEndian>()?;
    let count = entry_count(h, declared, FULL_HEADER_SIZE + 4, 12);
    let mut entries = Vec::with_capacity(count.min(PREALLOC_LIMIT));
    for _ in 0..count {
        entries.push(SampleToChunkEntry {
            first_chunk: r.read_u32::<BigEndian>()?,
            samples_per_chunk: r.read_u32::<BigEndian>()?,
            sample_description_index: r.read_u32::<BigEndian>()?,
        });
    }
    Ok(Some(LeafAtom::SampleToChunk(SampleToChunk { full, entries })))
}

pub(crate) fn stsz(h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    let Some(full) = versioned(r, h, 0)? else {
        return Ok(None);
    };
    let sample_size = r.read_u32::<BigEndian>()?;
    let sample_count = r.read_u32::<BigEndian>()?;
    let entry_sizes = if sample_size == 0 {
        let count = entry_count(h, sample_count, FULL_HEADER_SIZE + 8, 4);
        read_u32_table(r, count)?
    } else {
        Vec::new()
    };
    Ok(Some(LeafAtom::SampleSize(SampleSize {
        full,
        sample_size,
        sample_count,
        entry_sizes,
    })))
}

pub(crate) fn stco(h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    let Some(full) = versioned(r, h, 0)? else {
        return Ok(None);
    };
    let declared = r.read_u32::<BigEndian>()?;
    let count = entry_count(h, declared, FULL_HEADER_SIZE + 4, 4);
    let offsets = read_u32_table(r, count)?;
    Ok(Some(LeafAtom::ChunkOffset(ChunkOffset { full, offsets })))
}

pub(crate) fn stss(h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    let Some(full) = versioned(r, h, 0)? else {
        return Ok(None);
    };
    let declared = r.read_u32::<BigEndian>()?;
    let count = entry_count(h, declared, FULL_HEADER_SIZE + 4, 4);
    let sample_numbers = read_u32_table(r, count)?;
    Ok(Some(LeafAtom::SyncSample(SyncSample { full, sample_numbers })))
}

// ---------- Media headers / descriptors ----------

/// The descriptor itself is kept raw.
pub(crate) fn esds(h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    let Some(full) = versioned(r, h, 0)? else {
        return Ok(None);
    };
    let descriptor = read_all(r)?;
    Ok(Some(LeafAtom::EsDescriptor(EsDescriptor { full, descriptor })))
}

pub(crate) fn vmhd(h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    let Some(full) = versioned(r, h, 0)? else {
        return Ok(None);
    };
    let graphics_mode = r.read_u16::<BigEndian>()?;
    let mut opcolor = [0u16; 3];
    r.read_u16_into::<BigEndian>(&mut opcolor)?;
    Ok(Some(LeafAtom::VideoMediaHeader(VideoMediaHeader {
        full,
        graphics_mode,
        opcolor,
    })))
}

pub(crate) fn smhd(h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    let Some(full) = versioned(r, h, 0)? else {
        return Ok(None);
    };
    let balance = r.read_i16::<BigEndian>()?;
    Ok(Some(LeafAtom::SoundMediaHeader(SoundMediaHeader { full, balance })))
}

pub(crate) fn nmhd(h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    Ok(versioned(r, h, 0)?.map(LeafAtom::NullMediaHeader))
}

pub(crate) fn hmhd(h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    let Some(full) = versioned(r, h, 0)? else {
        return Ok(None);
    };
    Ok(Some(LeafAtom::HintMediaHeader(HintMediaHeader {
        full,
        max_pdu_size: r.read_u16::<BigEndian>()?,
        avg_pdu_size: r.read_u16::<BigEndian>()?,
        max_bitrate: r.read_u32::<BigEndian>()?,
        avg_bitrate: r.read_u32::<BigEndian>()?,
    })))
}

// ---------- Protection ----------

pub(crate) fn frma(_h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    Ok(Some(LeafAtom::OriginalFormat(read_fourcc(r)?)))
}

pub(crate) fn schm(h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    let Some(full) = versioned(r, h, 0)? else {
        return Ok(None);
    };
    let scheme_type = read_fourcc(r)?;
    let scheme_version = r.read_u32::<BigEndian>()?;
    let scheme_uri = if full.flags & 1 != 0 {
        Some(c_string(&read_all(r)?))
    } else {
        None
    };
    Ok(Some(LeafAtom::SchemeType(SchemeType {
        full,
        scheme_type,
        scheme_version,
        scheme_uri,
    })))
}

pub(crate) fn ikms(h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    let Some(full) = versioned(r, h, 0)? else {
        return Ok(None);
    };
    let kms_uri = c_string(&read_all(r)?);
    Ok(Some(LeafAtom::KmsUri(KmsUri { full, kms_uri })))
}

pub(crate) fn isfm(h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    let Some(full) = versioned(r, h, 0)? else {
        return Ok(None);
    };
    let selective_encryption = r.read_u8()? & 0x80 != 0;
    let key_indicator_length = r.read_u8()?;
    let iv_length = r.read_u8()?;
    Ok(Some(LeafAtom::IsmaFormat(IsmaFormat {
        full,
        selective_encryption,
        key_indicator_length,
        iv_length,
    })))
}

pub(crate) fn islt(_h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    let mut salt = [0u8; 8];
    r.read_exact(&mut salt)?;
    Ok(Some(LeafAtom::IsmaSalt(salt)))
}

// ---------- Hint tracks ----------

/// `rtp ` inside `hnti`: SDP for the whole movie or track.
pub(crate) fn rtp_hint_info(_h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    let description_format = read_fourcc(r)?;
    let sdp_text = String::from_utf8_lossy(&read_all(r)?).into_owned();
    Ok(Some(LeafAtom::RtpHintInfo(RtpHintInfo {
        description_format,
        sdp_text,
    })))
}

pub(crate) fn sdp(_h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    Ok(Some(LeafAtom::SdpText(String::from_utf8_lossy(&read_all(r)?).into_owned())))
}

pub(crate) fn tims(_h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    Ok(Some(LeafAtom::Timescale(r.read_u32::<BigEndian>()?)))
}

/// Track reference entry: a flat list of track ids.
pub(crate) fn track_reference(h: &AtomHeader, r: &mut dyn Read) -> LeafResult {
    let count = (h.payload_size() / 4) as usize;
    Ok(Some(LeafAtom::TrackReference(read_u32_table(r, count)?)))
}
