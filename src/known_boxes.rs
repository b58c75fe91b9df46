//! Type codes the factory and the metadata handler know about.

use crate::boxes::FourCC;

macro_rules! fourcc_consts {
    ($($name:ident = $code:expr;)*) => {
        $(pub const $name: FourCC = FourCC(*$code);)*
    };
}

fourcc_consts! {
    FTYP = b"ftyp";
    MOOV = b"moov";
    MVHD = b"mvhd";
    TRAK = b"trak";
    TKHD = b"tkhd";
    TREF = b"tref";
    EDTS = b"edts";
    MDIA = b"mdia";
    MDHD = b"mdhd";
    HDLR = b"hdlr";
    MINF = b"minf";
    VMHD = b"vmhd";
    SMHD = b"smhd";
    NMHD = b"nmhd";
    HMHD = b"hmhd";
    DINF = b"dinf";
    DREF = b"dref";
    URL = b"url ";
    STBL = b"stbl";
    STSD = b"stsd";
    STTS = b"stts";
    CTTS = b"ctts";
    STSC = b"stsc";
    STSZ = b"stsz";
    STCO = b"stco";
    STSS = b"stss";
    UDTA = b"udta";
    META = b"meta";
    ILST = b"ilst";
    MDAT = b"mdat";
    FREE = b"free";

    // sample entries
    MP4S = b"mp4s";
    MP4A = b"mp4a";
    MP4V = b"mp4v";
    AVC1 = b"avc1";
    ENCA = b"enca";
    ENCV = b"encv";
    DRMS = b"drms";
    DRMI = b"drmi";
    ESDS = b"esds";

    // protection
    SINF = b"sinf";
    FRMA = b"frma";
    SCHM = b"schm";
    SCHI = b"schi";
    IKMS = b"iKMS";
    ISFM = b"iSFM";
    ISLT = b"iSLT";

    // hint tracks
    HNTI = b"hnti";
    RTP = b"rtp ";
    SDP = b"sdp ";
    TIMS = b"tims";
    HINT = b"hint";

    // metadata
    DATA = b"data";
    MEAN = b"mean";
    NAME = b"name";
    FREEFORM = b"----";
}

/// Human-readable name for the dump tool.
pub fn full_name(typ: FourCC) -> Option<&'static str> {
    let name = match &typ.0 {
        b"ftyp" => "File Type Box",
        b"moov" => "Movie Box",
        b"mvhd" => "Movie Header Box",
        b"trak" => "Track Box",
        b"tkhd" => "Track Header Box",
        b"tref" => "Track Reference Box",
        b"edts" => "Edit Box",
        b"mdia" => "Media Box",
        b"mdhd" => "Media Header Box",
        b"hdlr" => "Handler Reference Box",
        b"minf" => "Media Information Box",
        b"vmhd" => "Video Media Header Box",
        b"smhd" => "Sound Media Header Box",
        b"nmhd" => "Null Media Header Box",
        b"hmhd" => "Hint Media Header Box",
        b"dinf" => "Data Information Box",
        b"dref" => "Data Reference Box",
        b"url " => "Data Entry URL Box",
        b"stbl" => "Sample Table Box",
        b"stsd" => "Sample Description Box",
        b"stts" => "Decoding Time to Sample Box",
        b"ctts" => "Composition Time to Sample Box",
        b"stsc" => "Sample To Chunk Box",
        b"stsz" => "Sample Size Box",
        b"stco" => "Chunk Offset Box",
        b"stss" => "Sync Sample Box",
        b"udta" => "User Data Box",
        b"meta" => "Meta Box",
        b"ilst" => "Item List Box",
        b"mdat" => "Media Data Box",
        b"free" => "Free Space Box",
        b"mp4s" => "MPEG-4 System Sample Entry",
        b"mp4a" => "MPEG-4 Audio Sample Entry",
        b"mp4v" => "MPEG-4 Visual Sample Entry",
        b"avc1" => "AVC Sample Entry",
        b"enca" => "Encrypted Audio Sample Entry",
        b"encv" => "Encrypted Video Sample Entry",
        b"drms" => "Protected Audio Sample Entry",
        b"drmi" => "Protected Video Sample Entry",
        b"esds" => "Elementary Stream Descriptor Box",
        b"sinf" => "Protection Scheme Information Box",
        b"frma" => "Original Format Box",
        b"schm" => "Scheme Type Box",
        b"schi" => "Scheme Information Box",
        b"iKMS" => "ISMACryp Key Management Box",
        b"iSFM" => "ISMACryp Sample Format Box",
        b"iSLT" => "ISMACryp Salt Box",
        b"hnti" => "Hint Track Information Box",
        b"rtp " => "RTP Hint Box",
        b"sdp " => "SDP Box",
        b"tims" => "RTP Timescale Box",
        b"hint" => "Hint Track Reference Box",
        b"data" => "Metadata Value Box",
        b"mean" => "Metadata Namespace Box",
        b"name" => "Metadata Name Box",
        _ => return None,
    };
    Some(name)
}
