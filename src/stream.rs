use std::io::{self, Read, Seek, SeekFrom};

/// Seekable byte source the atom factory reads from.
///
/// Big-endian integer reads come from [`byteorder::ReadBytesExt`], which is
/// available on every `ByteStream` through its `Read` supertrait. Implemented
/// for anything that is `Read + Seek` (`File`, `BufReader<File>`, `Cursor`).
pub trait ByteStream: Read {
    /// Current absolute offset.
    fn tell(&mut self) -> io::Result<u64>;

    fn seek_to(&mut self, offset: u64) -> io::Result<()>;

    /// Total stream length. An error means the length is unknown.
    fn size(&mut self) -> io::Result<u64>;
}

impl<T: Read + Seek> ByteStream for T {
    fn tell(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.seek(SeekFrom::Start(offset)).map(|_| ())
    }

    fn size(&mut self) -> io::Result<u64> {
        let pos = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        if end != pos {
            self.seek(SeekFrom::Start(pos))?;
        }
        Ok(end)
    }
}
