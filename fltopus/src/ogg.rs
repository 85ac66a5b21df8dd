//! Ogg container pages for a single logical bitstream.
//!
//! [`OggPacketReader`] reads pages in order, checks their CRC and reassembles
//! packets that span pages. [`OggPageWriter`] laces packets into pages and writes
//! them out with the right flags and granule positions.

use std::{
    collections::VecDeque,
    io::{self, Read, Seek, SeekFrom, Write},
};

use crate::error::OpusError;

const CAPTURE_PATTERN: &[u8; 4] = b"OggS";
const HEADER_LEN: usize = 27;
const MAX_SEGMENTS: usize = 255;
const TAIL_SCAN_BYTES: u64 = 64 * 1024;

const FLAG_CONTINUED: u8 = 0x01;
const FLAG_BOS: u8 = 0x02;
const FLAG_EOS: u8 = 0x04;

/// Granule value of a page on which no packet ends.
pub const NO_GRANULE: u64 = u64::MAX;

pub struct OggPacketReader<R> {
    reader: R,
    current_packet: Vec<u8>,
    queue: VecDeque<Vec<u8>>,
    finished: bool,
    stream_serial: Option<u32>,
}

impl<R: Read> OggPacketReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            current_packet: Vec::new(),
            queue: VecDeque::new(),
            finished: false,
            stream_serial: None,
        }
    }

    /// Returns the next complete packet, or `None` once the stream has ended.
    pub fn next_packet(&mut self) -> Result<Option<Vec<u8>>, OpusError> {
        loop {
            if let Some(packet) = self.queue.pop_front() {
                return Ok(Some(packet));
            }
            if self.finished {
                return Ok(None);
            }
            self.read_page()?;
        }
    }

    /// Fills `buf` completely. Returns false on a clean end of input before the first byte.
    fn read_exact_or_eof(&mut self, buf: &mut [u8]) -> Result<bool, OpusError> {
        let mut offset = 0;
        while offset < buf.len() {
            let n = self.reader.read(&mut buf[offset..])?;
            if n == 0 {
                return if offset == 0 {
                    Ok(false)
                } else {
                    Err(OpusError::Container("unexpected EOF while reading page".into()))
                };
            }
            offset += n;
        }
        Ok(true)
    }

    fn read_page(&mut self) -> Result<(), OpusError> {
        let mut header = [0u8; HEADER_LEN];
        if !self.read_exact_or_eof(&mut header)? {
            if !self.current_packet.is_empty() {
                return Err(OpusError::Container("stream ends inside a packet".into()));
            }
            self.finished = true;
            return Ok(());
        }

        if &header[0..4] != CAPTURE_PATTERN {
            return Err(OpusError::Container("invalid Ogg capture pattern".into()));
        }
        if header[4] != 0 {
            return Err(OpusError::Container("unsupported Ogg version".into()));
        }

        let header_type = header[5];
        let serial = u32::from_le_bytes([header[14], header[15], header[16], header[17]]);
        match self.stream_serial {
            Some(expected) if expected != serial => {
                return Err(OpusError::Container(
                    "multiple logical streams are not supported".into(),
                ));
            }
            Some(_) => {}
            None => self.stream_serial = Some(serial),
        }

        let mut segment_table = vec![0u8; header[26] as usize];
        if !self.read_exact_or_eof(&mut segment_table)? && !segment_table.is_empty() {
            return Err(OpusError::Container("truncated segment table".into()));
        }
        let data_len: usize = segment_table.iter().map(|&v| v as usize).sum();
        let mut data = vec![0u8; data_len];
        if !self.read_exact_or_eof(&mut data)? && data_len > 0 {
            return Err(OpusError::Container("truncated page body".into()));
        }

        let expected_crc = u32::from_le_bytes([header[22], header[23], header[24], header[25]]);
        let mut crc_header = header;
        crc_header[22..26].copy_from_slice(&[0, 0, 0, 0]);
        let mut crc = crc::update(0, &crc_header);
        crc = crc::update(crc, &segment_table);
        crc = crc::update(crc, &data);
        if crc != expected_crc {
            return Err(OpusError::Container(format!(
                "CRC32 mismatch: expected 0x{expected_crc:08x}, got 0x{crc:08x}"
            )));
        }

        if header_type & FLAG_CONTINUED != 0 && self.current_packet.is_empty() {
            return Err(OpusError::Container(
                "unexpected continuation flag without existing packet".into(),
            ));
        }
        if header_type & FLAG_CONTINUED == 0 && !self.current_packet.is_empty() {
            return Err(OpusError::Container(
                "dangling packet without continuation flag".into(),
            ));
        }

        let mut offset = 0;
        for &seg_len in &segment_table {
            let end = offset + seg_len as usize;
            self.current_packet.extend_from_slice(&data[offset..end]);
            offset = end;
            if seg_len < 255 {
                self.queue.push_back(std::mem::take(&mut self.current_packet));
            }
        }

        if header_type & FLAG_EOS != 0 && self.current_packet.is_empty() {
            self.finished = true;
        }
        Ok(())
    }
}

/// Finds the granule position of the last page that completes a packet.
///
/// Only the final [`TAIL_SCAN_BYTES`] of the input are examined.
pub fn last_granule<R: Read + Seek>(reader: &mut R) -> io::Result<Option<u64>> {
    let len = reader.seek(SeekFrom::End(0))?;
    let start = len.saturating_sub(TAIL_SCAN_BYTES);
    reader.seek(SeekFrom::Start(start))?;
    let mut tail = Vec::with_capacity((len - start) as usize);
    reader.take(len - start).read_to_end(&mut tail)?;

    let mut end = tail.len();
    while let Some(pos) = tail[..end].windows(4).rposition(|w| w == CAPTURE_PATTERN) {
        if pos + HEADER_LEN <= tail.len() && tail[pos + 4] == 0 {
            let mut granule = [0u8; 8];
            granule.copy_from_slice(&tail[pos + 6..pos + 14]);
            let granule = u64::from_le_bytes(granule);
            if granule != NO_GRANULE {
                return Ok(Some(granule));
            }
        }
        end = pos + 3;
        if end < 4 {
            break;
        }
    }
    Ok(None)
}

/// Laces packets into Ogg pages.
pub struct OggPageWriter<W> {
    sink: W,
    serial: u32,
    sequence: u32,
    lacing: Vec<u8>,
    body: Vec<u8>,
    page_granule: Option<u64>,
    last_granule: u64,
    first_page: bool,
    continued: bool,
}

impl<W: Write> OggPageWriter<W> {
    pub fn new(sink: W, serial: u32) -> Self {
        Self {
            sink,
            serial,
            sequence: 0,
            lacing: Vec::with_capacity(MAX_SEGMENTS),
            body: Vec::new(),
            page_granule: None,
            last_granule: 0,
            first_page: true,
            continued: false,
        }
    }

    /// Adds a packet ending at `granule` to the current page, spilling onto new
    /// pages when the segment table fills up.
    pub fn write_packet(&mut self, packet: &[u8], granule: u64) -> io::Result<()> {
        let mut offset = 0;
        loop {
            if self.lacing.len() == MAX_SEGMENTS {
                self.emit_page(false)?;
                self.continued = offset > 0;
            }
            let chunk = (packet.len() - offset).min(255);
            self.lacing.push(chunk as u8);
            self.body.extend_from_slice(&packet[offset..offset + chunk]);
            offset += chunk;
            if chunk < 255 {
                break;
            }
        }
        self.page_granule = Some(granule);
        self.last_granule = granule;
        Ok(())
    }

    /// Ends the current page. Does nothing if it holds no segments.
    pub fn flush_page(&mut self) -> io::Result<()> {
        self.emit_page(false)
    }

    /// Writes the final page with the end-of-stream flag and flushes the sink.
    pub fn finish(&mut self) -> io::Result<()> {
        self.emit_page(true)?;
        self.sink.flush()
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    fn emit_page(&mut self, eos: bool) -> io::Result<()> {
        if self.lacing.is_empty() && !eos {
            return Ok(());
        }

        let mut header_type = 0u8;
        if self.continued {
            header_type |= FLAG_CONTINUED;
        }
        if self.first_page {
            header_type |= FLAG_BOS;
        }
        if eos {
            header_type |= FLAG_EOS;
        }
        let granule = match self.page_granule.take() {
            Some(granule) => granule,
            None if eos => self.last_granule,
            None => NO_GRANULE,
        };

        let mut page = Vec::with_capacity(HEADER_LEN + self.lacing.len() + self.body.len());
        page.extend_from_slice(CAPTURE_PATTERN);
        page.push(0);
        page.push(header_type);
        page.extend_from_slice(&granule.to_le_bytes());
        page.extend_from_slice(&self.serial.to_le_bytes());
        page.extend_from_slice(&self.sequence.to_le_bytes());
        let crc_offset = page.len();
        page.extend_from_slice(&[0, 0, 0, 0]);
        page.push(self.lacing.len() as u8);
        page.extend_from_slice(&self.lacing);
        page.extend_from_slice(&self.body);

        let crc = crc::update(0, &page);
        page[crc_offset..crc_offset + 4].copy_from_slice(&crc.to_le_bytes());
        self.sink.write_all(&page)?;

        self.sequence += 1;
        self.first_page = false;
        self.continued = false;
        self.lacing.clear();
        self.body.clear();
        Ok(())
    }
}

/// Ogg CRC32: polynomial 0x04c11db7, initial value 0, no final XOR.
pub(crate) mod crc {
    const fn table_entry(idx: u32) -> u32 {
        let mut r: u32 = idx << 24;
        let mut i = 0;
        while i < 8 {
            r = (r << 1) ^ (-(((r >> 31) & 1) as i32) as u32 & 0x04c11db7);
            i += 1;
        }
        r
    }

    const fn lookup_table() -> [u32; 0x100] {
        let mut table = [0u32; 0x100];
        let mut i = 0;
        while i < 0x100 {
            table[i] = table_entry(i as u32);
            i += 1;
        }
        table
    }

    static TABLE: [u32; 0x100] = lookup_table();

    pub fn update(cur: u32, bytes: &[u8]) -> u32 {
        let mut crc = cur;
        for &b in bytes {
            crc = (crc << 8) ^ TABLE[((crc >> 24) ^ b as u32) as usize];
        }
        crc
    }
}
