/// Holds the canonical bytes produced by one decode unit until the host has read them.
///
/// `cursor` never exceeds the length of the held bytes. The buffer is refilled only
/// once every byte has been consumed, so bytes come out in production order.
#[derive(Debug, Default)]
pub struct DecodeBuffer {
    bytes: Vec<u8>,
    cursor: usize,
}

impl DecodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            cursor: 0,
        }
    }

    /// Drops all held bytes and rewinds the cursor, keeping the allocation.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.cursor = 0;
    }

    /// Total bytes held, consumed or not.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes not yet handed out.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.bytes.len()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.bytes.reserve(additional);
    }

    pub fn push(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Copies up to `max_frames` whole frames into `dest` and returns how many were copied.
    ///
    /// A trailing fragment shorter than `frame_bytes` is discarded so that callers never
    /// see a partial frame.
    pub fn drain_frames(&mut self, dest: &mut [u8], frame_bytes: usize, max_frames: usize) -> usize {
        debug_assert!(frame_bytes > 0);
        let frames = (self.remaining() / frame_bytes)
            .min(max_frames)
            .min(dest.len() / frame_bytes);
        if frames == 0 {
            if self.remaining() < frame_bytes {
                self.cursor = self.bytes.len();
            }
            return 0;
        }
        let count = frames * frame_bytes;
        dest[..count].copy_from_slice(&self.bytes[self.cursor..self.cursor + count]);
        self.cursor += count;
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_whole_frames() {
        let mut buffer = DecodeBuffer::new();
        buffer.push_bytes(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut dest = [0u8; 6];
        assert_eq!(buffer.drain_frames(&mut dest, 4, 10), 1);
        assert_eq!(&dest[..4], &[1, 2, 3, 4]);
        assert_eq!(buffer.remaining(), 4);
        assert_eq!(buffer.drain_frames(&mut dest, 4, 10), 1);
        assert_eq!(&dest[..4], &[5, 6, 7, 8]);
        assert!(buffer.is_exhausted());
    }

    #[test]
    fn discards_trailing_fragment() {
        let mut buffer = DecodeBuffer::new();
        buffer.push_bytes(&[1, 2, 3]);
        let mut dest = [0u8; 8];
        assert_eq!(buffer.drain_frames(&mut dest, 4, 2), 0);
        assert!(buffer.is_exhausted());
    }

    #[test]
    fn clear_keeps_nothing() {
        let mut buffer = DecodeBuffer::with_capacity(16);
        buffer.push(7);
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.is_exhausted());
    }
}
