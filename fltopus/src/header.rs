//! Identification and comment headers of an Ogg Opus stream.

use fltcore::TagMap;

use crate::error::OpusError;

const HEAD_MAGIC: &[u8; 8] = b"OpusHead";
const TAGS_MAGIC: &[u8; 8] = b"OpusTags";
const HEAD_LEN: usize = 19;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpusHead {
    pub version: u8,
    pub channels: u8,
    /// Frames at 48 kHz to discard from the start of the decoded stream.
    pub pre_skip: u16,
    /// Rate of the audio before encoding. Informational only.
    pub input_sample_rate: u32,
    /// Gain in Q7.8 dB applied when decoding.
    pub output_gain: i16,
    pub mapping_family: u8,
    /// Stream layout, present for every family except 0.
    pub mapping: Option<ChannelMapping>,
}

/// How the Opus streams of a packet map onto output channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMapping {
    pub stream_count: u8,
    /// Streams carrying two channels. They come first.
    pub coupled_count: u8,
    /// Decoded channel index for each output channel, 255 for silence.
    pub table: Vec<u8>,
}

impl ChannelMapping {
    fn parse(data: &[u8], channels: u8) -> Result<Self, OpusError> {
        let tail = data
            .get(..2 + usize::from(channels))
            .ok_or_else(|| OpusError::Header("OpusHead channel mapping truncated".into()))?;
        let (stream_count, coupled_count) = (tail[0], tail[1]);
        if stream_count == 0 || coupled_count > stream_count {
            return Err(OpusError::Header(format!(
                "invalid stream counts: {stream_count} streams, {coupled_count} coupled"
            )));
        }
        let decoded = u16::from(stream_count) + u16::from(coupled_count);
        let table = tail[2..].to_vec();
        if let Some(bad) = table.iter().find(|&&i| i != 255 && u16::from(i) >= decoded) {
            return Err(OpusError::Header(format!(
                "channel mapping entry {bad} exceeds {decoded} decoded channels"
            )));
        }
        Ok(Self {
            stream_count,
            coupled_count,
            table,
        })
    }
}

impl OpusHead {
    pub fn parse(data: &[u8]) -> Result<Self, OpusError> {
        if data.len() < HEAD_LEN {
            return Err(OpusError::Header("OpusHead packet too short".into()));
        }
        if &data[0..8] != HEAD_MAGIC {
            return Err(OpusError::Header("invalid OpusHead signature".into()));
        }
        let version = data[8];
        if version == 0 || version > 15 {
            return Err(OpusError::Header(format!(
                "unsupported Opus version: {version}"
            )));
        }
        let channels = data[9];
        if channels == 0 {
            return Err(OpusError::Header("Opus channel count must be > 0".into()));
        }
        let mapping_family = data[18];
        let mapping = match mapping_family {
            0 if channels > 2 => {
                return Err(OpusError::Header(format!(
                    "mapping family 0 cannot carry {channels} channels"
                )));
            }
            0 => None,
            _ => Some(ChannelMapping::parse(&data[HEAD_LEN..], channels)?),
        };

        Ok(Self {
            version,
            channels,
            pre_skip: u16::from_le_bytes([data[10], data[11]]),
            input_sample_rate: u32::from_le_bytes([data[12], data[13], data[14], data[15]]),
            output_gain: i16::from_le_bytes([data[16], data[17]]),
            mapping_family,
            mapping,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(HEAD_LEN);
        data.extend_from_slice(HEAD_MAGIC);
        data.push(self.version);
        data.push(self.channels);
        data.extend_from_slice(&self.pre_skip.to_le_bytes());
        data.extend_from_slice(&self.input_sample_rate.to_le_bytes());
        data.extend_from_slice(&self.output_gain.to_le_bytes());
        data.push(self.mapping_family);
        if let Some(mapping) = &self.mapping {
            data.push(mapping.stream_count);
            data.push(mapping.coupled_count);
            data.extend_from_slice(&mapping.table);
        }
        data
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpusTags {
    pub vendor: String,
    /// Raw `NAME=value` comments in stream order.
    pub comments: Vec<String>,
}

impl OpusTags {
    pub fn new(vendor: impl Into<String>, tags: &TagMap) -> Self {
        Self {
            vendor: vendor.into(),
            comments: tags
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect(),
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self, OpusError> {
        if data.len() < 8 || &data[0..8] != TAGS_MAGIC {
            return Err(OpusError::Header("invalid OpusTags header".into()));
        }
        let mut cursor = FieldCursor { data, pos: 8 };
        let vendor = cursor.string()?;
        let count = cursor.u32()?;
        let mut comments = Vec::new();
        for _ in 0..count {
            comments.push(cursor.string()?);
        }
        Ok(Self { vendor, comments })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(TAGS_MAGIC);
        data.extend_from_slice(&(self.vendor.len() as u32).to_le_bytes());
        data.extend_from_slice(self.vendor.as_bytes());
        data.extend_from_slice(&(self.comments.len() as u32).to_le_bytes());
        for comment in &self.comments {
            data.extend_from_slice(&(comment.len() as u32).to_le_bytes());
            data.extend_from_slice(comment.as_bytes());
        }
        data
    }

    /// Collects comments into a tag map. Comments without a name or value are skipped.
    pub fn tag_map(&self) -> TagMap {
        let mut tags = TagMap::new();
        for comment in &self.comments {
            match comment.split_once('=') {
                Some((name, value)) if !value.is_empty() => {
                    tags.insert(name, value);
                }
                _ => {}
            }
        }
        tags
    }
}

struct FieldCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl FieldCursor<'_> {
    fn u32(&mut self) -> Result<u32, OpusError> {
        let bytes = self
            .data
            .get(self.pos..self.pos + 4)
            .ok_or_else(|| OpusError::Header("OpusTags packet truncated".into()))?;
        self.pos += 4;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn string(&mut self) -> Result<String, OpusError> {
        let len = self.u32()? as usize;
        let bytes = self
            .pos
            .checked_add(len)
            .and_then(|end| self.data.get(self.pos..end))
            .ok_or_else(|| OpusError::Header("OpusTags field exceeds packet".into()))?;
        self.pos += len;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_round_trips() {
        let head = OpusHead {
            version: 1,
            channels: 2,
            pre_skip: 312,
            input_sample_rate: 44_100,
            output_gain: -256,
            mapping_family: 0,
            mapping: None,
        };
        assert_eq!(OpusHead::parse(&head.to_bytes()).unwrap(), head);
    }

    #[test]
    fn surround_head_carries_its_mapping() {
        let head = OpusHead {
            version: 1,
            channels: 6,
            pre_skip: 312,
            input_sample_rate: 48_000,
            output_gain: 0,
            mapping_family: 1,
            mapping: Some(ChannelMapping {
                stream_count: 4,
                coupled_count: 2,
                table: vec![0, 4, 1, 2, 3, 5],
            }),
        };
        let bytes = head.to_bytes();
        assert_eq!(bytes.len(), HEAD_LEN + 2 + 6);
        assert_eq!(OpusHead::parse(&bytes).unwrap(), head);

        assert!(OpusHead::parse(&bytes[..bytes.len() - 1]).is_err());
        let mut bad = bytes.clone();
        bad[HEAD_LEN + 2] = 6;
        assert!(OpusHead::parse(&bad).is_err());
        bad[HEAD_LEN + 2] = 255;
        assert!(OpusHead::parse(&bad).is_ok());
    }

    #[test]
    fn family_zero_is_at_most_stereo() {
        let mut bytes = OpusHead {
            version: 1,
            channels: 2,
            pre_skip: 0,
            input_sample_rate: 0,
            output_gain: 0,
            mapping_family: 0,
            mapping: None,
        }
        .to_bytes();
        bytes[9] = 3;
        assert!(OpusHead::parse(&bytes).is_err());
    }

    #[test]
    fn head_rejects_bad_input() {
        assert!(OpusHead::parse(b"OpusHead").is_err());
        let mut bytes = OpusHead {
            version: 1,
            channels: 0,
            pre_skip: 0,
            input_sample_rate: 0,
            output_gain: 0,
            mapping_family: 0,
            mapping: None,
        }
        .to_bytes();
        assert!(OpusHead::parse(&bytes).is_err());
        bytes[9] = 1;
        bytes[8] = 0;
        assert!(OpusHead::parse(&bytes).is_err());
    }

    #[test]
    fn tags_keep_first_value_and_skip_empty() {
        let tags = OpusTags {
            vendor: "libopus".into(),
            comments: vec![
                "title=One".into(),
                "TITLE=Two".into(),
                "ARTIST=".into(),
                "garbage".into(),
            ],
        };
        let parsed = OpusTags::parse(&tags.to_bytes()).unwrap();
        assert_eq!(parsed, tags);
        let map = parsed.tag_map();
        assert_eq!(map.get("TITLE"), Some("One"));
        assert_eq!(map.get("ARTIST"), None);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn truncated_tags_fail() {
        let mut bytes = OpusTags::new("v", &TagMap::new()).to_bytes();
        bytes.truncate(bytes.len() - 2);
        assert!(OpusTags::parse(&bytes).is_err());
    }
}
