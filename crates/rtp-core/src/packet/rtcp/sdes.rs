use bytes::{Buf, BufMut, BytesMut};

use crate::error::Error;
use crate::{Result, RtpSsrc};

/// RTCP Source Description (SDES) item types (RFC 3550 Section 6.5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SdesItemType {
    /// End of SDES item list
    End = 0,

    /// Canonical name (CNAME)
    CName = 1,

    /// User name (NAME)
    Name = 2,

    /// E-mail address (EMAIL)
    Email = 3,

    /// Phone number (PHONE)
    Phone = 4,

    /// Geographic location (LOC)
    Location = 5,

    /// Application or tool name (TOOL)
    Tool = 6,

    /// Notice/status (NOTE)
    Note = 7,

    /// Private extensions (PRIV)
    Private = 8,
}

impl TryFrom<u8> for SdesItemType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(SdesItemType::End),
            1 => Ok(SdesItemType::CName),
            2 => Ok(SdesItemType::Name),
            3 => Ok(SdesItemType::Email),
            4 => Ok(SdesItemType::Phone),
            5 => Ok(SdesItemType::Location),
            6 => Ok(SdesItemType::Tool),
            7 => Ok(SdesItemType::Note),
            8 => Ok(SdesItemType::Private),
            _ => Err(Error::BadFormat(format!("Unknown SDES item type: {}", value))),
        }
    }
}

/// A single SDES item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdesItem {
    /// Item type
    pub item_type: SdesItemType,

    /// Item value
    pub value: String,
}

impl SdesItem {
    /// Create a new SDES item
    pub fn new(item_type: SdesItemType, value: String) -> Self {
        Self { item_type, value }
    }

    /// Create a CNAME item
    pub fn cname(value: String) -> Self {
        Self::new(SdesItemType::CName, value)
    }

    /// Create a TOOL item
    pub fn tool(value: String) -> Self {
        Self::new(SdesItemType::Tool, value)
    }
}

/// An SDES chunk: one SSRC plus its item list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdesChunk {
    /// SSRC/CSRC identifier
    pub ssrc: RtpSsrc,

    /// SDES items
    pub items: Vec<SdesItem>,
}

impl SdesChunk {
    /// Create a new chunk
    pub fn new(ssrc: RtpSsrc) -> Self {
        Self {
            ssrc,
            items: Vec::new(),
        }
    }

    /// Add an item
    pub fn add_item(&mut self, item: SdesItem) {
        self.items.push(item);
    }

    /// Whether the chunk carries a CNAME item
    pub fn has_cname(&self) -> bool {
        self.items
            .iter()
            .any(|item| item.item_type == SdesItemType::CName)
    }
}

/// RTCP Source Description packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescription {
    /// SDES chunks
    pub chunks: Vec<SdesChunk>,
}

impl SourceDescription {
    /// Create an empty SDES packet
    pub fn new() -> Self {
        Self { chunks: Vec::new() }
    }

    /// Add a chunk
    pub fn add_chunk(&mut self, chunk: SdesChunk) {
        self.chunks.push(chunk);
    }

    /// Add a source with a CNAME item
    pub fn add_source(&mut self, ssrc: RtpSsrc, cname: String) {
        let mut chunk = SdesChunk::new(ssrc);
        chunk.add_item(SdesItem::cname(cname));
        self.add_chunk(chunk);
    }

    /// Find the CNAME for a source
    pub fn find_cname(&self, ssrc: RtpSsrc) -> Option<&str> {
        self.chunks
            .iter()
            .find(|chunk| chunk.ssrc == ssrc)?
            .items
            .iter()
            .find(|item| item.item_type == SdesItemType::CName)
            .map(|item| item.value.as_str())
    }

    /// Payload size in bytes, each chunk padded to a 32-bit boundary
    pub fn size(&self) -> usize {
        let mut total = 0;
        for chunk in &self.chunks {
            let mut chunk_size = 4;
            for item in &chunk.items {
                chunk_size += 2 + item.value.len();
            }
            // END octet plus padding to the next word boundary
            chunk_size += 1;
            total += (chunk_size + 3) & !3;
        }
        total
    }

    /// Serialize the packet payload
    pub fn serialize(&self) -> Result<BytesMut> {
        let mut buf = BytesMut::with_capacity(self.size());

        for chunk in &self.chunks {
            buf.put_u32(chunk.ssrc);

            for item in &chunk.items {
                buf.put_u8(item.item_type as u8);
                buf.put_u8(item.value.len() as u8);
                buf.put_slice(item.value.as_bytes());
            }

            buf.put_u8(SdesItemType::End as u8);
            while buf.len() % 4 != 0 {
                buf.put_u8(0);
            }
        }

        Ok(buf)
    }
}

impl Default for SourceDescription {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse an SDES payload containing `chunk_count` chunks.
///
/// Every chunk must carry a CNAME item (RFC 3550 Section 6.5); a chunk
/// without one is rejected as malformed.
pub fn parse_sdes(buf: &mut impl Buf, chunk_count: u8) -> Result<SourceDescription> {
    let mut chunks = Vec::with_capacity(chunk_count as usize);

    for _ in 0..chunk_count {
        if buf.remaining() < 4 {
            return Err(Error::BufferTooSmall {
                required: 4,
                available: buf.remaining(),
            });
        }

        let ssrc = buf.get_u32();
        let mut chunk = SdesChunk::new(ssrc);
        let mut consumed = 0usize;

        loop {
            if buf.remaining() < 1 {
                return Err(Error::BadFormat("SDES chunk missing END item".to_string()));
            }
            let item_type = buf.get_u8();
            consumed += 1;

            if item_type == SdesItemType::End as u8 {
                break;
            }

            let item_type = SdesItemType::try_from(item_type)?;

            if buf.remaining() < 1 {
                return Err(Error::BadFormat("SDES item missing length".to_string()));
            }
            let len = buf.get_u8() as usize;
            consumed += 1;

            if buf.remaining() < len {
                return Err(Error::BufferTooSmall {
                    required: len,
                    available: buf.remaining(),
                });
            }
            let mut value = vec![0u8; len];
            buf.copy_to_slice(&mut value);
            consumed += len;

            let value = String::from_utf8(value)
                .map_err(|_| Error::BadFormat("SDES item value is not UTF-8".to_string()))?;
            chunk.add_item(SdesItem::new(item_type, value));
        }

        // Items are padded so the chunk ends on a word boundary
        while consumed % 4 != 0 {
            if buf.remaining() < 1 {
                return Err(Error::BadFormat("SDES chunk padding truncated".to_string()));
            }
            buf.get_u8();
            consumed += 1;
        }

        if !chunk.has_cname() {
            return Err(Error::BadFormat(format!(
                "SDES chunk for SSRC {:#010x} has no CNAME item",
                ssrc
            )));
        }

        chunks.push(chunk);
    }

    Ok(SourceDescription { chunks })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut original = SourceDescription::new();
        let mut chunk = SdesChunk::new(0x1234_5678);
        chunk.add_item(SdesItem::cname("user@example.com".to_string()));
        chunk.add_item(SdesItem::tool("crosstalk".to_string()));
        original.add_chunk(chunk);
        original.add_source(0xabcd_ef01, "peer@example.com".to_string());

        let serialized = original.serialize().unwrap();
        assert_eq!(serialized.len() % 4, 0);

        let parsed = parse_sdes(&mut serialized.freeze(), 2).unwrap();
        assert_eq!(parsed, original);
        assert_eq!(parsed.find_cname(0xabcd_ef01), Some("peer@example.com"));
    }

    #[test]
    fn test_chunk_without_cname_rejected() {
        let mut sdes = SourceDescription::new();
        let mut chunk = SdesChunk::new(0x1234_5678);
        chunk.add_item(SdesItem::tool("crosstalk".to_string()));
        sdes.add_chunk(chunk);

        let serialized = sdes.serialize().unwrap();
        let result = parse_sdes(&mut serialized.freeze(), 1);
        assert!(matches!(result, Err(Error::BadFormat(_))));
    }

    #[test]
    fn test_size_is_word_aligned() {
        let mut sdes = SourceDescription::new();
        sdes.add_source(1, "a".to_string());
        assert_eq!(sdes.size() % 4, 0);
        assert_eq!(sdes.size(), sdes.serialize().unwrap().len());
    }
}
