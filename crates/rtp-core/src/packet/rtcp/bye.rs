use bytes::{Buf, BufMut, BytesMut};

use crate::error::Error;
use crate::{Result, RtpSsrc};

/// RTCP Goodbye (BYE) packet (RFC 3550 Section 6.6)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Goodbye {
    /// SSRC/CSRC identifiers leaving the session
    pub sources: Vec<RtpSsrc>,

    /// Optional reason for leaving
    pub reason: Option<String>,
}

impl Goodbye {
    /// Create a BYE for a single source
    pub fn new(ssrc: RtpSsrc) -> Self {
        Self {
            sources: vec![ssrc],
            reason: None,
        }
    }

    /// Create a BYE with a reason
    pub fn with_reason(ssrc: RtpSsrc, reason: String) -> Self {
        Self {
            sources: vec![ssrc],
            reason: Some(reason),
        }
    }

    /// Payload size in bytes, reason section padded to a 32-bit boundary
    pub fn size(&self) -> usize {
        let mut total = self.sources.len() * 4;
        if let Some(reason) = &self.reason {
            total += (1 + reason.len() + 3) & !3;
        }
        total
    }

    /// Serialize the packet payload
    pub fn serialize(&self) -> Result<BytesMut> {
        let mut buf = BytesMut::with_capacity(self.size());

        for ssrc in &self.sources {
            buf.put_u32(*ssrc);
        }

        if let Some(reason) = &self.reason {
            buf.put_u8(reason.len() as u8);
            buf.put_slice(reason.as_bytes());
            while buf.len() % 4 != 0 {
                buf.put_u8(0);
            }
        }

        Ok(buf)
    }
}

/// Parse a BYE payload with `source_count` SSRC entries.
///
/// `payload_len` is the declared payload length; anything beyond the SSRC
/// list is the optional length-prefixed reason.
pub fn parse_bye(buf: &mut impl Buf, source_count: u8, payload_len: usize) -> Result<Goodbye> {
    let ssrc_bytes = source_count as usize * 4;
    if buf.remaining() < ssrc_bytes {
        return Err(Error::BufferTooSmall {
            required: ssrc_bytes,
            available: buf.remaining(),
        });
    }

    let mut sources = Vec::with_capacity(source_count as usize);
    for _ in 0..source_count {
        sources.push(buf.get_u32());
    }

    let mut remaining = payload_len
        .checked_sub(ssrc_bytes)
        .ok_or_else(|| Error::BadFormat("BYE length shorter than SSRC list".to_string()))?;

    let reason = if remaining > 0 {
        if buf.remaining() < remaining {
            return Err(Error::BufferTooSmall {
                required: remaining,
                available: buf.remaining(),
            });
        }

        let len = buf.get_u8() as usize;
        remaining -= 1;
        if len > remaining {
            return Err(Error::BadFormat("BYE reason length exceeds packet".to_string()));
        }

        let mut value = vec![0u8; len];
        buf.copy_to_slice(&mut value);

        // Consume the padding up to the declared length
        for _ in 0..remaining - len {
            buf.get_u8();
        }

        Some(
            String::from_utf8(value)
                .map_err(|_| Error::BadFormat("BYE reason is not UTF-8".to_string()))?,
        )
    } else {
        None
    };

    Ok(Goodbye { sources, reason })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_with_reason() {
        let original = Goodbye::with_reason(0x1234_5678, "teardown".to_string());

        let serialized = original.serialize().unwrap();
        assert_eq!(serialized.len() % 4, 0);
        assert_eq!(serialized.len(), original.size());

        let len = serialized.len();
        let parsed = parse_bye(&mut serialized.freeze(), 1, len).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_round_trip_without_reason() {
        let original = Goodbye {
            sources: vec![1, 2, 3],
            reason: None,
        };

        let serialized = original.serialize().unwrap();
        assert_eq!(serialized.len(), 12);

        let parsed = parse_bye(&mut serialized.freeze(), 3, 12).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_reason_length_beyond_packet() {
        let mut buf = BytesMut::new();
        buf.put_u32(0x1234_5678);
        buf.put_u8(200); // declared reason far longer than the packet
        buf.put_u8(0);
        buf.put_u8(0);
        buf.put_u8(0);

        let result = parse_bye(&mut buf.freeze(), 1, 8);
        assert!(matches!(result, Err(Error::BadFormat(_))));
    }
}
