use bytes::{Buf, BufMut, BytesMut};

use crate::error::Error;
use crate::{Result, RtpSsrc};

/// Reception report block carried in RTCP SR/RR packets
/// (RFC 3550 Sections 6.4.1 and 6.4.2)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportBlock {
    /// SSRC of the source this report describes
    pub ssrc: RtpSsrc,

    /// Fraction of packets lost since the previous report (fixed point, 255 = 100%)
    pub fraction_lost: u8,

    /// Cumulative number of packets lost (24 bits on the wire)
    pub cumulative_lost: u32,

    /// Extended highest sequence number received
    pub highest_seq: u32,

    /// Interarrival jitter estimate
    pub jitter: u32,

    /// Middle 32 bits of the last SR timestamp from this source
    pub last_sr: u32,

    /// Delay since the last SR, in units of 1/65536 seconds
    pub delay_since_last_sr: u32,
}

impl ReportBlock {
    /// Wire size of a report block in bytes
    pub const SIZE: usize = 24;

    /// Create an empty report block for a source
    pub fn new(ssrc: RtpSsrc) -> Self {
        Self {
            ssrc,
            fraction_lost: 0,
            cumulative_lost: 0,
            highest_seq: 0,
            jitter: 0,
            last_sr: 0,
            delay_since_last_sr: 0,
        }
    }

    /// Parse a report block from a buffer
    pub fn parse(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < Self::SIZE {
            return Err(Error::BufferTooSmall {
                required: Self::SIZE,
                available: buf.remaining(),
            });
        }

        let ssrc = buf.get_u32();

        // Fraction lost (8 bits) followed by cumulative lost (24 bits)
        let fraction_lost = buf.get_u8();
        let cumulative_lost =
            (buf.get_u8() as u32) << 16 | (buf.get_u8() as u32) << 8 | buf.get_u8() as u32;

        Ok(Self {
            ssrc,
            fraction_lost,
            cumulative_lost,
            highest_seq: buf.get_u32(),
            jitter: buf.get_u32(),
            last_sr: buf.get_u32(),
            delay_since_last_sr: buf.get_u32(),
        })
    }

    /// Serialize the report block into a buffer
    pub fn serialize(&self, buf: &mut BytesMut) {
        buf.put_u32(self.ssrc);

        buf.put_u8(self.fraction_lost);
        buf.put_u8(((self.cumulative_lost >> 16) & 0xFF) as u8);
        buf.put_u8(((self.cumulative_lost >> 8) & 0xFF) as u8);
        buf.put_u8((self.cumulative_lost & 0xFF) as u8);

        buf.put_u32(self.highest_seq);
        buf.put_u32(self.jitter);
        buf.put_u32(self.last_sr);
        buf.put_u32(self.delay_since_last_sr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let original = ReportBlock {
            ssrc: 0x1234_5678,
            fraction_lost: 42,
            cumulative_lost: 0x00_C0_FF_EE & 0x00FF_FFFF,
            highest_seq: 5000,
            jitter: 100,
            last_sr: 0x8765_4321,
            delay_since_last_sr: 1500,
        };

        let mut buf = BytesMut::new();
        original.serialize(&mut buf);
        assert_eq!(buf.len(), ReportBlock::SIZE);

        let parsed = ReportBlock::parse(&mut buf.freeze()).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_too_short() {
        let mut buf = BytesMut::new();
        buf.put_u32(0x1234_5678);
        assert!(matches!(
            ReportBlock::parse(&mut buf.freeze()),
            Err(Error::BufferTooSmall { .. })
        ));
    }
}
