use bytes::{Buf, BufMut, BytesMut};

use crate::error::Error;
use crate::{Result, RtpSsrc};

/// "REMB" unique identifier in the feedback control information
const REMB_MAGIC: u32 = 0x5245_4D42;

/// Receiver Estimated Maximum Bitrate feedback packet
/// (draft-alvestrand-rmcat-remb, carried as PSFB PT 206 with FMT 15)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remb {
    /// SSRC of the sender of this feedback
    pub sender_ssrc: RtpSsrc,

    /// Media source SSRC, always 0 for REMB
    pub media_ssrc: RtpSsrc,

    /// Estimated maximum bitrate in bits per second
    pub bitrate_bps: u64,

    /// SSRCs the estimate applies to
    pub ssrcs: Vec<RtpSsrc>,
}

impl Remb {
    /// Feedback message type (FMT) value for REMB
    pub const FMT: u8 = 15;

    /// Create a new REMB packet
    pub fn new(sender_ssrc: RtpSsrc, bitrate_bps: u64, ssrcs: Vec<RtpSsrc>) -> Self {
        Self {
            sender_ssrc,
            media_ssrc: 0,
            bitrate_bps,
            ssrcs,
        }
    }

    /// Payload size in bytes (header excluded)
    pub fn size(&self) -> usize {
        16 + self.ssrcs.len() * 4
    }

    /// Serialize the packet payload
    pub fn serialize(&self) -> Result<BytesMut> {
        let mut buf = BytesMut::with_capacity(self.size());

        buf.put_u32(self.sender_ssrc);
        buf.put_u32(self.media_ssrc);
        buf.put_u32(REMB_MAGIC);

        // 6-bit exponent, 18-bit mantissa
        let (exp, mantissa) = encode_bitrate(self.bitrate_bps);
        buf.put_u32(
            ((self.ssrcs.len() as u32) << 24) | ((exp as u32) << 18) | mantissa,
        );

        for ssrc in &self.ssrcs {
            buf.put_u32(*ssrc);
        }

        Ok(buf)
    }
}

/// Parse a REMB payload
pub fn parse_remb(buf: &mut impl Buf, payload_len: usize) -> Result<Remb> {
    if payload_len < 16 || buf.remaining() < payload_len {
        return Err(Error::BufferTooSmall {
            required: payload_len.max(16),
            available: buf.remaining(),
        });
    }

    let sender_ssrc = buf.get_u32();
    let media_ssrc = buf.get_u32();

    let magic = buf.get_u32();
    if magic != REMB_MAGIC {
        return Err(Error::BadFormat(format!(
            "REMB identifier missing, got {:#010x}",
            magic
        )));
    }

    let word = buf.get_u32();
    let num_ssrcs = (word >> 24) as usize;
    let exp = ((word >> 18) & 0x3F) as u32;
    let mantissa = (word & 0x3_FFFF) as u64;
    let bitrate_bps = mantissa << exp;

    if payload_len < 16 + num_ssrcs * 4 {
        return Err(Error::BadFormat(
            "REMB SSRC count exceeds packet length".to_string(),
        ));
    }

    let mut ssrcs = Vec::with_capacity(num_ssrcs);
    for _ in 0..num_ssrcs {
        ssrcs.push(buf.get_u32());
    }

    // Skip anything past the SSRC list up to the declared length
    for _ in 0..payload_len - 16 - num_ssrcs * 4 {
        buf.get_u8();
    }

    Ok(Remb {
        sender_ssrc,
        media_ssrc,
        bitrate_bps,
        ssrcs,
    })
}

/// Encode a bitrate into the 6-bit exponent / 18-bit mantissa form
fn encode_bitrate(bitrate: u64) -> (u8, u32) {
    let mut exp = 0u8;
    let mut mantissa = bitrate;

    while mantissa > 0x3_FFFF && exp < 63 {
        mantissa >>= 1;
        exp += 1;
    }

    (exp, mantissa as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let original = Remb::new(0x1234_5678, 1_000_000, vec![0xaaaa_bbbb, 0xcccc_dddd]);

        let serialized = original.serialize().unwrap();
        let len = serialized.len();
        let parsed = parse_remb(&mut serialized.freeze(), len).unwrap();

        assert_eq!(parsed.sender_ssrc, original.sender_ssrc);
        assert_eq!(parsed.ssrcs, original.ssrcs);
        // Small bitrates fit the mantissa exactly
        assert_eq!(parsed.bitrate_bps, 1_000_000);
    }

    #[test]
    fn test_large_bitrate_loses_only_low_bits() {
        let bitrate = 123_456_789u64;
        let (exp, mantissa) = encode_bitrate(bitrate);
        let decoded = (mantissa as u64) << exp;

        assert!(decoded <= bitrate);
        // The exponential form keeps 18 bits of precision
        assert!(bitrate - decoded < (1 << exp));
    }

    #[test]
    fn test_bad_magic() {
        let mut buf = BytesMut::new();
        buf.put_u32(1);
        buf.put_u32(0);
        buf.put_u32(0xdead_beef);
        buf.put_u32(0);

        let result = parse_remb(&mut buf.freeze(), 16);
        assert!(matches!(result, Err(Error::BadFormat(_))));
    }
}
