use bytes::{Buf, BufMut, BytesMut};

use super::ntp::NtpTimestamp;
use super::report_block::ReportBlock;
use crate::error::Error;
use crate::{Result, RtpSsrc};

/// RTCP Sender Report (RFC 3550 Section 6.4.1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderReport {
    /// SSRC of the sender
    pub ssrc: RtpSsrc,

    /// NTP timestamp when this report was sent
    pub ntp_timestamp: NtpTimestamp,

    /// RTP timestamp corresponding to the NTP timestamp
    pub rtp_timestamp: u32,

    /// Total RTP packets sent since the start of transmission
    pub packet_count: u32,

    /// Total RTP payload octets sent since the start of transmission
    pub octet_count: u32,

    /// Report blocks
    pub report_blocks: Vec<ReportBlock>,
}

impl SenderReport {
    /// Create a new sender report without report blocks
    pub fn new(ssrc: RtpSsrc) -> Self {
        Self {
            ssrc,
            ntp_timestamp: NtpTimestamp::default(),
            rtp_timestamp: 0,
            packet_count: 0,
            octet_count: 0,
            report_blocks: Vec::new(),
        }
    }

    /// Add a report block
    pub fn add_report_block(&mut self, block: ReportBlock) {
        self.report_blocks.push(block);
    }

    /// Payload size in bytes (SSRC + sender info + report blocks, header excluded)
    pub fn size(&self) -> usize {
        4 + 20 + self.report_blocks.len() * ReportBlock::SIZE
    }

    /// Serialize the report payload
    pub fn serialize(&self) -> Result<BytesMut> {
        let mut buf = BytesMut::with_capacity(self.size());

        buf.put_u32(self.ssrc);
        self.ntp_timestamp.write(&mut buf);
        buf.put_u32(self.rtp_timestamp);
        buf.put_u32(self.packet_count);
        buf.put_u32(self.octet_count);

        for block in &self.report_blocks {
            block.serialize(&mut buf);
        }

        Ok(buf)
    }
}

/// Parse a sender report payload
pub fn parse_sender_report(buf: &mut impl Buf, report_count: u8) -> Result<SenderReport> {
    // SSRC plus the 20-byte sender info section
    if buf.remaining() < 24 {
        return Err(Error::BufferTooSmall {
            required: 24,
            available: buf.remaining(),
        });
    }

    let ssrc = buf.get_u32();
    let ntp_timestamp = NtpTimestamp::read(buf);
    let rtp_timestamp = buf.get_u32();
    let packet_count = buf.get_u32();
    let octet_count = buf.get_u32();

    let mut report_blocks = Vec::with_capacity(report_count as usize);
    for _ in 0..report_count {
        report_blocks.push(ReportBlock::parse(buf)?);
    }

    Ok(SenderReport {
        ssrc,
        ntp_timestamp,
        rtp_timestamp,
        packet_count,
        octet_count,
        report_blocks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size() {
        let mut sr = SenderReport::new(0x1234_5678);
        assert_eq!(sr.size(), 24);

        sr.add_report_block(ReportBlock::new(0xabcd_ef01));
        assert_eq!(sr.size(), 24 + ReportBlock::SIZE);
    }

    #[test]
    fn test_round_trip() {
        let mut original = SenderReport::new(0x1234_5678);
        original.ntp_timestamp = NtpTimestamp::new(1234, 5678);
        original.rtp_timestamp = 0x8765_4321;
        original.packet_count = 100;
        original.octet_count = 12345;
        original.add_report_block(ReportBlock {
            ssrc: 0xabcd_ef01,
            fraction_lost: 10,
            cumulative_lost: 500,
            highest_seq: 10000,
            jitter: 200,
            last_sr: 0x5566_7788,
            delay_since_last_sr: 2000,
        });

        let serialized = original.serialize().unwrap();
        let parsed = parse_sender_report(&mut serialized.freeze(), 1).unwrap();
        assert_eq!(parsed, original);
    }
}
