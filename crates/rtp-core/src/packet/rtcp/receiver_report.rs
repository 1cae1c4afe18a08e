use bytes::{Buf, BufMut, BytesMut};

use super::report_block::ReportBlock;
use crate::error::Error;
use crate::{Result, RtpSsrc};

/// RTCP Receiver Report (RFC 3550 Section 6.4.2)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverReport {
    /// SSRC of the receiver
    pub ssrc: RtpSsrc,

    /// Report blocks
    pub report_blocks: Vec<ReportBlock>,
}

impl ReceiverReport {
    /// Create a new receiver report
    pub fn new(ssrc: RtpSsrc) -> Self {
        Self {
            ssrc,
            report_blocks: Vec::new(),
        }
    }

    /// Add a report block
    pub fn add_report_block(&mut self, block: ReportBlock) {
        self.report_blocks.push(block);
    }

    /// Payload size in bytes (header excluded)
    pub fn size(&self) -> usize {
        4 + self.report_blocks.len() * ReportBlock::SIZE
    }

    /// Serialize the report payload
    pub fn serialize(&self) -> Result<BytesMut> {
        let mut buf = BytesMut::with_capacity(self.size());

        buf.put_u32(self.ssrc);
        for block in &self.report_blocks {
            block.serialize(&mut buf);
        }

        Ok(buf)
    }
}

/// Parse a receiver report payload
pub fn parse_receiver_report(buf: &mut impl Buf, report_count: u8) -> Result<ReceiverReport> {
    if buf.remaining() < 4 {
        return Err(Error::BufferTooSmall {
            required: 4,
            available: buf.remaining(),
        });
    }

    let ssrc = buf.get_u32();

    let mut report_blocks = Vec::with_capacity(report_count as usize);
    for _ in 0..report_count {
        report_blocks.push(ReportBlock::parse(buf)?);
    }

    Ok(ReceiverReport {
        ssrc,
        report_blocks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut original = ReceiverReport::new(0x1234_5678);
        original.add_report_block(ReportBlock {
            ssrc: 0xabcd_ef01,
            fraction_lost: 42,
            cumulative_lost: 1000,
            highest_seq: 5000,
            jitter: 100,
            last_sr: 0x8765_4321,
            delay_since_last_sr: 1500,
        });
        original.add_report_block(ReportBlock::new(0x1122_3344));

        let serialized = original.serialize().unwrap();
        let parsed = parse_receiver_report(&mut serialized.freeze(), 2).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_empty_report() {
        let rr = ReceiverReport::new(0xdead_beef);
        assert_eq!(rr.size(), 4);

        let serialized = rr.serialize().unwrap();
        let parsed = parse_receiver_report(&mut serialized.freeze(), 0).unwrap();
        assert_eq!(parsed, rr);
    }
}
