use bytes::{Bytes, BytesMut};

use super::{ReceiverReport, RtcpPacket, SenderReport};
use crate::error::Error;
use crate::Result;

/// Offset and length of one sub-packet inside the compound buffer it was
/// parsed from; kept so a parsed compound can be re-serialized sub-packet by
/// sub-packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketSpan {
    /// Byte offset of the sub-packet in the original buffer
    pub offset: usize,

    /// On-wire length of the sub-packet in bytes
    pub length: usize,
}

/// RTCP compound packet (RFC 3550 Section 6.1)
///
/// A concatenation of RTCP packets where the first must be an SR or RR.
#[derive(Debug, Clone)]
pub struct RtcpCompoundPacket {
    /// Sub-packets in wire order
    pub packets: Vec<RtcpPacket>,

    /// Spans of the sub-packets in the buffer this compound was parsed
    /// from; empty for compounds built programmatically
    pub spans: Vec<PacketSpan>,
}

impl RtcpCompoundPacket {
    /// Create a compound packet starting with a Sender Report
    pub fn new_with_sr(sr: SenderReport) -> Self {
        Self {
            packets: vec![RtcpPacket::SenderReport(sr)],
            spans: Vec::new(),
        }
    }

    /// Create a compound packet starting with a Receiver Report
    pub fn new_with_rr(rr: ReceiverReport) -> Self {
        Self {
            packets: vec![RtcpPacket::ReceiverReport(rr)],
            spans: Vec::new(),
        }
    }

    /// Create a compound from already-parsed sub-packets and their spans
    pub(crate) fn from_parsed(packets: Vec<RtcpPacket>, spans: Vec<PacketSpan>) -> Self {
        Self { packets, spans }
    }

    /// Append a sub-packet
    pub fn add(&mut self, packet: RtcpPacket) {
        self.packets.push(packet);
    }

    /// The leading Sender Report, if the compound starts with one
    pub fn sender_report(&self) -> Option<&SenderReport> {
        match self.packets.first() {
            Some(RtcpPacket::SenderReport(sr)) => Some(sr),
            _ => None,
        }
    }

    /// The leading Receiver Report, if the compound starts with one
    pub fn receiver_report(&self) -> Option<&ReceiverReport> {
        match self.packets.first() {
            Some(RtcpPacket::ReceiverReport(rr)) => Some(rr),
            _ => None,
        }
    }

    /// Total serialized size in bytes
    pub fn size(&self) -> usize {
        self.packets.iter().map(RtcpPacket::size).sum()
    }

    /// Check the RFC 3550 compound requirements
    pub fn validate(&self) -> Result<()> {
        if self.packets.is_empty() {
            return Err(Error::RtcpError(
                "Compound packet must contain at least one packet".to_string(),
            ));
        }

        match self.packets[0] {
            RtcpPacket::SenderReport(_) | RtcpPacket::ReceiverReport(_) => Ok(()),
            _ => Err(Error::RtcpError(
                "First packet in compound packet must be SR or RR".to_string(),
            )),
        }
    }

    /// Serialize all sub-packets into one buffer
    pub fn serialize(&self) -> Result<Bytes> {
        self.validate()?;

        let mut buf = BytesMut::with_capacity(self.size());
        for packet in &self.packets {
            let packet_bytes = packet.serialize()?;
            buf.extend_from_slice(&packet_bytes);
        }

        Ok(buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::rtcp::Goodbye;

    #[test]
    fn test_validation() {
        let compound = RtcpCompoundPacket::new_with_rr(ReceiverReport::new(0x1234_5678));
        assert!(compound.validate().is_ok());

        let empty = RtcpCompoundPacket {
            packets: Vec::new(),
            spans: Vec::new(),
        };
        assert!(empty.validate().is_err());

        let mut bye_first = RtcpCompoundPacket {
            packets: Vec::new(),
            spans: Vec::new(),
        };
        bye_first.add(RtcpPacket::Goodbye(Goodbye::new(1)));
        assert!(bye_first.validate().is_err());
    }

    #[test]
    fn test_size_matches_serialized_length() {
        let mut compound = RtcpCompoundPacket::new_with_rr(ReceiverReport::new(1));
        compound.add(RtcpPacket::Goodbye(Goodbye::with_reason(1, "bye".to_string())));

        let bytes = compound.serialize().unwrap();
        assert_eq!(bytes.len(), compound.size());
        assert_eq!(bytes.len() % 4, 0);
    }
}
