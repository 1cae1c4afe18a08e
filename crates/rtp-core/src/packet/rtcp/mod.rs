//! RTCP packet model
//!
//! Typed representations of the RTCP packet types this engine produces and
//! consumes (RFC 3550: SR, RR, SDES, BYE, APP; REMB feedback per
//! draft-alvestrand-rmcat-remb), a compound-packet container, and the
//! streaming parser with malformed-packet listener callbacks.
//!
//! The packet set is closed by the protocol, so the model is a single
//! `RtcpPacket` enum; serialization and length computation dispatch on the
//! tag.

use bytes::{BufMut, BytesMut};

use crate::error::Error;
use crate::Result;

mod app;
mod bye;
mod compound;
mod ntp;
mod parser;
mod receiver_report;
mod remb;
mod report_block;
mod sdes;
mod sender_report;

pub use app::ApplicationDefined;
pub use bye::Goodbye;
pub use compound::{PacketSpan, RtcpCompoundPacket};
pub use ntp::NtpTimestamp;
pub use parser::{ExtensionHandler, RtcpPacketParser, RtcpParseListener};
pub use receiver_report::ReceiverReport;
pub use remb::Remb;
pub use report_block::ReportBlock;
pub use sdes::{SdesChunk, SdesItem, SdesItemType, SourceDescription};
pub use sender_report::SenderReport;

pub(crate) use app::parse_app;
pub(crate) use bye::parse_bye;
pub(crate) use receiver_report::parse_receiver_report;
pub(crate) use remb::parse_remb;
pub(crate) use sdes::parse_sdes;
pub(crate) use sender_report::parse_sender_report;

/// RTCP version, always 2
pub const RTCP_VERSION: u8 = 2;

/// RTCP packet types handled by this engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RtcpPacketType {
    /// Sender Report (SR)
    SenderReport = 200,

    /// Receiver Report (RR)
    ReceiverReport = 201,

    /// Source Description (SDES)
    SourceDescription = 202,

    /// Goodbye (BYE)
    Goodbye = 203,

    /// Application-Defined (APP)
    ApplicationDefined = 204,

    /// Payload-specific feedback (PT 206); REMB uses FMT 15
    PayloadSpecificFeedback = 206,
}

impl TryFrom<u8> for RtcpPacketType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            200 => Ok(RtcpPacketType::SenderReport),
            201 => Ok(RtcpPacketType::ReceiverReport),
            202 => Ok(RtcpPacketType::SourceDescription),
            203 => Ok(RtcpPacketType::Goodbye),
            204 => Ok(RtcpPacketType::ApplicationDefined),
            206 => Ok(RtcpPacketType::PayloadSpecificFeedback),
            _ => Err(Error::UnknownPacketType(value)),
        }
    }
}

/// A single typed RTCP packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtcpPacket {
    /// Sender Report (SR)
    SenderReport(SenderReport),

    /// Receiver Report (RR)
    ReceiverReport(ReceiverReport),

    /// Source Description (SDES)
    SourceDescription(SourceDescription),

    /// Goodbye (BYE)
    Goodbye(Goodbye),

    /// Application-Defined (APP)
    ApplicationDefined(ApplicationDefined),

    /// Receiver Estimated Maximum Bitrate feedback
    Remb(Remb),
}

impl RtcpPacket {
    /// The wire packet type of this packet
    pub fn packet_type(&self) -> RtcpPacketType {
        match self {
            RtcpPacket::SenderReport(_) => RtcpPacketType::SenderReport,
            RtcpPacket::ReceiverReport(_) => RtcpPacketType::ReceiverReport,
            RtcpPacket::SourceDescription(_) => RtcpPacketType::SourceDescription,
            RtcpPacket::Goodbye(_) => RtcpPacketType::Goodbye,
            RtcpPacket::ApplicationDefined(_) => RtcpPacketType::ApplicationDefined,
            RtcpPacket::Remb(_) => RtcpPacketType::PayloadSpecificFeedback,
        }
    }

    /// Value of the 5-bit count/FMT field in the common header
    fn count_field(&self) -> u8 {
        match self {
            RtcpPacket::SenderReport(sr) => sr.report_blocks.len() as u8,
            RtcpPacket::ReceiverReport(rr) => rr.report_blocks.len() as u8,
            RtcpPacket::SourceDescription(sdes) => sdes.chunks.len() as u8,
            RtcpPacket::Goodbye(bye) => bye.sources.len() as u8,
            RtcpPacket::ApplicationDefined(app) => app.subtype,
            RtcpPacket::Remb(_) => Remb::FMT,
        }
    }

    /// Total on-wire size in bytes, including the 4-byte common header
    pub fn size(&self) -> usize {
        let payload = match self {
            RtcpPacket::SenderReport(sr) => sr.size(),
            RtcpPacket::ReceiverReport(rr) => rr.size(),
            RtcpPacket::SourceDescription(sdes) => sdes.size(),
            RtcpPacket::Goodbye(bye) => bye.size(),
            RtcpPacket::ApplicationDefined(app) => app.size(),
            RtcpPacket::Remb(remb) => remb.size(),
        };
        4 + payload
    }

    /// Serialize the packet, including the common header.
    ///
    /// The length field carries the packet size in 32-bit words minus one
    /// (RFC 3550 Section 6.4.1). All payload serializers produce word-aligned
    /// output, so no padding bit is ever set here.
    pub fn serialize(&self) -> Result<BytesMut> {
        let payload = match self {
            RtcpPacket::SenderReport(sr) => sr.serialize()?,
            RtcpPacket::ReceiverReport(rr) => rr.serialize()?,
            RtcpPacket::SourceDescription(sdes) => sdes.serialize()?,
            RtcpPacket::Goodbye(bye) => bye.serialize()?,
            RtcpPacket::ApplicationDefined(app) => app.serialize()?,
            RtcpPacket::Remb(remb) => remb.serialize()?,
        };

        if payload.len() % 4 != 0 {
            return Err(Error::BadFormat(
                "RTCP payload not aligned to a 32-bit boundary".to_string(),
            ));
        }

        let mut buf = BytesMut::with_capacity(4 + payload.len());

        // version (2 bits) | padding (1 bit) | count (5 bits)
        buf.put_u8((RTCP_VERSION << 6) | (self.count_field() & 0x1F));
        buf.put_u8(self.packet_type() as u8);
        buf.put_u16((payload.len() / 4) as u16);
        buf.extend_from_slice(&payload);

        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_type_conversion() {
        assert_eq!(
            RtcpPacketType::try_from(200).unwrap(),
            RtcpPacketType::SenderReport
        );
        assert_eq!(
            RtcpPacketType::try_from(206).unwrap(),
            RtcpPacketType::PayloadSpecificFeedback
        );
        assert!(matches!(
            RtcpPacketType::try_from(100),
            Err(Error::UnknownPacketType(100))
        ));
    }

    #[test]
    fn test_header_length_field() {
        let rr = ReceiverReport::new(0x1234_5678);
        let packet = RtcpPacket::ReceiverReport(rr);

        let bytes = packet.serialize().unwrap();
        assert_eq!(bytes.len(), 8);
        // length = words - 1 = 8/4 - 1 = 1
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 1);
        // version 2, no padding, count 0
        assert_eq!(bytes[0], 0x80);
        assert_eq!(bytes[1], 201);
    }

    #[test]
    fn test_remb_header_fmt() {
        let packet = RtcpPacket::Remb(Remb::new(1, 64_000, vec![2]));
        let bytes = packet.serialize().unwrap();
        assert_eq!(bytes[0] & 0x1F, 15);
        assert_eq!(bytes[1], 206);
    }
}
