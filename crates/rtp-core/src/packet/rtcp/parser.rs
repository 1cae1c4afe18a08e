//! Streaming RTCP compound-packet parser
//!
//! Walks a buffer of concatenated RTCP packets, validating the RFC 3550
//! framing rules (version bits, 32-bit-word length field, terminal-packet
//! padding) and dispatching each sub-packet to its typed parser.
//!
//! Malformed conditions are classified: each one invokes a distinct
//! [`RtcpParseListener`] callback before the parse is aborted, so callers
//! can tell "which sub-packet type was malformed" apart from "stop parsing
//! this compound" without matching on error strings.

use super::{
    parse_app, parse_bye, parse_receiver_report, parse_remb, parse_sdes, parse_sender_report,
    PacketSpan, Remb, RtcpCompoundPacket, RtcpPacket, RTCP_VERSION,
};
use crate::error::Error;
use crate::Result;

/// Handler for sub-packets beyond the built-in set.
///
/// Receives the packet type, the 5-bit count/FMT field and the payload
/// (common header excluded).
pub type ExtensionHandler = Box<dyn Fn(u8, u8, &[u8]) -> Result<RtcpPacket> + Send + Sync>;

/// Observer notified as a compound packet is parsed.
///
/// All methods have empty default bodies; implementors override the
/// conditions they care about. The malformed-condition callbacks fire
/// before the corresponding error is returned.
pub trait RtcpParseListener: Send + Sync {
    /// Version bits were not 2
    fn on_bad_version(&self, _version: u8) {}

    /// Declared sub-packet length exceeds the remaining buffer
    fn on_bad_length(&self, _declared: usize, _available: usize) {}

    /// Padding bit set on a non-terminal packet, or a zero pad count
    fn on_bad_padding(&self) {}

    /// SR length didn't match its report count, or its body was truncated
    fn on_bad_sender_report(&self) {}

    /// RR length didn't match its report count, or its body was truncated
    fn on_bad_receiver_report(&self) {}

    /// SDES structure invalid (missing CNAME, bad item framing)
    fn on_bad_source_description(&self) {}

    /// BYE structure invalid
    fn on_bad_goodbye(&self) {}

    /// APP packet shorter than its 12-byte minimum, or malformed
    fn on_bad_application_defined(&self) {}

    /// Payload type not recognized and not claimed by the extension hook
    fn on_unknown_packet_type(&self, _packet_type: u8) {}

    /// A sub-packet parsed successfully
    fn on_packet_parsed(&self, _packet: &RtcpPacket) {}
}

/// Streaming parser for RTCP compound packets
pub struct RtcpPacketParser {
    listeners: Vec<Box<dyn RtcpParseListener>>,
    extension_handler: Option<ExtensionHandler>,
}

impl RtcpPacketParser {
    /// Create a parser with no listeners and the default extension
    /// behavior (unknown payload types are an error)
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            extension_handler: None,
        }
    }

    /// Register a listener
    pub fn add_listener(&mut self, listener: Box<dyn RtcpParseListener>) {
        self.listeners.push(listener);
    }

    /// Install a handler for payload types outside the built-in set
    pub fn set_extension_handler(&mut self, handler: ExtensionHandler) {
        self.extension_handler = Some(handler);
    }

    /// Parse a buffer holding one or more concatenated RTCP packets
    pub fn parse(&self, data: &[u8]) -> Result<RtcpCompoundPacket> {
        let mut packets = Vec::new();
        let mut spans = Vec::new();
        let mut offset = 0;

        while offset < data.len() {
            let remaining = data.len() - offset;
            if remaining < 4 {
                self.notify(|l| l.on_bad_length(4, remaining));
                return Err(Error::BadFormat(
                    "Trailing bytes shorter than an RTCP header".to_string(),
                ));
            }

            let first = data[offset];
            let version = first >> 6;
            if version != RTCP_VERSION {
                self.notify(|l| l.on_bad_version(version));
                return Err(Error::BadVersion(version));
            }

            let has_padding = (first >> 5) & 0x01 != 0;
            let count = first & 0x1F;
            let packet_type = data[offset + 1];
            let length_words = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
            let packet_len = (length_words + 1) * 4;

            if packet_len > remaining {
                self.notify(|l| l.on_bad_length(packet_len, remaining));
                return Err(Error::BadFormat(format!(
                    "Declared length {} exceeds remaining {} bytes",
                    packet_len, remaining
                )));
            }

            let is_terminal = offset + packet_len == data.len();

            // Padding is only legal on the final packet of the compound,
            // and the pad count in the last byte must be non-zero
            let pad_len = if has_padding {
                if !is_terminal {
                    self.notify(|l| l.on_bad_padding());
                    return Err(Error::BadFormat(
                        "Padding bit set on a non-terminal packet".to_string(),
                    ));
                }
                let pad = data[data.len() - 1] as usize;
                if pad == 0 || pad > packet_len - 4 {
                    self.notify(|l| l.on_bad_padding());
                    return Err(Error::BadFormat(format!("Invalid pad count {}", pad)));
                }
                pad
            } else {
                0
            };

            let payload = &data[offset + 4..offset + packet_len - pad_len];
            let packet = self.parse_one(packet_type, count, payload)?;

            self.notify(|l| l.on_packet_parsed(&packet));
            packets.push(packet);
            spans.push(PacketSpan {
                offset,
                length: packet_len,
            });

            offset += packet_len;
        }

        Ok(RtcpCompoundPacket::from_parsed(packets, spans))
    }

    /// Parse a single sub-packet payload, dispatching on the packet type
    fn parse_one(&self, packet_type: u8, count: u8, payload: &[u8]) -> Result<RtcpPacket> {
        match packet_type {
            200 => {
                // SSRC + sender info + report blocks, validated exactly
                if payload.len() != 24 + 24 * count as usize {
                    self.notify(|l| l.on_bad_sender_report());
                    return Err(Error::BadFormat(format!(
                        "SR length {} doesn't match {} report blocks",
                        payload.len() + 4,
                        count
                    )));
                }
                let sr = parse_sender_report(&mut &payload[..], count).map_err(|e| {
                    self.notify(|l| l.on_bad_sender_report());
                    e
                })?;
                Ok(RtcpPacket::SenderReport(sr))
            }
            201 => {
                if payload.len() != 4 + 24 * count as usize {
                    self.notify(|l| l.on_bad_receiver_report());
                    return Err(Error::BadFormat(format!(
                        "RR length {} doesn't match {} report blocks",
                        payload.len() + 4,
                        count
                    )));
                }
                let rr = parse_receiver_report(&mut &payload[..], count).map_err(|e| {
                    self.notify(|l| l.on_bad_receiver_report());
                    e
                })?;
                Ok(RtcpPacket::ReceiverReport(rr))
            }
            202 => {
                let sdes = parse_sdes(&mut &payload[..], count).map_err(|e| {
                    self.notify(|l| l.on_bad_source_description());
                    e
                })?;
                Ok(RtcpPacket::SourceDescription(sdes))
            }
            203 => {
                let bye = parse_bye(&mut &payload[..], count, payload.len()).map_err(|e| {
                    self.notify(|l| l.on_bad_goodbye());
                    e
                })?;
                Ok(RtcpPacket::Goodbye(bye))
            }
            204 => {
                let app = parse_app(&mut &payload[..], count, payload.len()).map_err(|e| {
                    self.notify(|l| l.on_bad_application_defined());
                    e
                })?;
                Ok(RtcpPacket::ApplicationDefined(app))
            }
            206 if count == Remb::FMT => {
                let remb = parse_remb(&mut &payload[..], payload.len())?;
                Ok(RtcpPacket::Remb(remb))
            }
            _ => self.parse_extension(packet_type, count, payload),
        }
    }

    /// Unrecognized payload types go to the extension hook; without one
    /// they are an error
    fn parse_extension(&self, packet_type: u8, count: u8, payload: &[u8]) -> Result<RtcpPacket> {
        match &self.extension_handler {
            Some(handler) => handler(packet_type, count, payload),
            None => {
                self.notify(|l| l.on_unknown_packet_type(packet_type));
                Err(Error::UnknownPacketType(packet_type))
            }
        }
    }

    fn notify(&self, f: impl Fn(&dyn RtcpParseListener)) {
        for listener in &self.listeners {
            f(listener.as_ref());
        }
    }
}

impl Default for RtcpPacketParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::rtcp::{
        Goodbye, NtpTimestamp, ReceiverReport, ReportBlock, SenderReport, SourceDescription,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingListener {
        bad_version: AtomicUsize,
        bad_sr: AtomicUsize,
        bad_sdes: AtomicUsize,
        bad_padding: AtomicUsize,
        unknown: AtomicUsize,
        parsed: AtomicUsize,
    }

    impl RtcpParseListener for Arc<CountingListener> {
        fn on_bad_version(&self, _version: u8) {
            self.bad_version.fetch_add(1, Ordering::SeqCst);
        }
        fn on_bad_sender_report(&self) {
            self.bad_sr.fetch_add(1, Ordering::SeqCst);
        }
        fn on_bad_source_description(&self) {
            self.bad_sdes.fetch_add(1, Ordering::SeqCst);
        }
        fn on_bad_padding(&self) {
            self.bad_padding.fetch_add(1, Ordering::SeqCst);
        }
        fn on_unknown_packet_type(&self, _packet_type: u8) {
            self.unknown.fetch_add(1, Ordering::SeqCst);
        }
        fn on_packet_parsed(&self, _packet: &RtcpPacket) {
            self.parsed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn parser_with_counts() -> (RtcpPacketParser, Arc<CountingListener>) {
        let counts = Arc::new(CountingListener::default());
        let mut parser = RtcpPacketParser::new();
        parser.add_listener(Box::new(Arc::clone(&counts)));
        (parser, counts)
    }

    #[test]
    fn test_compound_round_trip() {
        let mut sr = SenderReport::new(0x1234_5678);
        sr.ntp_timestamp = NtpTimestamp::new(100, 200);
        sr.rtp_timestamp = 0xdead_beef;
        sr.packet_count = 42;
        sr.octet_count = 4200;
        sr.add_report_block(ReportBlock {
            ssrc: 0xaaaa_bbbb,
            fraction_lost: 1,
            cumulative_lost: 2,
            highest_seq: 3,
            jitter: 4,
            last_sr: 5,
            delay_since_last_sr: 6,
        });

        let mut compound = RtcpCompoundPacket::new_with_sr(sr.clone());
        let mut sdes = SourceDescription::new();
        sdes.add_source(0x1234_5678, "alice@host".to_string());
        compound.add(RtcpPacket::SourceDescription(sdes.clone()));
        compound.add(RtcpPacket::Goodbye(Goodbye::new(0x1234_5678)));

        let bytes = compound.serialize().unwrap();

        let (parser, counts) = parser_with_counts();
        let parsed = parser.parse(&bytes).unwrap();

        assert_eq!(parsed.packets.len(), 3);
        assert_eq!(counts.parsed.load(Ordering::SeqCst), 3);
        assert_eq!(parsed.sender_report(), Some(&sr));
        assert_eq!(parsed.packets[1], RtcpPacket::SourceDescription(sdes));

        // Spans cover the buffer contiguously
        assert_eq!(parsed.spans[0].offset, 0);
        let total: usize = parsed.spans.iter().map(|s| s.length).sum();
        assert_eq!(total, bytes.len());
    }

    #[test]
    fn test_rejects_bad_version() {
        let rr = RtcpPacket::ReceiverReport(ReceiverReport::new(1));
        let mut bytes = rr.serialize().unwrap().to_vec();
        bytes[0] = (1 << 6) | (bytes[0] & 0x3F); // version 1

        let (parser, counts) = parser_with_counts();
        assert!(matches!(parser.parse(&bytes), Err(Error::BadVersion(1))));
        assert_eq!(counts.bad_version.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rejects_sr_length_mismatch() {
        let mut sr = SenderReport::new(1);
        sr.add_report_block(ReportBlock::new(2));
        let mut bytes = RtcpPacket::SenderReport(sr).serialize().unwrap().to_vec();
        // Claim two report blocks while carrying one
        bytes[0] = (bytes[0] & 0xE0) | 2;

        let (parser, counts) = parser_with_counts();
        assert!(parser.parse(&bytes).is_err());
        assert_eq!(counts.bad_sr.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rejects_sdes_without_cname() {
        let mut rr_bytes = RtcpPacket::ReceiverReport(ReceiverReport::new(1))
            .serialize()
            .unwrap()
            .to_vec();

        // Hand-built SDES chunk: SSRC + TOOL item only
        let mut sdes = vec![
            0x81, 202, 0x00, 0x03, // header: 1 chunk, 3 words of payload
            0x00, 0x00, 0x00, 0x01, // SSRC
            6, 2, b'c', b't', // TOOL item
            0, 0, 0, 0, // END + pad to the word boundary
        ];
        rr_bytes.append(&mut sdes);

        let (parser, counts) = parser_with_counts();
        assert!(parser.parse(&rr_bytes).is_err());
        assert_eq!(counts.bad_sdes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rejects_zero_pad_count() {
        let rr = RtcpPacket::ReceiverReport(ReceiverReport::new(1));
        let mut bytes = rr.serialize().unwrap().to_vec();
        // Grow the packet by one pad word, set the padding bit, but leave
        // the final byte zero
        bytes[0] |= 0x20;
        bytes[3] += 1;
        bytes.extend_from_slice(&[0, 0, 0, 0]);

        let (parser, counts) = parser_with_counts();
        assert!(parser.parse(&bytes).is_err());
        assert_eq!(counts.bad_padding.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rejects_padding_on_non_terminal_packet() {
        let rr = RtcpPacket::ReceiverReport(ReceiverReport::new(1));
        let mut first = rr.serialize().unwrap().to_vec();
        first[0] |= 0x20;
        let second = RtcpPacket::Goodbye(Goodbye::new(1)).serialize().unwrap();
        first.extend_from_slice(&second);

        let (parser, counts) = parser_with_counts();
        assert!(parser.parse(&first).is_err());
        assert_eq!(counts.bad_padding.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_type_without_handler() {
        let mut bytes = RtcpPacket::ReceiverReport(ReceiverReport::new(1))
            .serialize()
            .unwrap()
            .to_vec();
        // XR packet type, which this engine doesn't model
        bytes.extend_from_slice(&[0x80, 207, 0x00, 0x01, 0, 0, 0, 1]);

        let (parser, counts) = parser_with_counts();
        assert!(matches!(
            parser.parse(&bytes),
            Err(Error::UnknownPacketType(207))
        ));
        assert_eq!(counts.unknown.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_extension_handler_claims_unknown_type() {
        let mut bytes = RtcpPacket::ReceiverReport(ReceiverReport::new(7))
            .serialize()
            .unwrap()
            .to_vec();
        bytes.extend_from_slice(&[0x80, 207, 0x00, 0x01, 0, 0, 0, 7]);

        let mut parser = RtcpPacketParser::new();
        parser.set_extension_handler(Box::new(|_pt, _count, payload| {
            // Surface XR packets as an opaque APP-style packet
            Ok(RtcpPacket::ApplicationDefined(
                crate::packet::rtcp::ApplicationDefined::new(
                    u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]),
                    *b"XR00",
                    Vec::new(),
                ),
            ))
        }));

        let parsed = parser.parse(&bytes).unwrap();
        assert_eq!(parsed.packets.len(), 2);
    }

    #[test]
    fn test_declared_length_beyond_buffer() {
        // RR header claiming 100 words with an empty body
        let bytes = [0x80, 201, 0x00, 100];
        let (parser, _counts) = parser_with_counts();
        assert!(matches!(parser.parse(&bytes), Err(Error::BadFormat(_))));
    }

    #[test]
    fn test_remb_in_compound() {
        let mut compound = RtcpCompoundPacket::new_with_rr(ReceiverReport::new(1));
        compound.add(RtcpPacket::Remb(Remb::new(1, 256_000, vec![9])));

        let bytes = compound.serialize().unwrap();
        let parser = RtcpPacketParser::new();
        let parsed = parser.parse(&bytes).unwrap();

        match &parsed.packets[1] {
            RtcpPacket::Remb(remb) => {
                assert_eq!(remb.bitrate_bps, 256_000);
                assert_eq!(remb.ssrcs, vec![9]);
            }
            other => panic!("Expected REMB, got {:?}", other),
        }
    }
}
