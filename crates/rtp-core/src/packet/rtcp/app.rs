use bytes::{Buf, BufMut, BytesMut};

use crate::error::Error;
use crate::{Result, RtpSsrc};

/// RTCP Application-Defined (APP) packet (RFC 3550 Section 6.7)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationDefined {
    /// Subtype, application-specific (the 5-bit count field)
    pub subtype: u8,

    /// SSRC/CSRC of the originator
    pub ssrc: RtpSsrc,

    /// Four ASCII characters naming the application
    pub name: [u8; 4],

    /// Application-dependent data, multiple of 4 bytes
    pub data: Vec<u8>,
}

impl ApplicationDefined {
    /// Create a new APP packet; data is padded to a 32-bit boundary
    pub fn new(ssrc: RtpSsrc, name: [u8; 4], mut data: Vec<u8>) -> Self {
        while data.len() % 4 != 0 {
            data.push(0);
        }
        Self {
            subtype: 0,
            ssrc,
            name,
            data,
        }
    }

    /// Payload size in bytes (header excluded)
    pub fn size(&self) -> usize {
        4 + 4 + self.data.len()
    }

    /// Serialize the packet payload
    pub fn serialize(&self) -> Result<BytesMut> {
        if self.data.len() % 4 != 0 {
            return Err(Error::BadFormat(
                "APP data must be a multiple of 4 bytes".to_string(),
            ));
        }

        let mut buf = BytesMut::with_capacity(self.size());
        buf.put_u32(self.ssrc);
        buf.put_slice(&self.name);
        buf.put_slice(&self.data);
        Ok(buf)
    }
}

/// Parse an APP payload.
///
/// The packet must be at least 12 bytes on the wire (4-byte header, SSRC
/// and name), so the payload here must be at least 8 bytes.
pub fn parse_app(buf: &mut impl Buf, subtype: u8, payload_len: usize) -> Result<ApplicationDefined> {
    if payload_len < 8 || buf.remaining() < payload_len {
        return Err(Error::BufferTooSmall {
            required: payload_len.max(8),
            available: buf.remaining(),
        });
    }

    let ssrc = buf.get_u32();

    let mut name = [0u8; 4];
    buf.copy_to_slice(&mut name);

    let mut data = vec![0u8; payload_len - 8];
    buf.copy_to_slice(&mut data);

    Ok(ApplicationDefined {
        subtype,
        ssrc,
        name,
        data,
    })
}
