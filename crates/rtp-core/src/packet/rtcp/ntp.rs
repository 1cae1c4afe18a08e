use bytes::{Buf, BufMut, BytesMut};

/// NTP timestamp as carried in RTCP sender reports (RFC 3550 Section 4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NtpTimestamp {
    /// Seconds since January 1st 1900
    pub seconds: u32,

    /// Fraction of a second in units of 1/2^32
    pub fraction: u32,
}

impl NtpTimestamp {
    /// Create a new NTP timestamp
    pub fn new(seconds: u32, fraction: u32) -> Self {
        Self { seconds, fraction }
    }

    /// Middle 32 bits of the timestamp, the form used in LSR/DLSR fields
    pub fn middle_32(&self) -> u32 {
        (self.seconds << 16) | (self.fraction >> 16)
    }

    /// Read an NTP timestamp (8 bytes) from a buffer
    pub fn read(buf: &mut impl Buf) -> Self {
        Self {
            seconds: buf.get_u32(),
            fraction: buf.get_u32(),
        }
    }

    /// Write the timestamp (8 bytes) to a buffer
    pub fn write(&self, buf: &mut BytesMut) {
        buf.put_u32(self.seconds);
        buf.put_u32(self.fraction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_middle_32() {
        let ts = NtpTimestamp::new(0x0001_e240, 0x8000_0000);
        assert_eq!(ts.middle_32(), 0xe240_8000);
    }

    #[test]
    fn test_read_write() {
        let ts = NtpTimestamp::new(1234, 5678);
        let mut buf = BytesMut::new();
        ts.write(&mut buf);
        assert_eq!(buf.len(), 8);

        let parsed = NtpTimestamp::read(&mut buf.freeze());
        assert_eq!(parsed, ts);
    }
}
