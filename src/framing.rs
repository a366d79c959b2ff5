use std::io::{self, Read, Write};

/// Max payload size accepted from a peer: guards against a hostile or
/// corrupt length prefix forcing an unbounded allocation.
const MAX_FRAME_SIZE: u32 = 100 * 1024 * 1024;

/// An outgoing, size-delimited frame: a 4-byte big-endian length prefix
/// followed by the payload, written across as many writable-readiness
/// events as it takes.
pub struct Send {
    destination: String,
    buf: Vec<u8>,
    written: usize,
}

impl Send {
    pub fn new(destination: impl Into<String>, payload: Vec<u8>) -> Send {
        let mut buf = Vec::with_capacity(4 + payload.len());
        buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(&payload);

        Send {
            destination: destination.into(),
            buf,
            written: 0,
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn completed(&self) -> bool {
        self.written == self.buf.len()
    }

    /// Payload size, excluding the 4-byte length prefix — what the
    /// `outgoing-byte-rate`/`request-size-*` sensors record.
    pub fn payload_len(&self) -> usize {
        self.buf.len() - 4
    }

    /// Writes as much of the remaining frame as the channel will accept
    /// without blocking. Returns `Ok(true)` once the whole frame has left
    /// the process.
    pub fn write_to<W: Write>(&mut self, writer: &mut W) -> io::Result<bool> {
        while self.written < self.buf.len() {
            match writer.write(&self.buf[self.written..]) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => self.written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }
}

/// An in-progress incoming frame: reads the 4-byte length prefix, then
/// accumulates exactly that many payload bytes.
pub struct Receive {
    source: String,
    max_size: Option<usize>,
    size_buf: [u8; 4],
    size_read: usize,
    payload: Option<Vec<u8>>,
    payload_read: usize,
}

impl Receive {
    /// `max_size` is the caller-configured `maxReceiveSize` (spec §3); frames
    /// whose length prefix exceeds it fail the connection with an io-error,
    /// the same way an over-`MAX_FRAME_SIZE` prefix does.
    pub fn new(source: impl Into<String>, max_size: Option<usize>) -> Receive {
        Receive {
            source: source.into(),
            max_size,
            size_buf: [0; 4],
            size_read: 0,
            payload: None,
            payload_read: 0,
        }
    }

    /// Builds an already-finished `Receive` around a payload that was
    /// decoded off the wire separately. Used to stage a frame read to
    /// completion inside one readable event without re-entering the
    /// length-prefix state machine for it.
    pub fn completed(source: impl Into<String>, payload: Vec<u8>) -> Receive {
        let payload_read = payload.len();
        Receive {
            source: source.into(),
            max_size: None,
            size_buf: [0; 4],
            size_read: 4,
            payload: Some(payload),
            payload_read,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Reads as much of the frame as is currently available without
    /// blocking. Returns `Ok(Some(payload))` once a full frame has
    /// arrived, `Ok(None)` if more data is still needed.
    pub fn read_from<R: Read>(&mut self, reader: &mut R) -> io::Result<Option<Vec<u8>>> {
        while self.size_read < 4 {
            match reader.read(&mut self.size_buf[self.size_read..]) {
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(n) => self.size_read += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) => return Err(e),
            }
        }

        if self.payload.is_none() {
            let size = u32::from_be_bytes(self.size_buf);
            if size > MAX_FRAME_SIZE {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("frame size {size} exceeds maximum {MAX_FRAME_SIZE}"),
                ));
            }
            if let Some(max_size) = self.max_size {
                if size as usize > max_size {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("frame size {size} exceeds configured max_receive_size {max_size}"),
                    ));
                }
            }
            self.payload = Some(vec![0; size as usize]);
        }

        let payload = self.payload.as_mut().expect("payload buffer allocated above");
        while self.payload_read < payload.len() {
            match reader.read(&mut payload[self.payload_read..]) {
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(n) => self.payload_read += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) => return Err(e),
            }
        }

        Ok(self.payload.take())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_a_single_frame() {
        let mut wire = Vec::new();
        let mut send = Send::new("node-1", b"hello".to_vec());
        assert!(send.write_to(&mut wire).unwrap());

        let mut recv = Receive::new("node-1", None);
        let mut cursor = &wire[..];
        let payload = recv.read_from(&mut cursor).unwrap().unwrap();
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn rejects_oversized_length_prefix() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&(MAX_FRAME_SIZE + 1).to_be_bytes());

        let mut recv = Receive::new("node-1", None);
        let mut cursor = &wire[..];
        let err = recv.read_from(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn accumulates_across_partial_reads() {
        let mut send = Send::new("node-1", vec![7u8; 10]);
        let mut wire = Vec::new();
        send.write_to(&mut wire).unwrap();

        let mut recv = Receive::new("node-1", None);
        // Feed the frame one byte at a time to exercise partial-read paths.
        for chunk_end in 1..=wire.len() {
            let mut cursor = &wire[chunk_end - 1..chunk_end];
            let result = recv.read_from(&mut cursor);
            if chunk_end < wire.len() {
                assert!(result.unwrap().is_none());
            } else {
                assert_eq!(result.unwrap().unwrap(), vec![7u8; 10]);
            }
        }
    }

    #[test]
    fn rejects_frames_over_the_configured_max_receive_size() {
        let mut wire = Vec::new();
        let mut send = Send::new("node-1", vec![0u8; 64]);
        send.write_to(&mut wire).unwrap();

        let mut recv = Receive::new("node-1", Some(32));
        let mut cursor = &wire[..];
        let err = recv.read_from(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
