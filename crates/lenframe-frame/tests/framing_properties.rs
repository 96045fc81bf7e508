//! Round-trip and fragmentation properties of the framing layer.

use std::io::{Cursor, Read, Write};

use lenframe_frame::{FrameReader, FrameWriter, FramedChannel, FramingError, MAX_MESSAGE_SIZE};
use proptest::prelude::*;

/// Delivers at most `chunk` bytes per read call.
struct Trickle {
    inner: Cursor<Vec<u8>>,
    chunk: usize,
}

impl Read for Trickle {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let limit = buf.len().min(self.chunk);
        self.inner.read(&mut buf[..limit])
    }
}

fn encode_all(messages: &[Vec<u8>]) -> Vec<u8> {
    let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
    for message in messages {
        writer.send(message).expect("message within limit");
    }
    writer.into_inner().into_inner()
}

fn message_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..2048)
}

proptest! {
    #[test]
    fn prop_roundtrip_preserves_every_byte(messages in prop::collection::vec(message_strategy(), 1..8)) {
        let wire = encode_all(&messages);
        let mut reader = FrameReader::new(Cursor::new(wire));

        for expected in &messages {
            let received = reader.receive().expect("complete frame");
            prop_assert_eq!(received.as_ref(), expected.as_slice());
        }
        prop_assert!(reader.receive().expect_err("stream exhausted").is_clean_close());
    }

    #[test]
    fn prop_fragmentation_independent(message in message_strategy(), chunk in 1usize..7) {
        let wire = encode_all(std::slice::from_ref(&message));
        let mut reader = FrameReader::new(Trickle { inner: Cursor::new(wire), chunk });

        let received = reader.receive().expect("complete frame");
        prop_assert_eq!(received.as_ref(), message.as_slice());
    }

    #[test]
    fn prop_truncation_never_yields_a_message(message in prop::collection::vec(any::<u8>(), 1..512), cut in any::<prop::sample::Index>()) {
        let wire = encode_all(std::slice::from_ref(&message));
        let keep = cut.index(wire.len());
        let mut reader = FrameReader::new(Cursor::new(wire[..keep].to_vec()));

        let is_connection_closed = matches!(reader.receive(), Err(FramingError::ConnectionClosed { .. }));
        prop_assert!(is_connection_closed);
    }
}

#[test]
fn boundary_sizes_roundtrip() {
    for len in [0usize, 1, 255, 256, MAX_MESSAGE_SIZE - 1, MAX_MESSAGE_SIZE] {
        let message: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let wire = encode_all(std::slice::from_ref(&message));
        assert_eq!(wire.len(), 2 + len);
        assert_eq!(u16::from_be_bytes([wire[0], wire[1]]) as usize, len);

        let mut reader = FrameReader::new(Cursor::new(wire));
        assert_eq!(reader.receive().unwrap().as_ref(), message.as_slice());
    }
}

#[test]
fn one_past_max_fails_before_io() {
    struct Untouchable;

    impl Read for Untouchable {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            panic!("read should not be called");
        }
    }

    impl Write for Untouchable {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            panic!("write should not be called");
        }

        fn flush(&mut self) -> std::io::Result<()> {
            panic!("flush should not be called");
        }
    }

    let mut channel = FramedChannel::wrap(Untouchable);
    let err = channel.send(&vec![0u8; MAX_MESSAGE_SIZE + 1]).unwrap_err();
    assert!(matches!(err, FramingError::MessageTooLarge { size: 65536, max: 65535 }));
}
