//! End-to-end pipe stream scenarios.

use nbstream::test_utils::init_test_logging;
use nbstream::{test_complete, test_phase, PipeBuf};

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn five_thousand_byte_burst_recovers_in_order() {
    init_test_logging();
    test_phase!("five_thousand_byte_burst");

    let mut pipe = PipeBuf::open().unwrap();
    let data = pattern(5000);
    pipe.write(&data).unwrap();

    // Writing fills and drains whole windows; the tail that never filled a
    // window stays deferred until the explicit flush.
    assert_eq!(pipe.write_remaining(), 5000 % pipe.capacity());

    pipe.flush().unwrap();
    assert_eq!(pipe.write_remaining(), 0);

    let mut out = vec![0u8; 5000];
    let mut got = 0;
    while got < out.len() {
        got += pipe.read(&mut out[got..]).unwrap();
    }
    assert_eq!(out, data);
    test_complete!("five_thousand_byte_burst", bytes = got);
}

#[test]
fn oversized_burst_grows_then_shrinks_the_window() {
    init_test_logging();
    test_phase!("oversized_burst");

    const TOTAL: usize = 200_000;
    let mut pipe = PipeBuf::open().unwrap();
    let data = pattern(TOTAL);

    // Far more than the kernel pipe buffer and the default window together:
    // the write must defer the overflow and grow, not lose bytes.
    pipe.write(&data).unwrap();
    assert!(pipe.write_remaining() > 0);
    assert!(pipe.write_capacity() > pipe.capacity());

    // Drain only what the kernel already accepted, without flushing: the
    // deferred count plus the kernel-held count must account for every byte.
    let mut out = Vec::with_capacity(TOTAL);
    let mut chunk = [0u8; 8192];
    loop {
        if pipe.available().unwrap() == 0 {
            break;
        }
        let n = pipe.read(&mut chunk).unwrap();
        out.extend_from_slice(&chunk[..n]);
    }
    assert_eq!(out.len() + pipe.write_remaining(), TOTAL);

    // Alternate flush and read until everything is recovered.
    while out.len() < TOTAL {
        pipe.flush().unwrap();
        let n = pipe.read(&mut chunk).unwrap();
        out.extend_from_slice(&chunk[..n]);
    }
    assert_eq!(out, data);

    // Fully drained: the window has shrunk back to the default capacity.
    pipe.flush().unwrap();
    assert_eq!(pipe.write_remaining(), 0);
    assert_eq!(pipe.write_capacity(), pipe.capacity());
    test_complete!("oversized_burst", bytes = out.len());
}

#[test]
fn would_block_reads_are_not_end_of_stream() {
    init_test_logging();
    test_phase!("would_block_taxonomy");

    let mut pipe = PipeBuf::open().unwrap();

    // Nothing written: the non-blocking top-up hits would-block, which is
    // neither an error nor end of stream.
    assert_eq!(pipe.available().unwrap(), 0);

    pipe.write(b"still alive").unwrap();
    pipe.flush().unwrap();
    assert_eq!(pipe.read_byte().unwrap(), Some(b's'));

    // Only the genuine zero-length read after the writer closes is EOF.
    pipe.close_write();
    let mut rest = vec![0u8; 10];
    let mut got = 0;
    while got < rest.len() {
        let n = pipe.read(&mut rest[got..]).unwrap();
        assert!(n > 0);
        got += n;
    }
    assert_eq!(&rest, b"till alive");
    assert_eq!(pipe.read_byte().unwrap(), None);
    test_complete!("would_block_taxonomy");
}
