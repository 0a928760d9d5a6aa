//! Frame a payload, scatter it through noise, and decode it again.
//!
//! Run with:
//!   cargo run --example hello-world

use pktframe::codec::{encode, ChecksumMode, StreamDecoder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let frame = encode(b"hello world", ChecksumMode::Payload)?;
    let wire: String = frame.iter().map(|b| format!("{b:02X}")).collect();
    println!("frame: {wire}");

    let mut stream = b"line noise ".to_vec();
    stream.extend_from_slice(&frame);
    stream.extend_from_slice(&frame);

    let mut decoder = StreamDecoder::new(|payload: &[u8]| {
        println!("payload: {}", String::from_utf8_lossy(payload));
    });
    for chunk in stream.chunks(4) {
        decoder.feed(chunk);
    }

    let stats = decoder.stats();
    println!(
        "frames={} discarded_bytes={}",
        stats.frames, stats.discarded_bytes
    );
    Ok(())
}
