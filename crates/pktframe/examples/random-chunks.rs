//! Decode a large frame delivered in small, randomly sized chunks, the way
//! a UART or radio link tends to hand bytes over.
//!
//! Run with:
//!   cargo run --example random-chunks

use rand::Rng;

use pktframe::codec::{encode, ChecksumMode, DecoderConfig, StreamDecoder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let payload = b"helloworld".repeat(1000);
    let frame = encode(&payload, ChecksumMode::Payload)?;

    let mut received = Vec::new();
    let mut decoder = StreamDecoder::with_config(
        |data: &[u8]| received.push(data.len()),
        DecoderConfig::default().with_max_payload_size(u32::try_from(payload.len())?),
    );

    let mut rng = rand::thread_rng();
    let mut offset = 0;
    let mut chunks = 0;
    while offset < frame.len() {
        let len = rng.gen_range(1..=10).min(frame.len() - offset);
        decoder.feed(&frame[offset..offset + len]);
        offset += len;
        chunks += 1;
    }
    drop(decoder);

    println!(
        "{} wire bytes in {chunks} chunks -> payloads {received:?}",
        frame.len()
    );
    Ok(())
}
