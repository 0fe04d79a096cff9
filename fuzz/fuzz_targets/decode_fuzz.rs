#![no_main]
use libfuzzer_sys::fuzz_target;
use morphmatch::compress::block::decompress_block;
use morphmatch::compress::decoder;

fuzz_target!(|data: &[u8]| {
    // Arbitrary frames must only ever produce errors, never panics.
    let _ = decoder::decompress_all(data);

    // Same for a bare block body, with the raw length taken from the input.
    if data.len() >= 2 {
        let raw_len = u16::from_le_bytes([data[0], data[1]]) as usize;
        let mut out = Vec::new();
        if decompress_block(&data[2..], raw_len, &mut out).is_ok() {
            assert_eq!(out.len(), raw_len);
        }
    }
});
