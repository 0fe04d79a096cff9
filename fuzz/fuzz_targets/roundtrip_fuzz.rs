#![no_main]
use libfuzzer_sys::fuzz_target;
use morphmatch::compress::{CompressOptions, compress_all, decompress_all};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // First byte picks the block size and checksum flag.
    let flags = data[0];
    let payload = &data[1..];
    let opts = CompressOptions {
        block_size: 64 << (flags & 0x0F),
        checksum: flags & 0x80 != 0,
    };

    let frame = compress_all(Vec::new(), payload, opts).unwrap();
    let decoded = decompress_all(&frame).unwrap();
    assert_eq!(decoded, payload);
});
