#![no_main]
use libfuzzer_sys::fuzz_target;
use morphmatch::MatchFinder;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    // First byte: max length and search mode. A small window keeps
    // expiry on the hot path.
    let greedy = data[0] & 1 != 0;
    let max_len = 4 + (data[0] >> 1) as usize * 4;
    let input = &data[1..];

    let mut mf = MatchFinder::<10>::new().unwrap();
    let mut pos = 0;
    while pos < input.len() {
        let m = mf.insert_and_find_best_match(input, pos, max_len).unwrap();
        if m.is_none() {
            pos += 1;
            continue;
        }
        assert!(m.len >= 4 && m.len <= max_len);
        assert!(m.pos < pos && pos - m.pos < 1 << 10);
        assert_eq!(input[m.pos..m.pos + m.len], input[pos..pos + m.len]);
        if greedy {
            mf.insert_many(input, pos, m.len).unwrap();
            pos += m.len;
        } else {
            pos += 1;
        }
    }
});
