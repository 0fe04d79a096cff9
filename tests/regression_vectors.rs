use morphmatch::MatchFinder;
use morphmatch::compress::block::{compress_block, decompress_block};

#[derive(Debug)]
enum Expect {
    Finder {
        pos: usize,
        max_len: usize,
        len: usize,
        match_pos: usize,
    },
    Block(Vec<u8>),
}

#[derive(Debug)]
struct Vector {
    name: String,
    data: Vec<u8>,
    expect: Expect,
}

fn hex_to_bytes(s: &str) -> Vec<u8> {
    let s = s.trim();
    if s.is_empty() {
        return Vec::new();
    }
    assert!(
        s.len().is_multiple_of(2),
        "hex string must have even length"
    );
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

fn load_vectors() -> Vec<Vector> {
    let manifest = include_str!("vectors/manifest.tsv");
    manifest
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .map(|line| {
            let parts: Vec<_> = line.split('|').collect();
            assert_eq!(parts.len(), 4, "invalid vector row: {line}");
            let expect = match parts[0] {
                "finder" => {
                    let n: Vec<usize> = parts[3].split(',').map(|v| v.trim().parse().unwrap()).collect();
                    assert_eq!(n.len(), 4, "invalid finder row: {line}");
                    Expect::Finder {
                        pos: n[0],
                        max_len: n[1],
                        len: n[2],
                        match_pos: n[3],
                    }
                }
                "block" => Expect::Block(hex_to_bytes(parts[3])),
                other => panic!("unknown vector kind {other}"),
            };
            Vector {
                name: parts[1].to_string(),
                data: hex_to_bytes(parts[2]),
                expect,
            }
        })
        .collect()
}

#[test]
fn vector_database_is_non_empty() {
    let vectors = load_vectors();
    assert!(vectors.iter().any(|v| matches!(v.expect, Expect::Finder { .. })));
    assert!(vectors.iter().any(|v| matches!(v.expect, Expect::Block(_))));
}

#[test]
fn finder_vectors() {
    for v in load_vectors() {
        let Expect::Finder {
            pos,
            max_len,
            len,
            match_pos,
        } = v.expect
        else {
            continue;
        };
        let mut finder = MatchFinder::<16>::new().unwrap();
        let m = finder.insert_and_find_best_match(&v.data, pos, max_len).unwrap();
        assert_eq!(m.len, len, "vector {}", v.name);
        if len > 0 {
            assert_eq!(m.pos, match_pos, "vector {}", v.name);
        }
        assert_eq!(finder.next_position(), pos, "vector {}", v.name);
    }
}

#[test]
fn finder_vectors_with_small_window() {
    // Every vector fits a 256-byte window, so the answer is unchanged.
    for v in load_vectors() {
        let Expect::Finder {
            pos, max_len, len, ..
        } = v.expect
        else {
            continue;
        };
        let mut finder = MatchFinder::<8>::new().unwrap();
        let m = finder.insert_and_find_best_match(&v.data, pos, max_len).unwrap();
        assert_eq!(m.len, len, "vector {}", v.name);
    }
}

#[test]
fn block_vectors_encode_exactly() {
    let mut finder = MatchFinder::new().unwrap();
    for v in load_vectors() {
        let Expect::Block(expected) = &v.expect else {
            continue;
        };
        let mut packed = Vec::new();
        compress_block(&mut finder, &v.data, &mut packed).unwrap();
        assert_eq!(&packed, expected, "vector {}", v.name);
    }
}

#[test]
fn block_vectors_decode() {
    for v in load_vectors() {
        let Expect::Block(packed) = &v.expect else {
            continue;
        };
        let mut out = Vec::new();
        decompress_block(packed, v.data.len(), &mut out).unwrap();
        assert_eq!(out, v.data, "vector {}", v.name);
    }
}
