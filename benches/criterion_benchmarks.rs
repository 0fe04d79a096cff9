use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use morphmatch::MatchFinder;
use morphmatch::compress::block::compress_block;
use morphmatch::compress::{CompressOptions, compress_all, decompress_all};
use std::fs;
use std::path::Path;

fn gen_data(size: usize, seed: u64) -> Vec<u8> {
    let mut s = seed;
    let mut out = Vec::with_capacity(size);
    for _ in 0..size {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        out.push((s >> 33) as u8);
    }
    out
}

/// Text-like data: random words from a small vocabulary.
fn gen_text(size: usize, seed: u64) -> Vec<u8> {
    const WORDS: [&[u8]; 10] = [
        b"the ", b"match ", b"finder ", b"walks ", b"each ", b"level ", b"of ", b"its ",
        b"chain\n", b"window ",
    ];
    let noise = gen_data(size / 4 + 1, seed);
    let mut out = Vec::with_capacity(size + 8);
    let mut i = 0;
    while out.len() < size {
        out.extend_from_slice(WORDS[noise[i % noise.len()] as usize % WORDS.len()]);
        i += 1;
    }
    out.truncate(size);
    out
}

/// Long runs broken by short literals.
fn gen_runs(size: usize, seed: u64) -> Vec<u8> {
    let noise = gen_data(size / 8 + 1, seed);
    let mut out = Vec::with_capacity(size + 256);
    let mut i = 0;
    while out.len() < size {
        let byte = noise[i % noise.len()] % 4;
        let len = 4 + noise[(i + 1) % noise.len()] as usize;
        out.extend(std::iter::repeat_n(byte, len));
        out.push(noise[(i + 2) % noise.len()]);
        i += 3;
    }
    out.truncate(size);
    out
}

fn workloads(size: usize) -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("random", gen_data(size, 1)),
        ("text", gen_text(size, 2)),
        ("runs", gen_runs(size, 3)),
    ]
}

fn write_ratio_snapshot() {
    let mut csv = String::from("workload,input_bytes,frame_bytes,ratio\n");
    for (name, data) in workloads(1024 * 1024) {
        let frame = compress_all(Vec::new(), &data, CompressOptions::default()).unwrap();
        let ratio = frame.len() as f64 / data.len() as f64;
        csv.push_str(&format!("{name},{},{},{}\n", data.len(), frame.len(), ratio));
    }
    let out_dir = Path::new("target/criterion/custom_reports");
    let _ = fs::create_dir_all(out_dir);
    let _ = fs::write(out_dir.join("ratio_snapshot.csv"), csv);
}

fn bench_every_position(c: &mut Criterion) {
    let mut g = c.benchmark_group("finder_every_position");
    for (name, data) in workloads(256 * 1024) {
        g.throughput(Throughput::Bytes(data.len() as u64));
        let mut mf: MatchFinder = MatchFinder::new().unwrap();
        g.bench_function(name, |b| {
            b.iter(|| {
                mf.init();
                let mut total = 0usize;
                for pos in 0..data.len() {
                    total += mf.insert_and_find_best_match(&data, pos, 65_535).unwrap().len;
                }
                black_box(total);
            });
        });
    }
    g.finish();
}

fn bench_greedy_parse(c: &mut Criterion) {
    let mut g = c.benchmark_group("finder_greedy");
    for (name, data) in workloads(1024 * 1024) {
        g.throughput(Throughput::Bytes(data.len() as u64));
        let mut mf: MatchFinder = MatchFinder::new().unwrap();
        let mut packed = Vec::new();
        g.bench_function(name, |b| {
            b.iter(|| {
                packed.clear();
                compress_block(&mut mf, &data, &mut packed).unwrap();
                black_box(packed.len());
            });
        });
    }
    g.finish();
}

fn bench_window_log(c: &mut Criterion) {
    let data = gen_text(1024 * 1024, 4);
    let mut g = c.benchmark_group("window_log_vs_speed");
    g.throughput(Throughput::Bytes(data.len() as u64));

    fn scan<const W: u32>(data: &[u8]) -> usize {
        let mut mf = MatchFinder::<W>::new().unwrap();
        let mut pos = 0;
        let mut matched = 0;
        while pos < data.len() {
            let m = mf.insert_and_find_best_match(data, pos, 4096).unwrap();
            if m.is_some() {
                mf.insert_many(data, pos, m.len).unwrap();
                matched += m.len;
                pos += m.len;
            } else {
                pos += 1;
            }
        }
        matched
    }

    g.bench_with_input(BenchmarkId::from_parameter(12), &data, |b, d| {
        b.iter(|| black_box(scan::<12>(d)))
    });
    g.bench_with_input(BenchmarkId::from_parameter(16), &data, |b, d| {
        b.iter(|| black_box(scan::<16>(d)))
    });
    g.bench_with_input(BenchmarkId::from_parameter(20), &data, |b, d| {
        b.iter(|| black_box(scan::<20>(d)))
    });
    g.finish();
}

fn bench_frame_roundtrip(c: &mut Criterion) {
    write_ratio_snapshot();
    let mut g = c.benchmark_group("frame_mb_s");
    for (name, data) in workloads(4 * 1024 * 1024) {
        g.throughput(Throughput::Bytes(data.len() as u64));
        let frame = compress_all(Vec::new(), &data, CompressOptions::default()).unwrap();
        g.bench_function(format!("compress_{name}"), |b| {
            b.iter(|| black_box(compress_all(Vec::new(), &data, CompressOptions::default()).unwrap()))
        });
        g.bench_function(format!("decompress_{name}"), |b| {
            b.iter(|| black_box(decompress_all(&frame).unwrap()))
        });
    }
    g.finish();
}

criterion_group!(
    benches,
    bench_every_position,
    bench_greedy_parse,
    bench_window_log,
    bench_frame_roundtrip
);
criterion_main!(benches);
