//! Throughput harness for the UTF-8 decoders.
//!
//! Compares byte-at-a-time feeding, chunked feeding and whole-buffer
//! decoding over corpora shaped like the file names and REPL input the
//! diagnostics deal with.
//!
//! ## Usage
//!
//! ```sh
//! cargo run --release -p unidiag-core --example decode_throughput
//! ```

#![allow(clippy::pedantic)]

use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use smallvec as _;
use thiserror as _;
use tracing as _;
use unicode_normalization as _;
use unidiag_core::{decode_slice, DecodeOutcome, StreamDecoder};

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const NUM_THREADS: usize = 4;
const CORPUS_LEN: usize = 64 * 1024;
const CHUNK_LEN: usize = 7;

#[derive(Debug, Clone, Copy)]
enum Mode {
    ByteAtATime,
    Chunked,
    WholeBuffer,
}

impl Mode {
    const ALL: [Self; 3] = [Self::ByteAtATime, Self::Chunked, Self::WholeBuffer];

    const fn name(self) -> &'static str {
        match self {
            Self::ByteAtATime => "byte",
            Self::Chunked => "chunked",
            Self::WholeBuffer => "slice",
        }
    }
}

#[derive(Debug, Clone)]
struct BenchmarkResult {
    corpus: &'static str,
    mode: Mode,
    bytes_per_second: f64,
    scalars_per_second: f64,
}

fn corpus(seed: &[u8]) -> Vec<u8> {
    seed.iter().copied().cycle().take(CORPUS_LEN).collect()
}

fn corpora() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("ascii", corpus(b"hello_world-0123.txt ")),
        ("cjk", corpus("\u{4F60}\u{597D}\u{4E16}\u{754C}".as_bytes())),
        ("emoji", corpus("\u{1F600}\u{1F680}\u{2764}\u{FE0F}".as_bytes())),
        ("zalgo", corpus("Z\u{336}\u{311}a\u{35B}\u{30C}l\u{301}".as_bytes())),
        ("hostile", corpus(b"\xc0\x80\xed\xa0\x80\xf0\x9f\xff\xfe\x80a")),
    ]
}

fn count_scalars(outcomes: impl IntoIterator<Item = DecodeOutcome>) -> u64 {
    outcomes
        .into_iter()
        .filter(|outcome| outcome.scalar().is_some())
        .count() as u64
}

fn decode_once(mode: Mode, bytes: &[u8]) -> u64 {
    match mode {
        Mode::ByteAtATime => {
            let mut decoder = StreamDecoder::new();
            let mut scalars = 0;
            for &byte in bytes {
                scalars += count_scalars(decoder.feed(byte));
            }
            scalars + count_scalars(decoder.finish().map(DecodeOutcome::Invalid))
        }
        Mode::Chunked => {
            let mut decoder = StreamDecoder::new();
            let mut scalars = 0;
            for chunk in bytes.chunks(CHUNK_LEN) {
                scalars += count_scalars(decoder.feed_chunk(chunk));
            }
            scalars + count_scalars(decoder.finish().map(DecodeOutcome::Invalid))
        }
        Mode::WholeBuffer => count_scalars(decode_slice(bytes)),
    }
}

fn benchmark(
    corpus: &'static str,
    bytes: &[u8],
    mode: Mode,
    duration: Duration,
) -> BenchmarkResult {
    let (tx, rx) = mpsc::channel();

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|_| {
            let tx = tx.clone();
            let bytes = bytes.to_vec();
            thread::spawn(move || {
                let mut total_bytes = 0u64;
                let mut total_scalars = 0u64;
                let start = Instant::now();

                while start.elapsed() < duration {
                    total_scalars += decode_once(mode, &bytes);
                    total_bytes += bytes.len() as u64;
                }

                tx.send((total_bytes, total_scalars)).ok();
            })
        })
        .collect();

    for h in handles {
        h.join().ok();
    }

    drop(tx);

    let mut total_bytes = 0u64;
    let mut total_scalars = 0u64;
    for (b, s) in rx {
        total_bytes += b;
        total_scalars += s;
    }

    let elapsed_secs = duration.as_secs_f64();
    BenchmarkResult {
        corpus,
        mode,
        bytes_per_second: total_bytes as f64 / elapsed_secs,
        scalars_per_second: total_scalars as f64 / elapsed_secs,
    }
}

fn format_number(n: f64) -> String {
    if n >= 1_000_000_000.0 {
        format!("{:.2}G", n / 1_000_000_000.0)
    } else if n >= 1_000_000.0 {
        format!("{:.2}M", n / 1_000_000.0)
    } else if n >= 1_000.0 {
        format!("{:.2}K", n / 1_000.0)
    } else {
        format!("{n:.2}")
    }
}

fn print_results(results: &[BenchmarkResult]) {
    println!("{:10} {:8} {:>12} {:>14}", "corpus", "mode", "bytes/sec", "scalars/sec");
    for result in results {
        println!(
            "{:10} {:8} {:>12} {:>14}",
            result.corpus,
            result.mode.name(),
            format_number(result.bytes_per_second),
            format_number(result.scalars_per_second)
        );
    }
}

fn main() {
    let warmup = Duration::from_millis(300);
    let benchmark_duration = Duration::from_secs(1);
    let corpora = corpora();

    for (name, bytes) in &corpora {
        let reference = decode_once(Mode::WholeBuffer, bytes);
        for mode in Mode::ALL {
            assert_eq!(decode_once(mode, bytes), reference, "{name}: {mode:?}");
        }
    }

    println!("Running warmup for {warmup:?}...");
    let _ = benchmark("ascii", &corpora[0].1, Mode::ByteAtATime, warmup);

    println!("Running benchmarks for {benchmark_duration:?} each...\n");
    let mut results = Vec::new();
    for (name, bytes) in &corpora {
        for mode in Mode::ALL {
            results.push(benchmark(*name, bytes, mode, benchmark_duration));
        }
    }

    print_results(&results);
}
