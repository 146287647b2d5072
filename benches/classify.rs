//! Classification Benchmark for stubhttpd
//!
//! Measures how quickly request buffers are mapped to verbs, including the
//! worst case where every table entry is checked and nothing matches.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use stubhttpd::connection::BUFFER_CAPACITY;
use stubhttpd::protocol::{classify, write_bad_request};

/// Benchmark classification of recognized and unrecognized requests
fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    group.throughput(Throughput::Elements(1));

    group.bench_function("first_entry", |b| {
        let request = b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n";
        b.iter(|| black_box(classify(black_box(request))));
    });

    group.bench_function("last_entry", |b| {
        let request = b"PATCH /items/7 HTTP/1.1\r\nContent-Length: 0\r\n\r\n";
        b.iter(|| black_box(classify(black_box(request))));
    });

    group.bench_function("no_match", |b| {
        let request = b"FOO /x\r\n\r\n";
        b.iter(|| black_box(classify(black_box(request))));
    });

    group.bench_function("full_buffer", |b| {
        let mut request = vec![b'X'; BUFFER_CAPACITY - 1];
        request[..6].copy_from_slice(b"DELETE");
        b.iter(|| black_box(classify(black_box(&request))));
    });

    group.finish();
}

/// Benchmark building the bad-request line in a connection-sized buffer
fn bench_bad_request(c: &mut Criterion) {
    let mut buf = vec![0u8; BUFFER_CAPACITY];

    c.bench_function("write_bad_request", |b| {
        b.iter(|| black_box(write_bad_request(black_box(&mut buf)).ok()));
    });
}

criterion_group!(benches, bench_classify, bench_bad_request);
criterion_main!(benches);
