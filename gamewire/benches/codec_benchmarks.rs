use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use gamewire::net::{Envelope, Frame, StreamReassembler, decode, encode};

fn login_payload() -> Vec<u8> {
    br#"{"email":"player@example.com","password":"hunter2"}"#.to_vec()
}

/// Encode one small JSON command
fn bench_encode(c: &mut Criterion) {
    let payload = login_payload();
    c.bench_function("encode_login", |b| {
        b.iter(|| encode(0x0100, &payload, 7));
    });
}

/// Decode one complete frame
fn bench_decode(c: &mut Criterion) {
    let bytes = encode(0x00C9, &login_payload(), 7).unwrap();
    c.bench_function("decode_login", |b| {
        b.iter(|| decode(&bytes));
    });
}

/// Decode plus JSON body parse, as done at the dispatch boundary
fn bench_envelope(c: &mut Criterion) {
    let frame = Frame::new(0x00C9, 7, login_payload());
    c.bench_function("envelope_from_frame", |b| {
        b.iter(|| Envelope::from_frame(frame.clone()));
    });
}

/// Reassemble a burst of frames delivered in fixed-size chunks
fn bench_reassembly(c: &mut Criterion) {
    let mut stream = Vec::new();
    for seq in 0..256u32 {
        stream.extend_from_slice(&encode(0x02BC, &login_payload(), seq).unwrap());
    }

    let mut group = c.benchmark_group("reassemble_256_frames");
    group.throughput(Throughput::Bytes(stream.len() as u64));
    for chunk_size in [64usize, 1460, 16 * 1024] {
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    let mut reassembler = StreamReassembler::new();
                    let mut count = 0;
                    for chunk in stream.chunks(chunk_size) {
                        count += reassembler.feed(chunk).count();
                    }
                    count
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_encode,
    bench_decode,
    bench_envelope,
    bench_reassembly
);
criterion_main!(benches);
