//! Codec benchmarks for linecast-protocol.

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use linecast_protocol::{codec, Event, LineCodec};

fn bench_encode_broadcast(c: &mut Criterion) {
    let event = Event::broadcast("test", "x".repeat(64));

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(64));
    group.bench_function("broadcast_64B", |b| {
        b.iter(|| codec::encode_event(black_box(&event)))
    });
    group.finish();
}

fn bench_decode_broadcast(c: &mut Criterion) {
    let event = Event::broadcast("test", "x".repeat(64));
    let encoded = codec::encode_event(&event).unwrap();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("broadcast_64B", |b| {
        b.iter(|| codec::decode_line(black_box(&encoded)))
    });
    group.finish();
}

fn bench_stream_decode(c: &mut Criterion) {
    let mut input = BytesMut::new();
    for i in 0..100 {
        codec::encode_event_into(&Event::subscribe(format!("topic:{}", i)), &mut input).unwrap();
    }

    c.bench_function("stream_decode_100_lines", |b| {
        b.iter(|| {
            let mut codec = LineCodec::default();
            let mut buf = input.clone();
            while let Ok(Some(event)) = codec.decode_from(&mut buf) {
                black_box(event);
            }
        })
    });
}

criterion_group!(
    benches,
    bench_encode_broadcast,
    bench_decode_broadcast,
    bench_stream_decode
);
criterion_main!(benches);
