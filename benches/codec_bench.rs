use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use net_dispatch::core::codec::NetCodec;
use net_dispatch::core::serialization::{encode, parse_envelope, WireFormat};
use net_dispatch::core::types::{Quaternion, Vector3};
use net_dispatch::protocol::messages::{DemoMessage, TrackerPacket};
use net_dispatch::protocol::registry::MessageRegistry;
use net_dispatch::transport::framing::{FrameCodec, WireFrame};
use tokio_util::codec::{Decoder, Encoder};

fn tracker() -> TrackerPacket {
    TrackerPacket {
        position: Vector3::new(0.25, 1.6, -0.4),
        rotation: Quaternion::new(0.0, 0.38, 0.0, 0.92),
        timestamp: 1234.5,
    }
}

#[allow(clippy::unwrap_used)]
fn bench_binary_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("binary_frame");
    let registry = MessageRegistry::register_all();
    let packet = tracker();

    group.bench_function("encode_tracker", |b| {
        let mut codec = NetCodec::writer();
        b.iter(|| {
            codec.reset();
            codec.frame(&packet).unwrap();
        })
    });

    let mut writer = NetCodec::writer();
    writer.frame(&packet).unwrap();
    let frame = writer.to_bytes();
    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("decode_tracker", |b| {
        let mut instance = registry.instantiate(frame[0]).unwrap();
        b.iter(|| {
            let mut reader = NetCodec::reader(frame.clone());
            reader.read_tag().unwrap();
            reader.decode_message(instance.as_mut()).unwrap();
        })
    });

    for size in [16usize, 1024, 64 * 1024] {
        let message = DemoMessage {
            message: "x".repeat(size),
        };
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("encode_string_{size}b"), |b| {
            b.iter_batched(
                NetCodec::writer,
                |mut codec| {
                    codec.frame(&message).unwrap();
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_text_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_envelope");
    let packet = tracker();

    group.bench_function("encode_tracker", |b| {
        b.iter(|| encode(&packet, WireFormat::Text).unwrap())
    });

    let registry = MessageRegistry::register_all();
    let json = tracker_json(&packet);
    group.bench_function("decode_tracker", |b| {
        let mut instance = registry.instantiate(20).unwrap();
        b.iter(|| {
            let (_, data) = parse_envelope(&json).unwrap();
            instance.read_json(data).unwrap();
        })
    });

    group.finish();
}

#[allow(clippy::unwrap_used)]
fn tracker_json(packet: &TrackerPacket) -> String {
    use net_dispatch::protocol::message::NetData;
    packet.to_envelope().unwrap()
}

#[allow(clippy::unwrap_used)]
fn bench_transport_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("transport_frame");

    for size in [64usize, 4096, 65536] {
        let payload = bytes::Bytes::from(vec![0u8; size]);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("encode_decode_{size}b"), |b| {
            let mut codec = FrameCodec::default();
            let mut buf = BytesMut::with_capacity(size + 8);
            b.iter(|| {
                codec
                    .encode(WireFrame::Binary(payload.clone()), &mut buf)
                    .unwrap();
                let frame = codec.decode(&mut buf).unwrap();
                assert!(frame.is_some());
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_binary_frames,
    bench_text_envelope,
    bench_transport_frames
);
criterion_main!(benches);
