//! Property-based tests using proptest
//!
//! These tests check the codec, envelope and pool invariants across randomly
//! generated messages and inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::BytesMut;
use net_dispatch::core::codec::NetCodec;
use net_dispatch::core::serialization::{encode, parse_envelope, WireFormat, WirePayload};
use net_dispatch::core::types::{Quaternion, Vector3};
use net_dispatch::protocol::message::NetData;
use net_dispatch::protocol::messages::{
    DemoMessage, HandTracker, PeerInfoData, TrackerPacket, DEMO_MESSAGE_TAG,
};
use net_dispatch::protocol::registry::MessageRegistry;
use net_dispatch::transport::framing::{FrameCodec, WireFrame};
use net_dispatch::utils::pool::NetDataPool;
use proptest::prelude::*;
use tokio_util::codec::{Decoder, Encoder};

fn finite() -> impl Strategy<Value = f32> {
    -1.0e6f32..1.0e6f32
}

fn vector3() -> impl Strategy<Value = Vector3> {
    (finite(), finite(), finite()).prop_map(|(x, y, z)| Vector3::new(x, y, z))
}

fn quaternion() -> impl Strategy<Value = Quaternion> {
    (finite(), finite(), finite(), finite()).prop_map(|(x, y, z, w)| Quaternion::new(x, y, z, w))
}

fn decode_binary(registry: &MessageRegistry, frame: bytes::Bytes) -> Box<dyn NetData> {
    let mut reader = NetCodec::reader(frame);
    let tag = reader.read_tag().expect("frame has a tag");
    let mut decoded = registry.instantiate(tag).expect("tag is registered");
    reader.decode_message(decoded.as_mut()).expect("payload decodes");
    decoded
}

// Property: any string survives both wire formats
proptest! {
    #[test]
    fn prop_string_message_both_formats(message in ".{0,512}") {
        let registry = MessageRegistry::register_all();
        let original = DemoMessage { message: message.clone() };

        let WirePayload::Binary(frame) = encode(&original, WireFormat::Binary).unwrap() else {
            unreachable!()
        };
        let decoded = decode_binary(&registry, frame);
        prop_assert_eq!(&decoded.downcast_ref::<DemoMessage>().unwrap().message, &message);

        let WirePayload::Text(json) = encode(&original, WireFormat::Text).unwrap() else {
            unreachable!()
        };
        let (tag, data) = parse_envelope(&json).unwrap();
        prop_assert_eq!(tag, DEMO_MESSAGE_TAG);
        let mut from_text = registry.instantiate(tag).unwrap();
        from_text.read_json(data).unwrap();
        prop_assert_eq!(&from_text.downcast_ref::<DemoMessage>().unwrap().message, &message);
    }
}

// Property: compound numeric fields are bit-exact through the binary frame
proptest! {
    #[test]
    fn prop_tracker_binary_exact(
        position in vector3(),
        rotation in quaternion(),
        timestamp in finite(),
        valid in any::<bool>(),
    ) {
        let registry = MessageRegistry::register_all();
        let packet = TrackerPacket { position, rotation, timestamp };
        let hand = HandTracker { position, rotation, has_valid_position: valid };

        let mut codec = NetCodec::writer();
        codec.frame(&packet).unwrap();
        let decoded = decode_binary(&registry, codec.to_bytes());
        prop_assert_eq!(decoded.downcast_ref::<TrackerPacket>().unwrap(), &packet);

        codec.reset();
        codec.frame(&hand).unwrap();
        let decoded = decode_binary(&registry, codec.to_bytes());
        prop_assert_eq!(decoded.downcast_ref::<HandTracker>().unwrap(), &hand);
    }
}

// Property: encoding is deterministic
proptest! {
    #[test]
    fn prop_encoding_deterministic(name in "[a-zA-Z0-9 ]{0,64}", ip in "[0-9.]{0,15}") {
        let info = PeerInfoData { device_name: name, ip_address: ip };
        let first = encode(&info, WireFormat::Binary).unwrap();
        let second = encode(&info, WireFormat::Binary).unwrap();
        prop_assert_eq!(first, second);
    }
}

// Property: arbitrary bytes never panic the decoder
proptest! {
    #[test]
    fn prop_garbage_never_panics(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let registry = MessageRegistry::register_all();
        let mut reader = NetCodec::reader(data);
        if let Ok(tag) = reader.read_tag() {
            if let Ok(mut instance) = registry.instantiate(tag) {
                let _ = reader.decode_message(instance.as_mut());
            }
        }
    }
}

// Property: arbitrary text never panics the envelope parser
proptest! {
    #[test]
    fn prop_garbage_text_never_panics(text in ".{0,256}") {
        let _ = parse_envelope(&text);
    }
}

// Property: a reused instance decodes exactly like a fresh one
proptest! {
    #[test]
    fn prop_pool_reuse_matches_fresh(first in ".{0,64}", second in ".{0,64}") {
        let registry = MessageRegistry::register_all();
        let pool = NetDataPool::new(&registry);

        {
            let mut held = pool.acquire(DEMO_MESSAGE_TAG).unwrap();
            held.downcast_mut::<DemoMessage>().unwrap().message = first;
        }
        prop_assert_eq!(pool.available(DEMO_MESSAGE_TAG), 1);

        let reused = pool.acquire(DEMO_MESSAGE_TAG).unwrap();
        prop_assert_eq!(reused.downcast_ref::<DemoMessage>().unwrap(), &DemoMessage::default());
        drop(reused);

        let mut reused = pool.acquire(DEMO_MESSAGE_TAG).unwrap();
        let mut codec = NetCodec::writer();
        codec.frame(&DemoMessage { message: second.clone() }).unwrap();
        let mut reader = NetCodec::reader(codec.to_bytes());
        reader.read_tag().unwrap();
        reader.decode_message(&mut *reused).unwrap();
        prop_assert_eq!(&reused.downcast_ref::<DemoMessage>().unwrap().message, &second);
    }
}

// Property: transport frames survive the length-prefixed codec, even when
// split across reads
proptest! {
    #[test]
    fn prop_wire_frame_roundtrip(
        payload in prop::collection::vec(any::<u8>(), 0..4096),
        split in 0usize..4096,
    ) {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(WireFrame::Binary(payload.clone().into()), &mut buf).unwrap();

        let split = split.min(buf.len());
        let mut head = buf.split_to(split);
        let first = codec.decode(&mut head).unwrap();
        if split < 5 + payload.len() {
            prop_assert!(first.is_none());
            head.unsplit(buf);
            let frame = codec.decode(&mut head).unwrap();
            prop_assert_eq!(frame, Some(WireFrame::Binary(payload.into())));
        } else {
            prop_assert_eq!(first, Some(WireFrame::Binary(payload.into())));
        }
    }
}
