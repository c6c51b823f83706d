//! Built-in message variants and the samples used by the echo demo.
//!
//! Tags 5 and 6 are reserved for peer discovery. Tags 9 to 20 belong to the
//! sample set; applications register their own variants next to (or instead
//! of) these.

use crate::core::types::{Matrix4x4, Quaternion, Vector3};
use crate::protocol::message::{Message, Tag};
use crate::protocol::registry::RegistryBuilder;
use serde::{Deserialize, Serialize};

pub const WHO_ARE_YOU_TAG: Tag = 5;
pub const PEER_INFO_TAG: Tag = 6;
pub const HEART_BEAT_TAG: Tag = 9;
pub const DEMO_MESSAGE_TAG: Tag = 10;
pub const DEMO_REPLY_TAG: Tag = 11;
pub const HAND_TRACKER_TAG: Tag = 13;
pub const CALIBRATION_TAG: Tag = 16;
pub const TRACKER_PACKET_TAG: Tag = 20;

/// Identity request; the receiver answers with [`PeerInfoData`].
/// Keep it braced: its text payload is the empty object `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WhoAreYou {}

impl Message for WhoAreYou {
    const TAG: Tag = WHO_ARE_YOU_TAG;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerInfoData {
    pub device_name: String,
    pub ip_address: String,
}

impl Message for PeerInfoData {
    const TAG: Tag = PEER_INFO_TAG;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartBeat {
    pub status: bool,
}

impl Message for HeartBeat {
    const TAG: Tag = HEART_BEAT_TAG;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemoMessage {
    pub message: String,
}

impl Message for DemoMessage {
    const TAG: Tag = DEMO_MESSAGE_TAG;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemoReply {
    pub reply: String,
}

impl Message for DemoReply {
    const TAG: Tag = DEMO_REPLY_TAG;
}

/// Pose of a tracked hand
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HandTracker {
    pub position: Vector3,
    pub rotation: Quaternion,
    pub has_valid_position: bool,
}

impl Message for HandTracker {
    const TAG: Tag = HAND_TRACKER_TAG;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationData {
    pub is_calibrated: bool,
    pub calibration_matrix: Matrix4x4,
    pub has_mounting_offset: bool,
    pub mounting_offset: Vector3,
    pub mounting_rotation_offset: Quaternion,
}

impl Message for CalibrationData {
    const TAG: Tag = CALIBRATION_TAG;
}

/// Timestamped tracker pose
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerPacket {
    pub position: Vector3,
    pub rotation: Quaternion,
    pub timestamp: f32,
}

impl Message for TrackerPacket {
    const TAG: Tag = TRACKER_PACKET_TAG;
}

/// Register every variant defined in this module
pub fn register_all(builder: RegistryBuilder) -> RegistryBuilder {
    builder
        .register::<WhoAreYou>()
        .register::<PeerInfoData>()
        .register::<HeartBeat>()
        .register::<DemoMessage>()
        .register::<DemoReply>()
        .register::<HandTracker>()
        .register::<CalibrationData>()
        .register::<TrackerPacket>()
}
