//! 帧级数据结构
//!
//! 相机协作方产出的原始事件：元数据记录与图像缓冲。

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// User tag marking a phase-alignment injection frame.
///
/// Downstream consumers (trigger scheduler, persistence) discard bundles
/// carrying this tag.
pub const INJECT_FRAME_TAG: &str = "phase_align_inject";

/// Tag attached to every capture request.
///
/// `targets` lists the image stream indices the request will write to.
/// A request with empty targets never enters the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRequestTag {
    /// 目标图像流索引（小整数，升序）
    pub targets: Vec<usize>,

    /// 二级用户标签（注入帧等）
    pub user_tag: Option<String>,
}

impl CaptureRequestTag {
    /// Tag for a normal preview/still request covering `n_streams` streams.
    pub fn preview(n_streams: usize) -> Self {
        Self {
            targets: (0..n_streams).collect(),
            user_tag: None,
        }
    }

    /// Tag for a phase-alignment injection frame covering `n_streams` streams.
    pub fn injection(n_streams: usize) -> Self {
        Self {
            targets: (0..n_streams).collect(),
            user_tag: Some(INJECT_FRAME_TAG.to_string()),
        }
    }

    /// Whether this request is a phase-alignment injection frame.
    pub fn is_injection(&self) -> bool {
        self.user_tag.as_deref() == Some(INJECT_FRAME_TAG)
    }
}

/// Metadata record for one sensor frame.
///
/// Emitted by the camera collaborator for *every* frame, even when the
/// matching image buffer is later dropped under memory pressure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMetadata {
    /// 捕获请求标签
    pub tag: CaptureRequestTag,

    /// 传感器时间戳（本机单调时钟域，纳秒）
    pub sensor_timestamp_ns: i64,

    /// 帧序号（单调递增）
    pub sequence_id: u64,

    /// 帧时长（纳秒）
    pub frame_duration_ns: i64,
}

/// An image buffer from one configured stream.
///
/// Tagged with the same sensor timestamp as its metadata record. The
/// payload is zero-copy shared; ownership of the *accounting slot* is
/// tracked by the synchronizer until an explicit release.
#[derive(Debug, Clone)]
pub struct ImageBuffer {
    /// 所属图像流索引
    pub stream: usize,

    /// 传感器时间戳（与元数据同域）
    pub sensor_timestamp_ns: i64,

    /// 图像宽度
    pub width: u32,

    /// 图像高度
    pub height: u32,

    /// 原始像素数据（零拷贝）
    pub data: Bytes,
}
