//! # Frame Sync
//!
//! 图像-元数据同步引擎（以同步协议规格为准）。
//!
//! 负责：
//! - 按传感器时间戳精确配对元数据与 N 路图像缓冲
//! - 有界队列与丢弃记账（背压即拒绝）
//! - 定时触发：首个达到目标时间戳的帧交付持久化
//!
//! ## 使用示例
//!
//! ```ignore
//! use frame_sync::FrameSynchronizer;
//!
//! let sync = FrameSynchronizer::new(vec![4, 4]);
//! sync.register_sink(Arc::new(|bundle| {
//!     // Handle matched bundle
//! }));
//!
//! sync.submit_metadata(metadata)?;
//! sync.submit_image(image)?;
//! ```

mod synchronizer;
mod trigger;

pub use synchronizer::{BundleCallback, FrameSynchronizer, SyncCounters};
pub use trigger::{TriggerDecision, TriggerScheduler};

// Re-export contracts types
pub use contracts::{FrameMetadata, ImageBuffer, MatchedBundle, TriggerTicket};
