//! # Clock
//!
//! 时钟域基础设施：单调 ticker、SNTP 偏移估计、时间域转换。
//!
//! 负责：
//! - 进程级严格单调纳秒时钟源
//! - 四时间戳 SNTP 样本折叠与突发选优
//! - 本机 ↔ 领导者时间域转换
//!
//! ## 使用示例
//!
//! ```ignore
//! use clock::{Ticker, TimeDomainConverter};
//!
//! let now = Ticker::global().now_ns();
//! let converter = TimeDomainConverter::new();
//! converter.install(offset);
//! let leader_ns = converter.leader_time_ns(now)?;
//! ```

mod domain;
mod sntp;
mod ticker;

pub use domain::TimeDomainConverter;
pub use sntp::{SntpBurst, SntpSample};
pub use ticker::Ticker;

// Re-export contracts types
pub use contracts::ClockOffset;
