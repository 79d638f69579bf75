//! # RPC
//!
//! 无连接数据报 RPC 传输层。
//!
//! 负责：
//! - 长度前缀数据报编解码（大端 method_id + payload 长度 + UTF-8 文本）
//! - 领导者/客户端 UDP 端点与接收循环
//! - 方法 ID 分发（处理器运行在独立的 dispatch worker 上）
//! - 客户端广播发现与领导者地址锁存
//!
//! 数据报丢失是预期行为；重发语义由上层协议自行负责。

pub mod method;
mod netutil;
mod payload;
mod transport;
mod wire;

pub use netutil::{broadcast_address, discovery_address, local_ipv4};
pub use payload::{Heartbeat, OffsetUpdate, SntpReq, SntpResp, TriggerTime, TwoA};
pub use transport::{ClientTransport, HandlerRegistry, LeaderTransport, RpcHandler};
pub use wire::{decode_frame, encode_frame, HEADER_BYTES, MAX_PAYLOAD_BYTES};
