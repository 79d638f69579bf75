//! 错误分层定义
//!
//! 按来源分层：config / transport / protocol / sync / persist

use thiserror::Error;

/// 统一错误类型
#[derive(Debug, Error)]
pub enum SyncError {
    // ===== 配置错误 =====
    /// 配置解析错误
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// 配置校验错误
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== 传输错误 =====
    /// 数据报发送/接收失败
    #[error("transport error: {message}")]
    Transport { message: String },

    /// 负载超出单个数据报上限
    #[error("payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    // ===== 协议错误 =====
    /// 未注册的方法 ID
    #[error("unknown rpc method: {method_id}")]
    UnknownMethod { method_id: i32 },

    /// 负载格式错误
    #[error("malformed payload for method {method_id}: {message}")]
    MalformedPayload { method_id: i32, message: String },

    /// 元数据缺少目标流
    #[error("capture request tag has no targets")]
    MissingTargets,

    // ===== 同步错误 =====
    /// 尚未安装时钟偏移
    #[error("no clock offset installed")]
    Unsynced,

    /// 流背压：超过在外缓冲上限
    #[error("backpressure on stream {stream}: {outstanding} outstanding (max {max})")]
    Backpressure {
        stream: usize,
        outstanding: usize,
        max: usize,
    },

    // ===== 持久化错误 =====
    /// Sink 写入错误
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    // ===== 通用错误 =====
    /// 组件已关闭
    #[error("component '{component}' is closed")]
    Closed { component: String },

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 其他错误
    #[error("{0}")]
    Other(String),
}

impl SyncError {
    /// 创建配置解析错误
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// 创建配置校验错误
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 创建传输错误
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// 创建负载格式错误
    pub fn malformed(method_id: i32, message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            method_id,
            message: message.into(),
        }
    }

    /// 创建 sink 写入错误
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// 创建组件已关闭错误
    pub fn closed(component: impl Into<String>) -> Self {
        Self::Closed {
            component: component.into(),
        }
    }
}
