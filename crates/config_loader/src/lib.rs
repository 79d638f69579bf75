//! # Config Loader
//!
//! 配置加载与解析模块。
//!
//! 负责：
//! - 解析 TOML/JSON 配置文件
//! - 校验配置合法性
//! - 生成 `NodeBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("node.toml")).unwrap();
//! println!("Client: {}", blueprint.node.client_id);
//! ```

mod parser;
mod validator;

pub use contracts::NodeBlueprint;
pub use parser::ConfigFormat;

use contracts::SyncError;
use std::path::Path;

/// 配置加载器
///
/// 提供从文件或字符串加载配置的静态方法。
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从文件路径加载配置
    ///
    /// 根据文件扩展名自动检测格式 (.toml / .json)。
    ///
    /// # Errors
    /// - 文件读取失败
    /// - 格式不支持
    /// - 解析失败
    /// - 校验失败
    pub fn load_from_path(path: &Path) -> Result<NodeBlueprint, SyncError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// 从字符串加载配置
    ///
    /// # Errors
    /// - 解析失败
    /// - 校验失败
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<NodeBlueprint, SyncError> {
        Self::parse_and_validate(content, format)
    }

    /// 将 NodeBlueprint 序列化为 TOML 字符串
    pub fn to_toml(blueprint: &NodeBlueprint) -> Result<String, SyncError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| SyncError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// 将 NodeBlueprint 序列化为 JSON 字符串
    pub fn to_json(blueprint: &NodeBlueprint) -> Result<String, SyncError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| SyncError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// 根据文件扩展名推断配置格式
    fn detect_format(path: &Path) -> Result<ConfigFormat, SyncError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            SyncError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext)
            .ok_or_else(|| SyncError::config_parse(format!("unsupported config format: .{ext}")))
    }

    /// 读取配置文件内容
    fn read_file(path: &Path) -> Result<String, SyncError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// 解析并校验配置内容
    fn parse_and_validate(content: &str, format: ConfigFormat) -> Result<NodeBlueprint, SyncError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TOML: &str = r#"
[node]
client_id = "cam-a"

[[streams]]
max_outstanding = 4

[[streams]]
max_outstanding = 2
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.node.client_id, "cam-a");
        assert_eq!(bp.streams.len(), 2);
        // Defaults fill in the unlisted sections.
        assert_eq!(bp.sntp.burst_size, 20);
        assert_eq!(bp.heartbeat.period_ms, 1_000);
        assert_eq!(bp.trigger.future_lead_ms, 500);
    }

    #[test]
    fn test_round_trip_toml() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.node.client_id, bp2.node.client_id);
        assert_eq!(bp.streams.len(), bp2.streams.len());
        assert_eq!(bp.phase.frame_period_ns, bp2.phase.frame_period_ns);
    }

    #[test]
    fn test_round_trip_json() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(bp.node.client_id, bp2.node.client_id);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        // step_gain outside (0, 1] must fail validation
        let content = r#"
[node]
client_id = "cam-a"

[phase]
frame_period_ns = 33333333
goal_phase_ns = 0
settle_frames = 4
tolerance_ns = 100000
min_inject_exposure_ns = 1000000
max_inject_exposure_ns = 65000000
step_gain = 1.5

[[streams]]
max_outstanding = 4
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("step_gain"));
    }
}
