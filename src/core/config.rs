use crate::core::{DemuxError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 解封装器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemuxerConfig {
    /// Read() 单次弹出的最长等待（毫秒）
    pub read_timeout_ms: u64,
    /// CurrentStreams() 等待流信息的最长时间（毫秒）
    pub stream_wait_timeout_ms: u64,
    /// 数据包队列容量（满时丢包，不阻塞投递线程）
    pub queue_capacity: usize,
    /// subscribe 请求中的 timeshiftPeriod，u32::MAX 表示不限
    pub timeshift_period: u32,
}

impl Default for DemuxerConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 1000,
            stream_wait_timeout_ms: 5000,
            queue_capacity: 2000,
            timeshift_period: u32::MAX,
        }
    }
}

impl DemuxerConfig {
    /// 从 JSON 文件加载配置（缺失字段使用默认值）
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(DemuxError::Config("queue_capacity 必须大于 0".to_string()));
        }
        if self.read_timeout_ms == 0 {
            return Err(DemuxError::Config("read_timeout_ms 必须大于 0".to_string()));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn stream_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_wait_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = DemuxerConfig::from_json_str(r#"{ "read_timeout_ms": 250 }"#).unwrap();
        assert_eq!(config.read_timeout(), Duration::from_millis(250));
        assert_eq!(config.stream_wait_timeout_ms, 5000);
        assert_eq!(config.timeshift_period, u32::MAX);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = DemuxerConfig::from_json_str(r#"{ "queue_capacity": 0 }"#).unwrap_err();
        assert!(matches!(err, DemuxError::Config(_)));
    }
}
