use thiserror::Error;

#[derive(Error, Debug)]
pub enum DemuxError {
    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON 错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("传输错误: {0}")]
    Transport(String),

    #[error("服务器返回错误码 {code} ({method})")]
    Server { method: String, code: u32 },

    #[error("消息格式错误: {0}")]
    Malformed(String),

    #[error("等待流信息超时 ({0}ms)")]
    Timeout(u64),

    #[error("订阅已关闭")]
    Closed,

    #[error("配置错误: {0}")]
    Config(String),
}

impl DemuxError {
    /// 是否属于"服务器错误"一类（播放器侧统一映射为 SERVER_ERROR）
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            DemuxError::Transport(_) | DemuxError::Server { .. } | DemuxError::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DemuxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_classification() {
        assert!(DemuxError::Timeout(5000).is_server_error());
        assert!(DemuxError::Server { method: "subscribe".into(), code: 1 }.is_server_error());
        assert!(!DemuxError::Closed.is_server_error());
        assert!(!DemuxError::Malformed("muxpkt".into()).is_server_error());
    }
}
