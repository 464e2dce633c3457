use crate::core::Result;
use crate::htsp::message::{HtsField, HtsMsg};

/// 传输会话接口（连接、握手、重连由实现方负责）
///
/// 两种发送方式：
/// - `send_and_wait`: 普通的请求-应答，内部带超时
/// - `send_and_wait_nolock`: 不经过连接锁/重连等待的变体，只在重连恢复路径上使用，
///   否则会与正在重建连接的逻辑互相等待
pub trait Transport: Send + Sync {
    fn send_and_wait(&self, method: &str, msg: HtsMsg) -> Result<HtsMsg>;

    fn send_and_wait_nolock(&self, method: &str, msg: HtsMsg) -> Result<HtsMsg>;
}

/// 传输层回调：异步消息投递与重连通知
///
/// 两个方法都在传输层的投递线程上同步调用。
pub trait ConnectionListener: Send + Sync {
    /// 返回 false 表示"不是我的消息"，由其他层继续处理
    fn process_message(&self, method: &str, msg: &HtsMsg) -> bool;

    /// 传输层重连成功后调用
    fn reconnected(&self);
}

/// 从应答中取出错误码，字段缺失视为 0
///
/// 后端有时把错误写成字符串描述，非数字的非空字符串按错误码 1 处理。
pub fn reply_error_code(reply: &HtsMsg) -> u32 {
    match reply.get("error") {
        Some(HtsField::S64(code)) => u32::try_from(*code).unwrap_or(u32::MAX),
        Some(HtsField::Str(text)) if !text.is_empty() => text.trim().parse().unwrap_or(1),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_error_code() {
        assert_eq!(reply_error_code(&HtsMsg::new()), 0);
        assert_eq!(reply_error_code(&HtsMsg::new().add_u32("error", 0)), 0);
        assert_eq!(reply_error_code(&HtsMsg::new().add_u32("error", 3)), 3);
        assert_eq!(reply_error_code(&HtsMsg::new().add_str("error", "No such channel")), 1);
        assert_eq!(reply_error_code(&HtsMsg::new().add_str("error", "")), 0);
    }
}
