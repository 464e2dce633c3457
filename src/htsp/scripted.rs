use crate::core::{DemuxError, Result};
use crate::htsp::message::HtsMsg;
use crate::htsp::transport::Transport;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// 一次已发送的请求
#[derive(Debug, Clone, PartialEq)]
pub struct SentRequest {
    pub method: String,
    pub msg: HtsMsg,
    pub nolock: bool,
}

/// 脚本化传输：按顺序返回预设应答，没有预设时返回空应答（成功）
///
/// 用于回放工具和测试，不做任何网络 I/O。
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Option<HtsMsg>>>,
    sent: Mutex<Vec<SentRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预设下一次请求的应答
    pub fn push_reply(&self, reply: HtsMsg) {
        self.replies.lock().push_back(Some(reply));
    }

    /// 预设下一次请求得不到应答（模拟连接失败/超时）
    pub fn push_no_reply(&self) {
        self.replies.lock().push_back(None);
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().clone()
    }

    pub fn sent_methods(&self) -> Vec<String> {
        self.sent.lock().iter().map(|r| r.method.clone()).collect()
    }

    fn respond(&self, method: &str, msg: HtsMsg, nolock: bool) -> Result<HtsMsg> {
        self.sent.lock().push(SentRequest {
            method: method.to_string(),
            msg,
            nolock,
        });

        match self.replies.lock().pop_front() {
            Some(Some(reply)) => Ok(reply),
            Some(None) => Err(DemuxError::Transport(format!("{} 没有应答", method))),
            None => Ok(HtsMsg::new()),
        }
    }
}

impl Transport for ScriptedTransport {
    fn send_and_wait(&self, method: &str, msg: HtsMsg) -> Result<HtsMsg> {
        self.respond(method, msg, false)
    }

    fn send_and_wait_nolock(&self, method: &str, msg: HtsMsg) -> Result<HtsMsg> {
        self.respond(method, msg, true)
    }
}
