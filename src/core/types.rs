use serde::{Deserialize, Serialize};
use std::fmt;

/// 编解码器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecType {
    Unknown,
    Video,
    Audio,
    Subtitle,
    Data,
}

/// 编解码器标识（由外部查表得到）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Codec {
    pub codec_type: CodecType,
    pub codec_id: u32,
}

impl Codec {
    pub const UNKNOWN: Codec = Codec {
        codec_type: CodecType::Unknown,
        codec_id: 0,
    };

    pub fn is_known(&self) -> bool {
        self.codec_type != CodecType::Unknown
    }
}

/// 语言代码（定长 3 字节，超长时按字符边界截断）
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Language {
    bytes: [u8; Language::CAPACITY],
    len: u8,
}

impl Language {
    pub const CAPACITY: usize = 3;

    pub fn new(code: &str) -> Self {
        let mut end = code.len().min(Self::CAPACITY);
        while !code.is_char_boundary(end) {
            end -= 1;
        }

        let mut bytes = [0u8; Self::CAPACITY];
        bytes[..end].copy_from_slice(&code.as_bytes()[..end]);
        Self {
            bytes,
            len: end as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        // new() 只在字符边界截断
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Language({:?})", self.as_str())
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单条基本流描述
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    pub physical_id: u32,       // 后端流索引（muxpkt 中的 stream 字段）
    pub codec_type: CodecType,
    pub codec_id: u32,
    pub codec_name: String,     // 后端给出的类型名，如 "H264"
    pub language: Language,     // 音频/字幕
    pub identifier: u32,        // DVB 字幕：composition | ancillary << 16
    pub channels: u32,          // 音频
    pub sample_rate: u32,       // 音频
    pub width: u32,             // 视频
    pub height: u32,            // 视频
    pub aspect: f32,            // 视频，den 为 0 时为 0.0
    pub fps_rate: u32,          // 视频
    pub fps_scale: u32,         // 视频
}

impl StreamDescriptor {
    pub fn new(physical_id: u32, codec_name: &str, codec: Codec) -> Self {
        Self {
            physical_id,
            codec_type: codec.codec_type,
            codec_id: codec.codec_id,
            codec_name: codec_name.to_string(),
            language: Language::default(),
            identifier: 0,
            channels: 0,
            sample_rate: 0,
            width: 0,
            height: 0,
            aspect: 0.0,
            fps_rate: 0,
            fps_scale: 0,
        }
    }
}

/// 信号源信息（来自 subscriptionStart 的 sourceinfo）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub adapter: String,
    pub mux: String,
    pub network: String,
    pub provider: String,
    pub service: String,
}

/// 前端信号状态（供播放器信号界面使用）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalStatus {
    pub adapter_name: String,
    pub adapter_status: String,
    pub service_name: String,
    pub provider_name: String,
    pub mux_name: String,
    pub snr: u32,
    pub signal: u32,
    pub ber: u32,
    pub unc: u32,
}

/// 服务端发送队列状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub packets: u32,
    pub bytes: u32,
    pub delay: u32,       // 微秒
    pub b_drops: u32,
    pub p_drops: u32,
    pub i_drops: u32,
}

/// 时移状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeshiftStatus {
    pub full: bool,
    pub shift: i64,
    pub start: Option<i64>,
    pub end: Option<i64>,
}

/// 跳转结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSkip {
    pub error: bool,
    pub absolute: bool,
    pub time: Option<i64>,
    pub size: Option<i64>,
}
