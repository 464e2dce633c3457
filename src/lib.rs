//! HTSP 直播订阅解封装层
//!
//! 把后端异步、基于消息的 HTSP 协议转换成有序、带时间戳的基本流数据包，
//! 供播放器以轮询方式读取。网络 I/O、握手重连、编解码器表和数据包分配
//! 都由外部注入。

pub mod core;
pub mod htsp;
pub mod player;

pub use crate::core::{DemuxError, DemuxerConfig, Result};
pub use crate::htsp::{ConnectionListener, HtsMsg, Transport};
pub use crate::player::{DemuxPacket, DemuxerSource, HtspDemuxer, PacketStreamId};
