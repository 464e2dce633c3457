// 解封装核心模块

pub mod packet;
pub mod packet_queue;
pub mod stream_table;
pub mod demuxer;
pub mod demuxer_source;  // Demuxer 抽象接口（播放器侧）
pub mod reader_thread;   // 播放器读线程

pub use packet::{DemuxPacket, HeapAllocator, PacketAllocator, PacketStreamId};
pub use packet_queue::PacketQueue;
pub use stream_table::StreamTable;
pub use demuxer::{DemuxStats, HtspDemuxer};
pub use demuxer_source::DemuxerSource;
pub use reader_thread::{ReaderEvent, ReaderThread};
