use crate::core::NOPTS_VALUE;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 数据包目标流
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketStreamId {
    /// 播放器侧流槽位（不是后端的流索引）
    Slot(u32),
    /// 流集合已变更，播放器需要重新读取流属性
    StreamChange,
}

/// 解封装后的数据包（一个访问单元）
#[derive(Debug, PartialEq)]
pub struct DemuxPacket {
    pub stream_id: PacketStreamId,
    pub data: Vec<u8>,
    pub pts: f64,
    pub dts: f64,
    pub duration: f64,
}

impl DemuxPacket {
    /// 创建指定大小的空包（时间戳为 NOPTS）
    pub fn with_size(size: usize) -> Self {
        Self {
            stream_id: PacketStreamId::StreamChange,
            data: vec![0; size],
            pts: NOPTS_VALUE,
            dts: NOPTS_VALUE,
            duration: 0.0,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_stream_change(&self) -> bool {
        self.stream_id == PacketStreamId::StreamChange
    }
}

/// 宿主的数据包分配器
///
/// 分配出去的包最终必须通过 `release` 归还，消费者负责归还自己弹出的包。
pub trait PacketAllocator: Send + Sync {
    fn allocate(&self, size: usize) -> Option<DemuxPacket>;

    fn release(&self, packet: DemuxPacket);
}

/// 默认堆分配器，记录未归还的包数量
#[derive(Debug, Default)]
pub struct HeapAllocator {
    outstanding: AtomicUsize,
}

impl HeapAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已分配但尚未归还的包数量
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

impl PacketAllocator for HeapAllocator {
    fn allocate(&self, size: usize) -> Option<DemuxPacket> {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        Some(DemuxPacket::with_size(size))
    }

    fn release(&self, packet: DemuxPacket) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        drop(packet);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_allocator_tracks_outstanding() {
        let alloc = HeapAllocator::new();
        let a = alloc.allocate(17).unwrap();
        let b = alloc.allocate(0).unwrap();
        assert_eq!(a.size(), 17);
        assert_eq!(b.size(), 0);
        assert_eq!(b.pts, NOPTS_VALUE);
        assert_eq!(alloc.outstanding(), 2);

        alloc.release(a);
        alloc.release(b);
        assert_eq!(alloc.outstanding(), 0);
    }
}
