use crate::player::packet::{DemuxPacket, PacketAllocator};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// 数据包队列：投递线程写入、播放器读线程弹出
///
/// - 有界 channel，保持严格的插入顺序
/// - push 从不阻塞：队列满时把包交还调用方，由调用方归还给分配器
/// - pop 最多阻塞给定的超时时间
pub struct PacketQueue {
    tx: Sender<DemuxPacket>,
    rx: Receiver<DemuxPacket>,
    overflow_drops: AtomicU64,
}

impl PacketQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded::<DemuxPacket>(capacity.max(1));
        Self {
            tx,
            rx,
            overflow_drops: AtomicU64::new(0),
        }
    }

    /// 非阻塞写入，队列满时返回 Err(packet) 并计一次溢出丢弃
    pub fn push(&self, packet: DemuxPacket) -> std::result::Result<(), DemuxPacket> {
        self.try_push(packet).map_err(|packet| {
            self.overflow_drops.fetch_add(1, Ordering::Relaxed);
            packet
        })
    }

    /// 同 push，但不计入溢出统计，供调用方失败后还会重试的场合使用
    pub fn try_push(&self, packet: DemuxPacket) -> std::result::Result<(), DemuxPacket> {
        match self.tx.try_send(packet) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(packet)) | Err(TrySendError::Disconnected(packet)) => {
                Err(packet)
            }
        }
    }

    /// 阻塞弹出，超时返回 None
    pub fn pop(&self, timeout: Duration) -> Option<DemuxPacket> {
        match self.rx.recv_timeout(timeout) {
            Ok(packet) => Some(packet),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_pop(&self) -> Option<DemuxPacket> {
        self.rx.try_recv().ok()
    }

    /// 清空队列并把所有包归还分配器，返回清掉的数量
    pub fn drain(&self, allocator: &dyn PacketAllocator) -> usize {
        let mut count = 0;
        while let Some(packet) = self.try_pop() {
            allocator.release(packet);
            count += 1;
        }
        count
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(0)
    }

    /// 因队列满而被拒绝的包数量
    pub fn overflow_drops(&self) -> u64 {
        self.overflow_drops.load(Ordering::Relaxed)
    }
}
