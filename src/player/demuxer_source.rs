use crate::core::{Result, SignalStatus, StreamDescriptor};
use crate::player::packet::DemuxPacket;

/// 播放器侧的解封装接口
///
/// 播放器通过这个 trait 驱动解封装器，不关心数据来自哪种后端。
/// 所有方法都可能在播放器线程上调用，实现方需要自行处理与投递线程的同步。
pub trait DemuxerSource: Send + Sync {
    /// 打开频道，失败时解封装器保持关闭状态
    fn open(&self, channel_id: u32) -> Result<()>;

    fn close(&self);

    /// 读取下一个数据包
    ///
    /// 返回：
    /// - Some(packet): 成功读取一个包（可能是 stream-change 标记）
    /// - None: 超时内没有数据
    fn read_packet(&self) -> Option<DemuxPacket>;

    /// 归还读到的数据包
    fn release_packet(&self, packet: DemuxPacket);

    fn flush(&self);

    fn abort(&self);

    fn current_id(&self) -> i32 {
        -1
    }

    /// 获取当前流属性（可能阻塞等待后端给出流集合）
    fn current_streams(&self) -> Result<Vec<StreamDescriptor>>;

    fn current_signal(&self) -> SignalStatus;

    /// 获取描述信息（用于调试）
    fn description(&self) -> String;
}
