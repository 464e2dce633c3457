use crate::core::StreamDescriptor;
use crate::player::demuxer_source::DemuxerSource;
use crate::player::packet::DemuxPacket;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{error, info, warn};
use std::process;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

fn log_ctx() -> String {
    format!("[pid:{} tid:{:?}]", process::id(), thread::current().id())
}

/// 读线程命令
pub enum ReaderCommand {
    Flush,
    Stop,
}

/// 读线程输出
#[derive(Debug)]
pub enum ReaderEvent {
    Packet(DemuxPacket),
    /// 收到 stream-change 标记后重新读取的流属性
    StreamsChanged(Vec<StreamDescriptor>),
}

/// 播放器读线程
///
/// 在独立线程中循环调用 `read_packet()`，把数据包发到有界 channel：
/// - 下游消费慢时 send() 阻塞，背压只落在读线程上，不影响协议投递线程
/// - stream-change 标记在读线程中被消化，转换成 `StreamsChanged` 事件
/// - 下游负责通过 `release()` 归还收到的数据包
pub struct ReaderThread {
    source: Arc<dyn DemuxerSource>,
    thread_handle: Option<JoinHandle<()>>,
    command_tx: Sender<ReaderCommand>,
    pub events: Option<Receiver<ReaderEvent>>,
}

impl ReaderThread {
    /// 输出 channel 容量
    pub const CAPACITY: usize = 256;

    pub fn start(source: Arc<dyn DemuxerSource>) -> Self {
        let (command_tx, command_rx) = unbounded::<ReaderCommand>();
        let (event_tx, event_rx) = bounded::<ReaderEvent>(Self::CAPACITY);

        let thread_source = Arc::clone(&source);
        let thread_handle = thread::spawn(move || {
            Self::read_loop(&*thread_source, command_rx, event_tx);
        });

        Self {
            source,
            thread_handle: Some(thread_handle),
            command_tx,
            events: Some(event_rx),
        }
    }

    fn read_loop(
        source: &dyn DemuxerSource,
        command_rx: Receiver<ReaderCommand>,
        event_tx: Sender<ReaderEvent>,
    ) {
        info!("{} 🎬 读线程启动: {}", log_ctx(), source.description());

        let mut packet_count: usize = 0;
        let mut empty_reads: usize = 0;

        'outer: loop {
            // 优先处理所有命令（非阻塞）
            while let Ok(cmd) = command_rx.try_recv() {
                match cmd {
                    ReaderCommand::Flush => {
                        info!("{} 🧹 读线程收到 Flush 命令", log_ctx());
                        source.flush();
                    }
                    ReaderCommand::Stop => {
                        info!("{} ⏹ 读线程收到停止命令", log_ctx());
                        break 'outer;
                    }
                }
            }

            // read_packet 自带超时，None 只表示暂时没有数据
            let Some(packet) = source.read_packet() else {
                empty_reads += 1;
                continue;
            };

            let event = if packet.is_stream_change() {
                source.release_packet(packet);
                match source.current_streams() {
                    Ok(streams) => {
                        info!("{} 🔄 流集合变更: {} 个流", log_ctx(), streams.len());
                        ReaderEvent::StreamsChanged(streams)
                    }
                    Err(e) => {
                        warn!("{} ⚠️ 读取流属性失败: {}", log_ctx(), e);
                        continue;
                    }
                }
            } else {
                packet_count += 1;
                ReaderEvent::Packet(packet)
            };

            if let Err(e) = event_tx.send(event) {
                error!("{} ❌ 发送事件失败，接收端可能已关闭", log_ctx());
                if let ReaderEvent::Packet(packet) = e.into_inner() {
                    source.release_packet(packet);
                }
                break;
            }
        }

        info!(
            "{} 🛑 读线程退出（共读取 {} 个包，空读 {} 次）",
            log_ctx(),
            packet_count,
            empty_reads
        );
    }

    pub fn flush(&self) {
        let _ = self.command_tx.send(ReaderCommand::Flush);
    }

    /// 归还下游收到的数据包
    pub fn release(&self, packet: DemuxPacket) {
        self.source.release_packet(packet);
    }

    /// 取出事件接收端
    ///
    /// 取出后调用方要么持续消费，要么 drop 接收端，否则读线程会阻塞在 send() 上。
    pub fn take_events(&mut self) -> Option<Receiver<ReaderEvent>> {
        self.events.take()
    }

    /// 停止线程
    /// - 发送 Stop 命令
    /// - 归还 channel 中尚未消费的包
    /// - join 线程
    pub fn stop(&mut self) {
        info!("{} 🛑 ReaderThread::stop() called", log_ctx());
        let _ = self.command_tx.send(ReaderCommand::Stop);

        // 读线程可能阻塞在 send() 上：一直取到线程退出、发送端被 drop 为止
        if let Some(events) = self.events.take() {
            while let Ok(event) = events.recv() {
                if let ReaderEvent::Packet(packet) = event {
                    self.source.release_packet(packet);
                }
            }
        }

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ReaderThread {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            warn!("{} ⚠ ReaderThread 被 drop，但可能未调用 stop()，正在尝试优雅停止", log_ctx());
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DemuxerConfig;
    use crate::htsp::codec::DefaultCodecTable;
    use crate::htsp::message::{HtsField, HtsMsg};
    use crate::htsp::scripted::ScriptedTransport;
    use crate::player::demuxer::HtspDemuxer;
    use crate::player::packet::{HeapAllocator, PacketStreamId};
    use std::time::Duration;

    #[test]
    fn test_reader_forwards_packets_and_stream_changes() {
        let allocator = Arc::new(HeapAllocator::new());
        let config = DemuxerConfig {
            read_timeout_ms: 20,
            ..Default::default()
        };
        let demuxer = Arc::new(HtspDemuxer::new(
            Arc::new(ScriptedTransport::new()),
            Arc::new(DefaultCodecTable),
            allocator.clone(),
            config,
        ));
        demuxer.open(1).unwrap();
        let sub_id = demuxer.subscription_id().unwrap();

        let start = HtsMsg::new().add_u32("subscriptionId", sub_id).add_list(
            "streams",
            vec![HtsField::Map(
                HtsMsg::new().add_u32("index", 3).add_str("type", "H264"),
            )],
        );
        demuxer.process_message("subscriptionStart", &start);
        let pkt = HtsMsg::new()
            .add_u32("subscriptionId", sub_id)
            .add_u32("stream", 3)
            .add_bin("payload", &[7; 10]);
        demuxer.process_message("muxpkt", &pkt);

        let mut reader = ReaderThread::start(demuxer.clone());
        let events = reader.take_events().unwrap();

        match events.recv_timeout(Duration::from_secs(2)).unwrap() {
            ReaderEvent::StreamsChanged(streams) => assert_eq!(streams.len(), 1),
            other => panic!("unexpected event: {:?}", other),
        }
        match events.recv_timeout(Duration::from_secs(2)).unwrap() {
            ReaderEvent::Packet(packet) => {
                assert_eq!(packet.stream_id, PacketStreamId::Slot(0));
                assert_eq!(packet.size(), 10);
                reader.release(packet);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        reader.stop();
        demuxer.close();
        assert_eq!(allocator.outstanding(), 0);
    }
}
