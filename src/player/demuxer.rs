use crate::core::{
    tvh_to_dvd_time, timestamp_or_nopts, DemuxError, DemuxerConfig, QueueStatus, Result,
    SignalStatus, SourceInfo, StreamDescriptor, SubscriptionSkip, TimeshiftStatus,
};
use crate::htsp::codec::CodecLookup;
use crate::htsp::events::{self, FrontendStatus, MuxPacket, SubscriptionEvent, SubscriptionStart};
use crate::htsp::message::HtsMsg;
use crate::htsp::transport::{reply_error_code, ConnectionListener, Transport};
use crate::player::demuxer_source::DemuxerSource;
use crate::player::packet::{DemuxPacket, PacketAllocator, PacketStreamId};
use crate::player::packet_queue::PacketQueue;
use crate::player::stream_table::{descriptor_from_definition, StreamTable};
use log::{debug, error, info, warn};
use parking_lot::{Condvar, Mutex};
use std::process;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

fn log_ctx() -> String {
    format!("[pid:{} tid:{:?}]", process::id(), thread::current().id())
}

/// 仅用于日志节流
const LOG_FIRST_N: u64 = 5;

/// 正常播放速度（百分比）
const NORMAL_SPEED: i32 = 100;

/// 受状态锁保护的会话数据
///
/// 流表替换、队列清空、槽位解析+入队都在这把锁下完成，
/// 这样 stream-change 标记之后不会再出现按旧流表解析的包。
struct SessionState {
    streams: StreamTable,
    started: bool,
    /// close/abort 时递增，唤醒等待者并告知"已关闭"
    teardown: u64,
    source: SourceInfo,
    signal: SignalStatus,
    queue_status: Option<QueueStatus>,
    timeshift: Option<TimeshiftStatus>,
    last_skip: Option<SubscriptionSkip>,
    speed: i32,
}

impl SessionState {
    fn new() -> Self {
        Self {
            streams: StreamTable::new(),
            started: false,
            teardown: 0,
            source: SourceInfo::default(),
            signal: SignalStatus::default(),
            queue_status: None,
            timeshift: None,
            last_skip: None,
            speed: NORMAL_SPEED,
        }
    }

    fn reset_metadata(&mut self) {
        self.source = SourceInfo::default();
        self.signal = SignalStatus::default();
        self.queue_status = None;
        self.timeshift = None;
        self.last_skip = None;
        self.speed = NORMAL_SPEED;
    }
}

/// 数据包统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemuxStats {
    pub queued: u64,
    pub unresolved: u64,
    pub malformed: u64,
    pub overflow: u64,
}

/// HTSP 订阅解封装器
///
/// 两个线程与之交互：
/// - 传输层的投递线程调用 `process_message` / `reconnected`
/// - 播放器的读线程调用 `read` 等接口
///
/// 订阅 id 是入站消息唯一的关联键，`active_sub_id` 为 0 表示没有活动订阅。
pub struct HtspDemuxer {
    transport: Arc<dyn Transport>,
    codecs: Arc<dyn CodecLookup>,
    allocator: Arc<dyn PacketAllocator>,
    config: DemuxerConfig,

    queue: PacketQueue,
    state: Mutex<SessionState>,
    start_cond: Condvar,

    channel_id: AtomicU32,
    last_sub_id: AtomicU32,
    active_sub_id: AtomicU32,
    opened: AtomicBool,

    queued_count: AtomicU64,
    unresolved_count: AtomicU64,
    malformed_count: AtomicU64,
}

impl HtspDemuxer {
    pub fn new(
        transport: Arc<dyn Transport>,
        codecs: Arc<dyn CodecLookup>,
        allocator: Arc<dyn PacketAllocator>,
        config: DemuxerConfig,
    ) -> Self {
        Self {
            transport,
            codecs,
            allocator,
            queue: PacketQueue::new(config.queue_capacity),
            config,
            state: Mutex::new(SessionState::new()),
            start_cond: Condvar::new(),
            channel_id: AtomicU32::new(0),
            last_sub_id: AtomicU32::new(0),
            active_sub_id: AtomicU32::new(0),
            opened: AtomicBool::new(false),
            queued_count: AtomicU64::new(0),
            unresolved_count: AtomicU64::new(0),
            malformed_count: AtomicU64::new(0),
        }
    }

    // ============= 播放器接口 =============

    /// 打开频道：先关闭现有订阅，再发送新的 subscribe 并等待应答
    pub fn open(&self, channel_id: u32) -> Result<()> {
        self.close();

        self.channel_id.store(channel_id, Ordering::SeqCst);
        self.state.lock().started = false;

        match self.send_subscribe(false) {
            Ok(()) => {
                self.opened.store(true, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                warn!("{} ⚠️ 打开频道 {:08x} 失败: {}", log_ctx(), channel_id, e);
                self.teardown_locally();
                Err(e)
            }
        }
    }

    /// 关闭订阅：先在本地失效，再尽力发送 unsubscribe
    pub fn close(&self) {
        if !self.opened.load(Ordering::SeqCst) {
            return;
        }
        let sub_id = self.active_sub_id.load(Ordering::SeqCst);
        self.teardown_locally();
        self.send_unsubscribe(sub_id);
    }

    /// 弹出一个数据包，超时返回 None
    pub fn read(&self) -> Option<DemuxPacket> {
        self.queue.pop(self.config.read_timeout())
    }

    /// 归还从 read() 得到的数据包
    pub fn release(&self, packet: DemuxPacket) {
        self.allocator.release(packet);
    }

    /// 清空缓冲的数据包
    pub fn flush(&self) {
        let _state = self.state.lock();
        let count = self.queue.drain(&*self.allocator);
        if count > 0 {
            debug!("{} 🧹 flush 清掉 {} 个数据包", log_ctx(), count);
        }
    }

    /// 本地中止：清空流表和队列并唤醒等待者，不通知后端
    ///
    /// 订阅本身保持打开，之后的 close() 仍会发送 unsubscribe。
    pub fn abort(&self) {
        info!("{} ⏹ 中止解封装", log_ctx());
        let mut state = self.state.lock();
        self.reset_session(&mut state);
    }

    /// 当前"主"流 id，本实现不跟踪，固定返回 -1
    pub fn current_id(&self) -> i32 {
        -1
    }

    /// 等待流集合就绪后返回流属性
    ///
    /// - 超时返回 `DemuxError::Timeout`（播放器侧映射为服务器错误）
    /// - 等待期间被 close/abort 返回 `DemuxError::Closed`
    pub fn current_streams(&self) -> Result<Vec<StreamDescriptor>> {
        if self.active_sub_id.load(Ordering::SeqCst) == 0 {
            return Err(DemuxError::Closed);
        }

        let mut state = self.state.lock();
        let teardown = state.teardown;
        let deadline = Instant::now() + self.config.stream_wait_timeout();

        while !state.started && state.teardown == teardown {
            if self.start_cond.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }

        if state.started {
            Ok(state.streams.properties())
        } else if state.teardown != teardown {
            Err(DemuxError::Closed)
        } else {
            warn!("{} ⚠️ 等待流信息超时", log_ctx());
            Err(DemuxError::Timeout(self.config.stream_wait_timeout_ms))
        }
    }

    pub fn current_signal(&self) -> SignalStatus {
        self.state.lock().signal.clone()
    }

    pub fn source_info(&self) -> SourceInfo {
        self.state.lock().source.clone()
    }

    pub fn queue_status(&self) -> Option<QueueStatus> {
        self.state.lock().queue_status
    }

    pub fn timeshift_status(&self) -> Option<TimeshiftStatus> {
        self.state.lock().timeshift
    }

    pub fn last_skip(&self) -> Option<SubscriptionSkip> {
        self.state.lock().last_skip
    }

    pub fn speed(&self) -> i32 {
        self.state.lock().speed
    }

    pub fn is_opened(&self) -> bool {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    pub fn channel_id(&self) -> u32 {
        self.channel_id.load(Ordering::SeqCst)
    }

    /// 当前活动订阅 id
    pub fn subscription_id(&self) -> Option<u32> {
        match self.active_sub_id.load(Ordering::SeqCst) {
            0 => None,
            id => Some(id),
        }
    }

    pub fn buffered_packets(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> DemuxStats {
        DemuxStats {
            queued: self.queued_count.load(Ordering::Relaxed),
            unresolved: self.unresolved_count.load(Ordering::Relaxed),
            malformed: self.malformed_count.load(Ordering::Relaxed),
            overflow: self.queue.overflow_drops(),
        }
    }

    // ============= 发送 =============

    fn send_subscribe(&self, force: bool) -> Result<()> {
        let channel_id = self.channel_id.load(Ordering::SeqCst);
        let sub_id = self
            .last_sub_id
            .fetch_add(1, Ordering::SeqCst)
            .wrapping_add(1)
            .max(1);
        self.active_sub_id.store(sub_id, Ordering::SeqCst);

        let msg = HtsMsg::new()
            .add_u32("channelId", channel_id)
            .add_u32("subscriptionId", sub_id)
            .add_u32("timeshiftPeriod", self.config.timeshift_period);

        debug!("{} subscribe to {:08x} (subscriptionId {})", log_ctx(), channel_id, sub_id);
        let reply = if force {
            self.transport.send_and_wait_nolock("subscribe", msg)
        } else {
            self.transport.send_and_wait("subscribe", msg)
        };

        let reply = reply.map_err(|e| {
            warn!("{} ❌ 发送 subscribe 失败: {}", log_ctx(), e);
            e
        })?;

        let code = reply_error_code(&reply);
        if code != 0 {
            warn!("{} ❌ subscribe 被拒绝, error {}", log_ctx(), code);
            return Err(DemuxError::Server {
                method: "subscribe".to_string(),
                code,
            });
        }

        info!("{} ✅ 成功订阅频道 {:08x} (subscriptionId {})", log_ctx(), channel_id, sub_id);
        Ok(())
    }

    fn send_unsubscribe(&self, sub_id: u32) {
        let msg = HtsMsg::new().add_u32("subscriptionId", sub_id);

        debug!("{} unsubscribe from {}", log_ctx(), sub_id);
        match self.transport.send_and_wait("unsubscribe", msg) {
            Ok(reply) => {
                let code = reply_error_code(&reply);
                if code != 0 {
                    warn!("{} ⚠️ unsubscribe {} 返回 error {}", log_ctx(), sub_id, code);
                } else {
                    debug!("{} 成功取消订阅 {}", log_ctx(), sub_id);
                }
            }
            Err(e) => warn!("{} ⚠️ 发送 unsubscribe 失败: {}", log_ctx(), e),
        }
    }

    /// 本地拆除会话：订阅失效后重置会话状态
    fn teardown_locally(&self) {
        let mut state = self.state.lock();
        self.opened.store(false, Ordering::SeqCst);
        self.active_sub_id.store(0, Ordering::SeqCst);
        self.reset_session(&mut state);
    }

    /// 清空流表和队列、唤醒等待者；调用方持有状态锁
    fn reset_session(&self, state: &mut SessionState) {
        state.started = false;
        state.teardown = state.teardown.wrapping_add(1);
        state.streams.clear();
        state.reset_metadata();
        self.queue.drain(&*self.allocator);
        self.start_cond.notify_all();
    }

    fn is_current(&self, sub_id: u32) -> bool {
        sub_id != 0 && self.active_sub_id.load(Ordering::SeqCst) == sub_id
    }

    // ============= 入站消息 =============

    /// 处理入站消息，返回 false 表示不是订阅消息
    pub fn process_message(&self, method: &str, msg: &HtsMsg) -> bool {
        let Some(sub_id) = events::subscription_id(msg) else {
            return false;
        };

        // 旧订阅（刚被替换或关闭）的消息：接收但忽略
        if !self.is_current(sub_id) {
            return true;
        }

        match SubscriptionEvent::decode(method, msg) {
            Ok(event) => self.handle_event(sub_id, event),
            Err(e) => {
                self.malformed_count.fetch_add(1, Ordering::Relaxed);
                error!("{} ❌ {}", log_ctx(), e);
            }
        }
        true
    }

    fn handle_event(&self, sub_id: u32, event: SubscriptionEvent<'_>) {
        match event {
            SubscriptionEvent::MuxPacket(pkt) => self.handle_mux_packet(sub_id, pkt),
            SubscriptionEvent::SubscriptionStart(start) => {
                self.handle_subscription_start(sub_id, start)
            }
            SubscriptionEvent::SubscriptionStop { status } => {
                self.handle_subscription_stop(sub_id, status)
            }
            SubscriptionEvent::QueueStatus(status) => {
                self.with_current(sub_id, |state| state.queue_status = Some(status));
            }
            SubscriptionEvent::SignalStatus(fe) => {
                self.with_current(sub_id, |state| apply_frontend_status(&mut state.signal, fe));
            }
            SubscriptionEvent::TimeshiftStatus(status) => {
                self.with_current(sub_id, |state| state.timeshift = Some(status));
            }
            SubscriptionEvent::SubscriptionSkip(skip) => {
                debug!("{} subscriptionSkip: {:?}", log_ctx(), skip);
                self.with_current(sub_id, |state| state.last_skip = Some(skip));
            }
            SubscriptionEvent::SubscriptionSpeed { speed } => {
                debug!("{} subscriptionSpeed: {}", log_ctx(), speed);
                self.with_current(sub_id, |state| state.speed = speed);
            }
            SubscriptionEvent::Unhandled(method) => {
                debug!("{} unhandled subscription message [{}]", log_ctx(), method);
            }
        }
    }

    /// 在状态锁下确认订阅仍然有效后再修改状态
    fn with_current(&self, sub_id: u32, f: impl FnOnce(&mut SessionState)) {
        let mut state = self.state.lock();
        if self.is_current(sub_id) {
            f(&mut state);
        }
    }

    fn handle_mux_packet(&self, sub_id: u32, pkt: MuxPacket<'_>) {
        let Some(mut packet) = self.allocator.allocate(pkt.payload.len()) else {
            warn!("{} ⚠️ 分配数据包失败 ({} bytes)", log_ctx(), pkt.payload.len());
            return;
        };
        packet.data.clear();
        packet.data.extend_from_slice(pkt.payload);
        packet.duration = pkt.duration.map(tvh_to_dvd_time).unwrap_or(0.0);
        packet.dts = timestamp_or_nopts(pkt.dts);
        packet.pts = timestamp_or_nopts(pkt.pts);

        let state = self.state.lock();
        let slot = if self.is_current(sub_id) {
            state.streams.stream_id(pkt.stream)
        } else {
            None
        };

        // 不在活动集合中的流（例如未知编解码器）直接丢弃，这是正常情况
        let Some(slot) = slot else {
            self.unresolved_count.fetch_add(1, Ordering::Relaxed);
            self.allocator.release(packet);
            return;
        };

        packet.stream_id = PacketStreamId::Slot(slot);
        match self.queue.push(packet) {
            Ok(()) => {
                let count = self.queued_count.fetch_add(1, Ordering::Relaxed) + 1;
                if count <= LOG_FIRST_N || count % 1000 == 0 {
                    debug!("{} 📦 入队数据包 #{} (stream {} → slot {})", log_ctx(), count, pkt.stream, slot);
                }
            }
            Err(packet) => {
                let drops = self.queue.overflow_drops();
                if drops <= LOG_FIRST_N || drops % 100 == 0 {
                    warn!("{} ⚠️ 数据包队列已满，丢弃数据包 (累计 {})", log_ctx(), drops);
                }
                self.allocator.release(packet);
            }
        }
    }

    fn handle_subscription_start(&self, sub_id: u32, start: SubscriptionStart<'_>) {
        let streams: Vec<StreamDescriptor> = start
            .streams
            .iter()
            .filter_map(|def| descriptor_from_definition(def, &*self.codecs))
            .collect();

        let mut state = self.state.lock();
        if !self.is_current(sub_id) {
            return;
        }

        state.streams.update_streams(streams);
        self.push_stream_change();

        if let Some(source) = start.source_info {
            apply_source_info(&mut state.signal, &source);
            state.source = source;
        }

        state.started = true;
        self.start_cond.notify_all();
        info!(
            "{} 🎬 订阅 {} 已开始，活动流 {} 个",
            log_ctx(),
            sub_id,
            state.streams.len()
        );
    }

    /// 入队 stream-change 标记；队列满时先清掉旧包，保证标记不丢
    fn push_stream_change(&self) {
        let Some(mut marker) = self.allocator.allocate(0) else {
            warn!("{} ⚠️ 分配 stream-change 标记失败", log_ctx());
            return;
        };
        marker.stream_id = PacketStreamId::StreamChange;

        if let Err(marker) = self.queue.try_push(marker) {
            let dropped = self.queue.drain(&*self.allocator);
            warn!("{} ⚠️ 队列已满，清掉 {} 个旧数据包以写入流变更标记", log_ctx(), dropped);
            if let Err(marker) = self.queue.push(marker) {
                self.allocator.release(marker);
            }
        }
    }

    fn handle_subscription_stop(&self, sub_id: u32, status: Option<String>) {
        let mut state = self.state.lock();
        if !self.is_current(sub_id) {
            return;
        }

        let dropped = self.queue.drain(&*self.allocator);
        state.streams.clear();
        state.reset_metadata();
        state.started = false;
        info!(
            "{} ⏹ 订阅 {} 被后端停止 ({}), 清掉 {} 个数据包",
            log_ctx(),
            sub_id,
            status.as_deref().unwrap_or("no status"),
            dropped
        );
    }

    // ============= 重连 =============

    /// 传输层重连后调用：使用不会死锁的发送方式重新订阅
    pub fn reconnected(&self) {
        if !self.opened.load(Ordering::SeqCst) {
            return;
        }
        debug!("{} re-starting stream", log_ctx());
        if let Err(e) = self.send_subscribe(true) {
            warn!("{} ❌ 重连后重新订阅失败: {}", log_ctx(), e);
        }
    }
}

fn apply_source_info(signal: &mut SignalStatus, source: &SourceInfo) {
    signal.adapter_name = source.adapter.clone();
    signal.service_name = source.service.clone();
    signal.provider_name = source.provider.clone();
    signal.mux_name = source.mux.clone();
}

fn apply_frontend_status(signal: &mut SignalStatus, fe: FrontendStatus) {
    signal.adapter_status = fe.status;
    signal.snr = fe.snr.unwrap_or(0);
    signal.signal = fe.signal.unwrap_or(0);
    signal.ber = fe.ber.unwrap_or(0);
    signal.unc = fe.unc.unwrap_or(0);
}

impl ConnectionListener for HtspDemuxer {
    fn process_message(&self, method: &str, msg: &HtsMsg) -> bool {
        HtspDemuxer::process_message(self, method, msg)
    }

    fn reconnected(&self) {
        HtspDemuxer::reconnected(self)
    }
}

impl DemuxerSource for HtspDemuxer {
    fn open(&self, channel_id: u32) -> Result<()> {
        HtspDemuxer::open(self, channel_id)
    }

    fn close(&self) {
        HtspDemuxer::close(self)
    }

    fn read_packet(&self) -> Option<DemuxPacket> {
        self.read()
    }

    fn release_packet(&self, packet: DemuxPacket) {
        self.release(packet)
    }

    fn flush(&self) {
        HtspDemuxer::flush(self)
    }

    fn abort(&self) {
        HtspDemuxer::abort(self)
    }

    fn current_id(&self) -> i32 {
        HtspDemuxer::current_id(self)
    }

    fn current_streams(&self) -> Result<Vec<StreamDescriptor>> {
        HtspDemuxer::current_streams(self)
    }

    fn current_signal(&self) -> SignalStatus {
        HtspDemuxer::current_signal(self)
    }

    fn description(&self) -> String {
        format!(
            "HTSP Demuxer: channel {:08x}, subscription {:?}",
            self.channel_id(),
            self.subscription_id()
        )
    }
}

impl Drop for HtspDemuxer {
    fn drop(&mut self) {
        if self.opened.load(Ordering::SeqCst) {
            warn!("{} ⚠ HtspDemuxer 被 drop，但未调用 close()，正在取消订阅", log_ctx());
            self.close();
        }
        // 确保缓冲的包都归还给分配器
        self.queue.drain(&*self.allocator);
    }
}
