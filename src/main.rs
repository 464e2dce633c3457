use anyhow::Result;
use htsp_demux::core::DemuxerConfig;
use htsp_demux::htsp::{ConnectionListener, DefaultCodecTable, HtsMsg, ScriptedTransport};
use htsp_demux::player::{HeapAllocator, HtspDemuxer, ReaderEvent, ReaderThread};
use log::{info, warn};
use serde::Deserialize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// 回放脚本
#[derive(Debug, Deserialize)]
struct ReplayScript {
    channel_id: u32,
    /// subscribe 的应答，缺省为成功
    #[serde(default)]
    subscribe_reply: Option<HtsMsg>,
    messages: Vec<ScriptedMessage>,
}

/// 脚本中的一条入站消息；method 为 "reconnect" 时模拟一次传输层重连
#[derive(Debug, Deserialize)]
struct ScriptedMessage {
    method: String,
    #[serde(default)]
    delay_ms: u64,
    #[serde(default)]
    message: HtsMsg,
}

fn main() -> Result<()> {
    // 初始化日志
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let script_path = args
        .get(1)
        .ok_or_else(|| anyhow::anyhow!("用法: htsp-replay <script.json> [config.json]"))?;

    let config = match args.get(2) {
        Some(path) => DemuxerConfig::from_json_file(path)
            .map_err(|e| anyhow::anyhow!("加载配置失败: {}", e))?,
        None => DemuxerConfig::default(),
    };
    let idle_timeout = config.read_timeout() * 2;

    let script: ReplayScript = serde_json::from_str(&std::fs::read_to_string(script_path)?)
        .map_err(|e| anyhow::anyhow!("解析回放脚本失败: {}", e))?;
    info!("🎬 回放脚本: {} ({} 条消息)", script_path, script.messages.len());

    let transport = Arc::new(ScriptedTransport::new());
    if let Some(reply) = script.subscribe_reply {
        transport.push_reply(reply);
    }
    let allocator = Arc::new(HeapAllocator::new());
    let demuxer = Arc::new(HtspDemuxer::new(
        transport.clone(),
        Arc::new(DefaultCodecTable),
        allocator.clone(),
        config,
    ));

    demuxer
        .open(script.channel_id)
        .map_err(|e| anyhow::anyhow!("打开频道 {} 失败: {}", script.channel_id, e))?;

    // 投递线程：模拟传输层按顺序投递异步消息
    let listener: Arc<dyn ConnectionListener> = demuxer.clone();
    let delivery_demuxer = Arc::clone(&demuxer);
    let messages = script.messages;
    let delivery = thread::spawn(move || {
        for entry in messages {
            if entry.delay_ms > 0 {
                thread::sleep(Duration::from_millis(entry.delay_ms));
            }
            if entry.method == "reconnect" {
                listener.reconnected();
                continue;
            }

            let mut msg = entry.message;
            if !msg.contains("subscriptionId") {
                let sub_id = delivery_demuxer.subscription_id().unwrap_or(0);
                msg = msg.add_u32("subscriptionId", sub_id);
            }
            if !listener.process_message(&entry.method, &msg) {
                warn!("⚠️ 不是订阅消息: {}", entry.method);
            }
        }
    });

    // 播放器侧：读线程 + 消费循环
    let mut reader = ReaderThread::start(demuxer.clone());
    let events = reader
        .take_events()
        .ok_or_else(|| anyhow::anyhow!("读线程事件通道不可用"))?;

    let mut packets: usize = 0;
    let mut bytes: usize = 0;
    loop {
        match events.recv_timeout(idle_timeout) {
            Ok(ReaderEvent::StreamsChanged(streams)) => {
                for (slot, stream) in streams.iter().enumerate() {
                    info!(
                        "  slot {}: id {} {} {:?} lang={} {}x{} aspect={:.3} {}ch {}Hz",
                        slot,
                        stream.physical_id,
                        stream.codec_name,
                        stream.codec_type,
                        stream.language,
                        stream.width,
                        stream.height,
                        stream.aspect,
                        stream.channels,
                        stream.sample_rate
                    );
                }
            }
            Ok(ReaderEvent::Packet(packet)) => {
                packets += 1;
                bytes += packet.size();
                info!(
                    "📦 {:?} size={} pts={} dts={} duration={}",
                    packet.stream_id, packet.size(), packet.pts, packet.dts, packet.duration
                );
                reader.release(packet);
            }
            Err(_) if delivery.is_finished() => break,
            Err(_) => continue,
        }
    }

    if delivery.join().is_err() {
        warn!("⚠️ 投递线程异常退出");
    }
    drop(events);
    reader.stop();

    info!("📡 信号状态: {:?}", demuxer.current_signal());
    demuxer.close();

    info!(
        "✅ 回放结束: {} 个包 / {} 字节, 统计 {:?}, 请求 {:?}, 未归还的包 {}",
        packets,
        bytes,
        demuxer.stats(),
        transport.sent_methods(),
        allocator.outstanding()
    );
    Ok(())
}
