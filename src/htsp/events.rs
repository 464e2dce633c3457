//! 订阅相关的入站消息
//!
//! 每个方法名对应一个变体和一个解码函数，未知方法落到 `Unhandled`。
//! 这里只做字段解码，不涉及任何解封装器状态。

use crate::core::{DemuxError, QueueStatus, Result, SourceInfo, SubscriptionSkip, TimeshiftStatus};
use crate::htsp::message::HtsMsg;
use log::debug;

/// muxpkt：一个访问单元
#[derive(Debug, Clone, PartialEq)]
pub struct MuxPacket<'a> {
    pub stream: u32,
    pub payload: &'a [u8],
    pub duration: Option<i64>,
    pub dts: Option<i64>,
    pub pts: Option<i64>,
}

/// subscriptionStart 中的一条流定义
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamDefinition<'a> {
    pub index: u32,
    pub type_name: &'a str,
    pub language: Option<&'a str>,
    pub channels: u32,
    pub rate: u32,
    pub width: u32,
    pub height: u32,
    pub aspect_num: u32,
    pub aspect_den: u32,
    pub duration: u32,
    pub composition_id: u32,
    pub ancillary_id: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionStart<'a> {
    pub streams: Vec<StreamDefinition<'a>>,
    pub source_info: Option<SourceInfo>,
}

/// signalStatus 中的前端状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontendStatus {
    pub status: String,
    pub snr: Option<u32>,
    pub signal: Option<u32>,
    pub ber: Option<u32>,
    pub unc: Option<u32>,
}

/// 已解码的订阅事件
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent<'a> {
    MuxPacket(MuxPacket<'a>),
    QueueStatus(QueueStatus),
    SignalStatus(FrontendStatus),
    TimeshiftStatus(TimeshiftStatus),
    SubscriptionStart(SubscriptionStart<'a>),
    SubscriptionStop { status: Option<String> },
    SubscriptionSkip(SubscriptionSkip),
    SubscriptionSpeed { speed: i32 },
    Unhandled(String),
}

impl<'a> SubscriptionEvent<'a> {
    /// 按方法名解码
    pub fn decode(method: &str, msg: &'a HtsMsg) -> Result<Self> {
        let event = match method {
            "muxpkt" => SubscriptionEvent::MuxPacket(decode_mux_packet(msg)?),
            "queueStatus" => SubscriptionEvent::QueueStatus(decode_queue_status(msg)),
            "signalStatus" => SubscriptionEvent::SignalStatus(decode_signal_status(msg)),
            "timeshiftStatus" => SubscriptionEvent::TimeshiftStatus(decode_timeshift_status(msg)),
            "subscriptionStart" => {
                SubscriptionEvent::SubscriptionStart(decode_subscription_start(msg)?)
            }
            "subscriptionStop" => SubscriptionEvent::SubscriptionStop {
                status: msg.get_str("status").map(str::to_string),
            },
            "subscriptionSkip" => SubscriptionEvent::SubscriptionSkip(decode_skip(msg)),
            "subscriptionSpeed" => SubscriptionEvent::SubscriptionSpeed {
                speed: msg
                    .get_s32("speed")
                    .ok_or_else(|| DemuxError::Malformed("subscriptionSpeed".to_string()))?,
            },
            other => SubscriptionEvent::Unhandled(other.to_string()),
        };
        Ok(event)
    }
}

/// 消息中的订阅 id，缺失说明不是订阅消息
pub fn subscription_id(msg: &HtsMsg) -> Option<u32> {
    msg.get_u32("subscriptionId")
}

fn decode_mux_packet(msg: &HtsMsg) -> Result<MuxPacket<'_>> {
    let (Some(stream), Some(payload)) = (msg.get_u32("stream"), msg.get_bin("payload")) else {
        return Err(DemuxError::Malformed("muxpkt".to_string()));
    };

    Ok(MuxPacket {
        stream,
        payload,
        duration: msg.get_s64("duration"),
        dts: msg.get_s64("dts"),
        pts: msg.get_s64("pts"),
    })
}

fn decode_subscription_start(msg: &HtsMsg) -> Result<SubscriptionStart<'_>> {
    let list = msg
        .get_list("streams")
        .ok_or_else(|| DemuxError::Malformed("subscriptionStart".to_string()))?;

    let mut streams = Vec::with_capacity(list.len());
    for field in list {
        let Some(entry) = field.as_map() else {
            continue;
        };
        let (Some(type_name), Some(index)) = (entry.get_str("type"), entry.get_u32("index"))
        else {
            debug!("跳过缺少 type/index 的流定义");
            continue;
        };

        streams.push(StreamDefinition {
            index,
            type_name,
            language: entry.get_str("language"),
            channels: entry.get_u32_or_default("channels", 0),
            rate: entry.get_u32_or_default("rate", 0),
            width: entry.get_u32_or_default("width", 0),
            height: entry.get_u32_or_default("height", 0),
            aspect_num: entry.get_u32_or_default("aspect_num", 0),
            aspect_den: entry.get_u32_or_default("aspect_den", 0),
            duration: entry.get_u32_or_default("duration", 0),
            composition_id: entry.get_u32_or_default("composition_id", 0),
            ancillary_id: entry.get_u32_or_default("ancillary_id", 0),
        });
    }

    Ok(SubscriptionStart {
        streams,
        source_info: msg.get_map("sourceinfo").map(decode_source_info),
    })
}

fn decode_source_info(info: &HtsMsg) -> SourceInfo {
    let text = |name: &str| info.get_str(name).unwrap_or_default().to_string();
    SourceInfo {
        adapter: text("adapter"),
        mux: text("mux"),
        network: text("network"),
        provider: text("provider"),
        service: text("service"),
    }
}

fn decode_queue_status(msg: &HtsMsg) -> QueueStatus {
    QueueStatus {
        packets: msg.get_u32_or_default("packets", 0),
        bytes: msg.get_u32_or_default("bytes", 0),
        delay: msg.get_u32_or_default("delay", 0),
        b_drops: msg.get_u32_or_default("Bdrops", 0),
        p_drops: msg.get_u32_or_default("Pdrops", 0),
        i_drops: msg.get_u32_or_default("Idrops", 0),
    }
}

fn decode_signal_status(msg: &HtsMsg) -> FrontendStatus {
    FrontendStatus {
        status: msg.get_str("feStatus").unwrap_or_default().to_string(),
        snr: msg.get_u32("feSNR"),
        signal: msg.get_u32("feSignal"),
        ber: msg.get_u32("feBER"),
        unc: msg.get_u32("feUNC"),
    }
}

fn decode_timeshift_status(msg: &HtsMsg) -> TimeshiftStatus {
    TimeshiftStatus {
        full: msg.get_u32_or_default("full", 0) != 0,
        shift: msg.get_s64("shift").unwrap_or(0),
        start: msg.get_s64("start"),
        end: msg.get_s64("end"),
    }
}

fn decode_skip(msg: &HtsMsg) -> SubscriptionSkip {
    SubscriptionSkip {
        error: msg.get_u32_or_default("error", 0) != 0,
        absolute: msg.get_u32_or_default("absolute", 0) != 0,
        time: msg.get_s64("time"),
        size: msg.get_s64("size"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::htsp::message::HtsField;

    #[test]
    fn test_decode_muxpkt() {
        let msg = HtsMsg::new()
            .add_u32("stream", 1)
            .add_bin("payload", &[9; 4])
            .add_s64("pts", 40_000);

        match SubscriptionEvent::decode("muxpkt", &msg).unwrap() {
            SubscriptionEvent::MuxPacket(pkt) => {
                assert_eq!(pkt.stream, 1);
                assert_eq!(pkt.payload.len(), 4);
                assert_eq!(pkt.pts, Some(40_000));
                assert_eq!(pkt.dts, None);
                assert_eq!(pkt.duration, None);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_muxpkt_requires_stream_and_payload() {
        let no_payload = HtsMsg::new().add_u32("stream", 1);
        let no_stream = HtsMsg::new().add_bin("payload", &[1]);

        assert!(matches!(
            SubscriptionEvent::decode("muxpkt", &no_payload),
            Err(DemuxError::Malformed(_))
        ));
        assert!(matches!(
            SubscriptionEvent::decode("muxpkt", &no_stream),
            Err(DemuxError::Malformed(_))
        ));
    }

    #[test]
    fn test_start_skips_bad_entries() {
        let good = HtsMsg::new().add_u32("index", 1).add_str("type", "AAC");
        let no_type = HtsMsg::new().add_u32("index", 2);
        let no_index = HtsMsg::new().add_str("type", "H264");
        let msg = HtsMsg::new().add_list(
            "streams",
            vec![
                HtsField::Map(good),
                HtsField::Map(no_type),
                HtsField::Map(no_index),
                HtsField::S64(5),
            ],
        );

        match SubscriptionEvent::decode("subscriptionStart", &msg).unwrap() {
            SubscriptionEvent::SubscriptionStart(start) => {
                assert_eq!(start.streams.len(), 1);
                assert_eq!(start.streams[0].index, 1);
                assert_eq!(start.streams[0].type_name, "AAC");
                assert!(start.source_info.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_start_without_list_is_malformed() {
        let msg = HtsMsg::new().add_u32("subscriptionId", 1);
        assert!(matches!(
            SubscriptionEvent::decode("subscriptionStart", &msg),
            Err(DemuxError::Malformed(_))
        ));
    }

    #[test]
    fn test_status_messages() {
        let queue = HtsMsg::new().add_u32("packets", 12).add_u32("Bdrops", 3);
        let signal = HtsMsg::new().add_str("feStatus", "GOOD").add_u32("feSNR", 40000);
        let shift = HtsMsg::new().add_u32("full", 1).add_s64("shift", -5_000_000);

        assert_eq!(
            SubscriptionEvent::decode("queueStatus", &queue).unwrap(),
            SubscriptionEvent::QueueStatus(QueueStatus {
                packets: 12,
                b_drops: 3,
                ..Default::default()
            })
        );
        match SubscriptionEvent::decode("signalStatus", &signal).unwrap() {
            SubscriptionEvent::SignalStatus(fe) => {
                assert_eq!(fe.status, "GOOD");
                assert_eq!(fe.snr, Some(40000));
                assert_eq!(fe.ber, None);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match SubscriptionEvent::decode("timeshiftStatus", &shift).unwrap() {
            SubscriptionEvent::TimeshiftStatus(ts) => {
                assert!(ts.full);
                assert_eq!(ts.shift, -5_000_000);
                assert_eq!(ts.start, None);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_method() {
        let msg = HtsMsg::new();
        assert_eq!(
            SubscriptionEvent::decode("subscriptionGrace", &msg).unwrap(),
            SubscriptionEvent::Unhandled("subscriptionGrace".to_string())
        );
    }
}
