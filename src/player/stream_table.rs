use crate::core::{CodecType, Language, StreamDescriptor, DVD_TIME_BASE};
use crate::htsp::codec::CodecLookup;
use crate::htsp::events::StreamDefinition;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};

/// 播放器一次最多接收的流数量
pub const MAX_STREAMS: usize = 20;

/// 当前活动流集合 + 后端索引到播放器槽位的映射
///
/// 每次 subscriptionStart 整体替换，不做合并；槽位按替换顺序稠密分配。
#[derive(Debug, Default)]
pub struct StreamTable {
    streams: Vec<StreamDescriptor>,
    slots: HashMap<u32, u32>,
}

impl StreamTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 整体替换活动流集合
    pub fn update_streams(&mut self, mut streams: Vec<StreamDescriptor>) {
        // 同一后端索引重复出现时只保留第一个，保证每个槽位都有索引映射
        let mut seen = HashSet::new();
        streams.retain(|stream| {
            let first = seen.insert(stream.physical_id);
            if !first {
                warn!("⚠️ 重复的流索引 {}，已忽略", stream.physical_id);
            }
            first
        });

        if streams.len() > MAX_STREAMS {
            warn!(
                "⚠️ 流数量 {} 超过上限 {}，多余的流将被忽略",
                streams.len(),
                MAX_STREAMS
            );
            streams.truncate(MAX_STREAMS);
        }

        self.slots = streams
            .iter()
            .enumerate()
            .map(|(slot, stream)| (stream.physical_id, slot as u32))
            .collect();
        self.streams = streams;
    }

    /// 后端流索引 → 播放器槽位，不在活动集合中返回 None
    pub fn stream_id(&self, physical_id: u32) -> Option<u32> {
        self.slots.get(&physical_id).copied()
    }

    pub fn clear(&mut self) {
        self.streams.clear();
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// 当前流属性（按槽位顺序）
    pub fn properties(&self) -> Vec<StreamDescriptor> {
        self.streams.clone()
    }
}

/// 由后端流定义构建描述，编解码器无法识别时返回 None
pub fn descriptor_from_definition(
    def: &StreamDefinition<'_>,
    lookup: &dyn CodecLookup,
) -> Option<StreamDescriptor> {
    let codec = lookup.resolve(def.type_name);
    if !codec.is_known() {
        debug!("忽略未知类型的流: id {}, type {}", def.index, def.type_name);
        return None;
    }

    let mut stream = StreamDescriptor::new(def.index, def.type_name, codec);

    if codec.codec_type == CodecType::Subtitle && def.type_name.eq_ignore_ascii_case("DVBSUB") {
        stream.identifier = (def.composition_id & 0xffff) | ((def.ancillary_id & 0xffff) << 16);
    }

    if matches!(codec.codec_type, CodecType::Audio | CodecType::Subtitle) {
        if let Some(language) = def.language {
            stream.language = Language::new(language);
        }
    }

    match codec.codec_type {
        CodecType::Audio => {
            stream.channels = def.channels;
            stream.sample_rate = def.rate;
        }
        CodecType::Video => {
            stream.width = def.width;
            stream.height = def.height;
            stream.aspect = if def.aspect_den != 0 {
                def.aspect_num as f32 / def.aspect_den as f32
            } else {
                0.0
            };
            if def.duration > 0 {
                stream.fps_rate = DVD_TIME_BASE as u32;
                stream.fps_scale = def.duration;
            }
        }
        _ => {}
    }

    debug!(
        "id: {}, type {}, codec: {}",
        def.index, def.type_name, codec.codec_id
    );
    Some(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::htsp::codec::DefaultCodecTable;

    fn def(index: u32, type_name: &str) -> StreamDefinition<'_> {
        StreamDefinition {
            index,
            type_name,
            ..Default::default()
        }
    }

    fn build(defs: &[StreamDefinition<'_>]) -> Vec<StreamDescriptor> {
        defs.iter()
            .filter_map(|d| descriptor_from_definition(d, &DefaultCodecTable))
            .collect()
    }

    #[test]
    fn test_slots_are_dense_in_replacement_order() {
        let mut table = StreamTable::new();
        table.update_streams(build(&[def(5, "H264"), def(9, "AAC"), def(2, "AC3")]));

        assert_eq!(table.stream_id(5), Some(0));
        assert_eq!(table.stream_id(9), Some(1));
        assert_eq!(table.stream_id(2), Some(2));
        assert_eq!(table.stream_id(3), None);
    }

    #[test]
    fn test_update_replaces_not_merges() {
        let mut table = StreamTable::new();
        table.update_streams(build(&[def(1, "H264"), def(2, "AAC")]));
        table.update_streams(build(&[def(3, "AAC")]));

        assert_eq!(table.len(), 1);
        assert_eq!(table.stream_id(1), None);
        assert_eq!(table.stream_id(2), None);
        assert_eq!(table.stream_id(3), Some(0));
    }

    #[test]
    fn test_duplicate_index_keeps_first_and_stays_dense() {
        let mut table = StreamTable::new();
        table.update_streams(build(&[def(4, "H264"), def(4, "AAC"), def(7, "AC3")]));

        let props = table.properties();
        assert_eq!(props.len(), 2);
        assert_eq!(props[0].codec_name, "H264");
        assert_eq!(props[1].physical_id, 7);
        assert_eq!(table.stream_id(4), Some(0));
        assert_eq!(table.stream_id(7), Some(1));
    }

    #[test]
    fn test_unknown_codec_excluded() {
        let streams = build(&[def(0, "CA"), def(1, "H264")]);
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].physical_id, 1);
    }

    #[test]
    fn test_video_fields() {
        let video = StreamDefinition {
            width: 1920,
            height: 1080,
            aspect_num: 16,
            aspect_den: 9,
            duration: 40_000,
            ..def(0, "H264")
        };
        let stream = descriptor_from_definition(&video, &DefaultCodecTable).unwrap();
        assert_eq!(stream.width, 1920);
        assert_eq!(stream.height, 1080);
        assert!((stream.aspect - 16.0 / 9.0).abs() < 1e-6);
        assert_eq!(stream.fps_rate, 1_000_000);
        assert_eq!(stream.fps_scale, 40_000);

        let no_den = StreamDefinition {
            aspect_num: 4,
            ..def(0, "H264")
        };
        let stream = descriptor_from_definition(&no_den, &DefaultCodecTable).unwrap();
        assert_eq!(stream.aspect, 0.0);
        assert_eq!(stream.fps_rate, 0);
    }

    #[test]
    fn test_audio_and_subtitle_fields() {
        let audio = StreamDefinition {
            channels: 2,
            rate: 48000,
            language: Some("deu"),
            width: 720,
            ..def(1, "AAC")
        };
        let stream = descriptor_from_definition(&audio, &DefaultCodecTable).unwrap();
        assert_eq!(stream.channels, 2);
        assert_eq!(stream.sample_rate, 48000);
        assert_eq!(stream.language.as_str(), "deu");
        assert_eq!(stream.width, 0);

        let sub = StreamDefinition {
            composition_id: 0x1_0002,
            ancillary_id: 3,
            language: Some("english"),
            ..def(2, "DVBSUB")
        };
        let stream = descriptor_from_definition(&sub, &DefaultCodecTable).unwrap();
        assert_eq!(stream.identifier, 0x0003_0002);
        assert_eq!(stream.language.as_str(), "eng");

        let video = StreamDefinition {
            language: Some("fra"),
            ..def(0, "H264")
        };
        let stream = descriptor_from_definition(&video, &DefaultCodecTable).unwrap();
        assert!(stream.language.is_empty());
    }

    #[test]
    fn test_stream_limit() {
        let defs: Vec<_> = (0..25).map(|i| def(i, "AAC")).collect();
        let mut table = StreamTable::new();
        table.update_streams(build(&defs));
        assert_eq!(table.len(), MAX_STREAMS);
        assert_eq!(table.stream_id(24), None);
    }
}
