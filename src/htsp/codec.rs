use crate::core::{Codec, CodecType};

/// 编解码器查表接口：后端流类型名 → (类型, id)
///
/// 无法识别的名字返回 `Codec::UNKNOWN`，对应的流不会进入活动集合。
pub trait CodecLookup: Send + Sync {
    fn resolve(&self, type_name: &str) -> Codec;
}

/// 默认查表（id 采用 libavcodec 的 AVCodecID 编号）
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCodecTable;

impl DefaultCodecTable {
    const TABLE: &'static [(&'static str, CodecType, u32)] = &[
        // 视频
        ("MPEG2VIDEO", CodecType::Video, 2),
        ("MPEG4VIDEO", CodecType::Video, 12),
        ("H264", CodecType::Video, 27),
        ("VP8", CodecType::Video, 139),
        ("VP9", CodecType::Video, 167),
        ("HEVC", CodecType::Video, 173),
        // 音频
        ("MPEG2AUDIO", CodecType::Audio, 86016),
        ("AAC", CodecType::Audio, 86018),
        ("MP4A", CodecType::Audio, 86018),
        ("AC3", CodecType::Audio, 86019),
        ("VORBIS", CodecType::Audio, 86021),
        ("EAC3", CodecType::Audio, 86056),
        ("OPUS", CodecType::Audio, 86076),
        // 字幕
        ("DVBSUB", CodecType::Subtitle, 94209),
        ("TEXTSUB", CodecType::Subtitle, 94210),
        ("TELETEXT", CodecType::Subtitle, 94215),
    ];
}

impl CodecLookup for DefaultCodecTable {
    fn resolve(&self, type_name: &str) -> Codec {
        Self::TABLE
            .iter()
            .find(|(name, _, _)| name.eq_ignore_ascii_case(type_name))
            .map(|&(_, codec_type, codec_id)| Codec {
                codec_type,
                codec_id,
            })
            .unwrap_or(Codec::UNKNOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known() {
        let table = DefaultCodecTable;
        assert_eq!(table.resolve("H264").codec_type, CodecType::Video);
        assert_eq!(table.resolve("AAC").codec_type, CodecType::Audio);
        assert_eq!(table.resolve("dvbsub").codec_type, CodecType::Subtitle);
    }

    #[test]
    fn test_resolve_unknown() {
        let table = DefaultCodecTable;
        // CA / PMT 等是传输流内部结构，不是可播放的流
        assert_eq!(table.resolve("CA"), Codec::UNKNOWN);
        assert_eq!(table.resolve("PMT"), Codec::UNKNOWN);
        assert_eq!(table.resolve(""), Codec::UNKNOWN);
    }
}
