//! 프레임 디코더 -- zlib 압축 해제 후 JSON envelope를 추출합니다.
//!
//! # 와이어 형식
//! ```text
//! zlib( {"$schemaRef": "...",
//!        "message": {"timestamp": "...", "StarSystem": "...",
//!                    "StationFaction": {"FactionState": "..."}}} )
//! ```
//!
//! `$schemaRef`와 `schemaRef` 키를 모두 받습니다.
//! 필수 필드가 없거나 빈 문자열이면 [`DecodeError::MissingField`]입니다.

use chrono::{DateTime, NaiveDateTime, Utc};
use flate2::{Decompress, FlushDecompress, Status};
use serde::Deserialize;
use warden_core::error::DecodeError;
use warden_core::pipeline::FrameDecoder;
use warden_core::types::StreamEnvelope;

/// 압축 해제 후 기본 최대 크기 (1MB)
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// 출력 버퍼 증가 단위
const INFLATE_CHUNK: usize = 16 * 1024;

#[derive(Deserialize)]
struct WireDocument {
    #[serde(rename = "$schemaRef", alias = "schemaRef")]
    schema_ref: Option<String>,
    message: Option<WireMessage>,
}

#[derive(Deserialize)]
struct WireMessage {
    timestamp: Option<String>,
    #[serde(rename = "StarSystem")]
    star_system: Option<String>,
    #[serde(rename = "StationFaction")]
    station_faction: Option<WireStationFaction>,
}

#[derive(Deserialize)]
struct WireStationFaction {
    #[serde(rename = "FactionState")]
    faction_state: Option<String>,
}

/// zlib + JSON 프레임 디코더
pub struct ZlibJsonDecoder {
    max_frame_bytes: usize,
}

impl ZlibJsonDecoder {
    /// 최대 압축 해제 크기를 지정하여 디코더를 생성합니다.
    pub fn new(max_frame_bytes: usize) -> Self {
        Self { max_frame_bytes }
    }

    /// 최대 압축 해제 크기를 반환합니다.
    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    /// zlib 스트림을 최대 크기까지 압축 해제합니다.
    ///
    /// 출력 버퍼는 `max_frame_bytes + 1`까지만 늘립니다. 입력을 다 썼는데
    /// 진행도 없고 스트림 끝(`StreamEnd`)도 아니면 잘린 프레임으로 보고
    /// [`DecodeError::Decompress`]를, 한도를 넘으면 [`DecodeError::TooLarge`]를 반환합니다.
    fn inflate(&self, raw: &[u8]) -> Result<Vec<u8>, DecodeError> {
        let limit = self.max_frame_bytes.saturating_add(1);
        let mut inflater = Decompress::new(true);
        let mut out = Vec::with_capacity(raw.len().saturating_mul(4).clamp(64.min(limit), limit));

        loop {
            if out.len() == out.capacity() {
                out.reserve_exact(INFLATE_CHUNK.min(limit - out.len()));
            }
            let in_before = inflater.total_in();
            let out_before = inflater.total_out();
            let consumed = usize::try_from(in_before).unwrap_or(raw.len()).min(raw.len());

            let status = inflater
                .decompress_vec(&raw[consumed..], &mut out, FlushDecompress::None)
                .map_err(|e| DecodeError::Decompress(e.to_string()))?;

            if out.len() > self.max_frame_bytes {
                return Err(DecodeError::TooLarge {
                    size: out.len(),
                    max: self.max_frame_bytes,
                });
            }

            match status {
                Status::StreamEnd => return Ok(out),
                Status::Ok | Status::BufError => {
                    let progressed =
                        inflater.total_in() != in_before || inflater.total_out() != out_before;
                    if !progressed {
                        return Err(DecodeError::Decompress(
                            "truncated zlib stream".to_owned(),
                        ));
                    }
                }
            }
        }
    }

    /// 압축 해제된 JSON 문서를 envelope로 변환합니다.
    pub fn parse_document(&self, json: &[u8]) -> Result<StreamEnvelope, DecodeError> {
        let doc: WireDocument =
            serde_json::from_slice(json).map_err(|e| DecodeError::InvalidDocument {
                line: e.line(),
                column: e.column(),
                reason: e.to_string(),
            })?;

        let schema_ref = non_empty(doc.schema_ref).ok_or(DecodeError::MissingField("schemaRef"))?;
        let message = doc.message.ok_or(DecodeError::MissingField("message"))?;
        let raw_ts =
            non_empty(message.timestamp).ok_or(DecodeError::MissingField("message.timestamp"))?;
        let star_system_name =
            non_empty(message.star_system).ok_or(DecodeError::MissingField("message.StarSystem"))?;
        let faction_state = message
            .station_faction
            .and_then(|faction| non_empty(faction.faction_state));

        Ok(StreamEnvelope {
            schema_ref,
            timestamp: parse_timestamp(&raw_ts)?,
            star_system_name,
            faction_state,
        })
    }
}

impl Default for ZlibJsonDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl FrameDecoder for ZlibJsonDecoder {
    fn name(&self) -> &str {
        "zlib-json"
    }

    fn decode(&self, raw: &[u8]) -> Result<StreamEnvelope, DecodeError> {
        let json = self.inflate(raw)?;
        self.parse_document(&json)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// RFC 3339 타임스탬프를 UTC로 파싱합니다.
///
/// 오프셋이 없는 `YYYY-MM-DDTHH:MM:SS[.f]` 형식은 UTC로 간주합니다.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DecodeError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| DecodeError::InvalidTimestamp {
            value: raw.to_owned(),
            reason: e.to_string(),
        })
}

/// 테스트와 벤치마크에서 쓰는 zlib 압축 헬퍼
#[doc(hidden)]
pub fn compress(json: &[u8]) -> std::io::Result<Vec<u8>> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(json)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SOL_BOOM: &str = r#"{"$schemaRef":"https://eddn.edcd.io/schemas/journal/1","header":{"uploaderID":"x"},"message":{"timestamp":"2020-01-01T00:00:00Z","event":"FSDJump","StarSystem":"Sol","StationFaction":{"Name":"Mother Gaia","FactionState":"Boom"}}}"#;

    fn decode(json: &str) -> Result<StreamEnvelope, DecodeError> {
        ZlibJsonDecoder::default().decode(&compress(json.as_bytes()).unwrap())
    }

    #[test]
    fn decodes_full_envelope() {
        let env = decode(SOL_BOOM).unwrap();
        assert_eq!(env.schema_ref, "https://eddn.edcd.io/schemas/journal/1");
        assert_eq!(env.star_system_name, "Sol");
        assert_eq!(env.faction_state.as_deref(), Some("Boom"));
        assert_eq!(env.timestamp, Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn accepts_plain_schema_ref_key() {
        let env = decode(
            r#"{"schemaRef":"journal/1","message":{"timestamp":"2020-01-01T00:00:00Z","StarSystem":"Sol"}}"#,
        )
        .unwrap();
        assert_eq!(env.schema_ref, "journal/1");
    }

    #[test]
    fn missing_station_faction_yields_none() {
        let env = decode(
            r#"{"$schemaRef":"journal/1","message":{"timestamp":"2020-01-01T00:00:00Z","StarSystem":"Sol"}}"#,
        )
        .unwrap();
        assert!(env.faction_state.is_none());
    }

    #[test]
    fn station_faction_without_state_yields_none() {
        let env = decode(
            r#"{"$schemaRef":"journal/1","message":{"timestamp":"2020-01-01T00:00:00Z","StarSystem":"Sol","StationFaction":{"Name":"X"}}}"#,
        )
        .unwrap();
        assert!(env.faction_state.is_none());
    }

    #[test]
    fn missing_schema_ref_is_error() {
        let err = decode(r#"{"message":{"timestamp":"2020-01-01T00:00:00Z","StarSystem":"Sol"}}"#)
            .unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("schemaRef")));
    }

    #[test]
    fn missing_message_is_error() {
        let err = decode(r#"{"$schemaRef":"journal/1"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("message")));
    }

    #[test]
    fn missing_star_system_is_error() {
        let err = decode(r#"{"$schemaRef":"journal/1","message":{"timestamp":"2020-01-01T00:00:00Z"}}"#)
            .unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("message.StarSystem")));
    }

    #[test]
    fn empty_star_system_is_missing() {
        let err = decode(
            r#"{"$schemaRef":"journal/1","message":{"timestamp":"2020-01-01T00:00:00Z","StarSystem":""}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("message.StarSystem")));
    }

    #[test]
    fn missing_timestamp_is_error() {
        let err = decode(r#"{"$schemaRef":"journal/1","message":{"StarSystem":"Sol"}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("message.timestamp")));
    }

    #[test]
    fn bad_timestamp_is_error() {
        let err = decode(
            r#"{"$schemaRef":"journal/1","message":{"timestamp":"yesterday","StarSystem":"Sol"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidTimestamp { .. }));
    }

    #[test]
    fn timestamp_without_offset_is_utc() {
        let env = decode(
            r#"{"$schemaRef":"journal/1","message":{"timestamp":"2020-01-01T12:30:00","StarSystem":"Sol"}}"#,
        )
        .unwrap();
        assert_eq!(env.timestamp, Utc.with_ymd_and_hms(2020, 1, 1, 12, 30, 0).unwrap());
    }

    #[test]
    fn timestamp_with_offset_is_normalized() {
        let env = decode(
            r#"{"$schemaRef":"journal/1","message":{"timestamp":"2020-01-01T02:00:00+02:00","StarSystem":"Sol"}}"#,
        )
        .unwrap();
        assert_eq!(env.timestamp, Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn uncompressed_input_is_decompress_error() {
        let err = ZlibJsonDecoder::default()
            .decode(SOL_BOOM.as_bytes())
            .unwrap_err();
        assert!(matches!(err, DecodeError::Decompress(_)));
    }

    #[test]
    fn truncated_stream_is_decompress_error() {
        let compressed = compress(SOL_BOOM.as_bytes()).unwrap();
        let truncated = &compressed[..compressed.len() / 2];
        let err = ZlibJsonDecoder::default().decode(truncated).unwrap_err();
        assert!(matches!(err, DecodeError::Decompress(_)));
    }

    #[test]
    fn invalid_json_reports_position() {
        let err = decode("{\"$schemaRef\": \"journal/1\",\n  \"message\": }").unwrap_err();
        match err {
            DecodeError::InvalidDocument { line, .. } => assert_eq!(line, 2),
            other => panic!("expected InvalidDocument, got {other:?}"),
        }
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let big = format!(
            r#"{{"$schemaRef":"journal/1","message":{{"timestamp":"2020-01-01T00:00:00Z","StarSystem":"{}"}}}}"#,
            "A".repeat(4096)
        );
        let err = ZlibJsonDecoder::new(1024)
            .decode(&compress(big.as_bytes()).unwrap())
            .unwrap_err();
        assert!(matches!(err, DecodeError::TooLarge { max: 1024, .. }));
    }

    #[test]
    fn highly_compressible_frame_decodes_under_default_limit() {
        for n in [1_000, 4_096, 100_000] {
            let json = format!(
                r#"{{"$schemaRef":"journal/1","message":{{"timestamp":"2020-01-01T00:00:00Z","StarSystem":"{}"}}}}"#,
                "A".repeat(n)
            );
            let compressed = compress(json.as_bytes()).unwrap();
            assert!(compressed.len() * 10 <= json.len());

            let env = ZlibJsonDecoder::default().decode(&compressed).unwrap();
            assert_eq!(env.star_system_name.len(), n);
        }
    }

    #[test]
    fn frame_larger_than_one_chunk_decodes() {
        let json = format!(
            r#"{{"$schemaRef":"journal/1","message":{{"timestamp":"2020-01-01T00:00:00Z","StarSystem":"Sol","pad":"{}"}}}}"#,
            "x".repeat(INFLATE_CHUNK * 3)
        );
        let env = decode(&json).unwrap();
        assert_eq!(env.star_system_name, "Sol");
    }

    #[test]
    fn truncated_large_stream_is_decompress_error() {
        let json = format!(
            r#"{{"$schemaRef":"journal/1","message":{{"timestamp":"2020-01-01T00:00:00Z","StarSystem":"{}"}}}}"#,
            "B".repeat(50_000)
        );
        let compressed = compress(json.as_bytes()).unwrap();
        let truncated = &compressed[..compressed.len() - 4];
        let err = ZlibJsonDecoder::default().decode(truncated).unwrap_err();
        assert!(matches!(err, DecodeError::Decompress(_)));
    }

    #[test]
    fn frame_exactly_at_limit_is_accepted() {
        let json = r#"{"$schemaRef":"journal/1","message":{"timestamp":"2020-01-01T00:00:00Z","StarSystem":"Sol"}}"#;
        let decoder = ZlibJsonDecoder::new(json.len());
        assert!(decoder.decode(&compress(json.as_bytes()).unwrap()).is_ok());
    }

    #[test]
    fn non_string_star_system_is_invalid_document() {
        let err = decode(
            r#"{"$schemaRef":"journal/1","message":{"timestamp":"2020-01-01T00:00:00Z","StarSystem":42}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidDocument { .. }));
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arbitrary_bytes_never_panic(data in proptest::collection::vec(any::<u8>(), 0..512)) {
                let _ = ZlibJsonDecoder::default().decode(&data);
            }

            #[test]
            fn star_system_names_survive_decoding(name in "\\PC{1,40}") {
                let doc = serde_json::json!({
                    "$schemaRef": "journal/1",
                    "message": {"timestamp": "2020-01-01T00:00:00Z", "StarSystem": name}
                });
                let bytes = compress(doc.to_string().as_bytes()).unwrap();
                let env = ZlibJsonDecoder::default().decode(&bytes).unwrap();
                prop_assert_eq!(env.star_system_name, name);
            }
        }
    }
}
