#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use warden_core::pipeline::FrameDecoder;
use warden_feed::decoder::{ZlibJsonDecoder, compress};
use warden_feed::filter::EventFilter;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    schema_ref: String,
    timestamp: String,
    star_system: String,
    /// None이면 StationFaction 블록을 생략
    faction_state: Option<String>,
    target_state: String,
}

fuzz_target!(|input: FuzzInput| {
    let mut message = serde_json::json!({
        "timestamp": input.timestamp,
        "StarSystem": input.star_system,
    });
    if let Some(state) = &input.faction_state {
        message["StationFaction"] = serde_json::json!({ "FactionState": state });
    }
    let doc = serde_json::json!({ "$schemaRef": input.schema_ref, "message": message });
    let Ok(frame) = compress(doc.to_string().as_bytes()) else {
        return;
    };

    let decoder = ZlibJsonDecoder::default();
    let Ok(envelope) = decoder.decode(&frame) else {
        return;
    };

    let filter = EventFilter::new(input.schema_ref.clone(), input.target_state.clone());
    let accepted = filter.accept(&envelope);

    // 정확한 문자열 일치만 통과해야 함
    let expected = input
        .faction_state
        .as_deref()
        .is_some_and(|s| !s.is_empty() && s == input.target_state);
    assert_eq!(accepted, expected);
    assert_eq!(envelope.star_system_name, input.star_system);
});
