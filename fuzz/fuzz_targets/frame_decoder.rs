#![no_main]

use libfuzzer_sys::fuzz_target;
use warden_core::pipeline::FrameDecoder;
use warden_feed::decoder::ZlibJsonDecoder;

// 임의 바이트는 압축 해제 단계에서, 압축된 임의 바이트는 JSON 단계에서 검증
fuzz_target!(|data: &[u8]| {
    let decoder = ZlibJsonDecoder::new(64 * 1024);
    let _ = decoder.decode(data);
    if let Ok(frame) = warden_feed::decoder::compress(data) {
        let _ = decoder.decode(&frame);
    }
});
