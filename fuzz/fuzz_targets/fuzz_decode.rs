#![no_main]

use libfuzzer_sys::fuzz_target;
use spatial_voice_bridge::UpdateMessage;

fuzz_target!(|data: &[u8]| {
    // Whole-frame decode must reject garbage without panicking
    if let Ok(msg) = UpdateMessage::decode(data) {
        let again = msg.encode().expect("decoded frame re-encodes");
        assert_eq!(again.len(), data.len());
    }
});
