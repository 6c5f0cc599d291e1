#![no_main]

use arith_quiz_client::protocol::ServerMessage;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Classification is total; untagged text must survive unchanged.
    let msg = ServerMessage::parse(text);
    if let ServerMessage::Feedback(raw) = &msg {
        assert_eq!(raw, text);
    }

    // Re-rendering a tagged frame classifies the same way.
    if msg.tag().is_some() {
        assert_eq!(ServerMessage::parse(&msg.to_string()), msg);
    }
});
