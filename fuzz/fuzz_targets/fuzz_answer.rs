#![no_main]

use arith_quiz_client::protocol::ClientMessage;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|text: &str| {
    if let Some(msg) = ClientMessage::answer(text) {
        let wire = msg.to_wire();
        assert_eq!(wire, text.trim());
        assert!(wire.parse::<f64>().is_ok_and(f64::is_finite));
    }
});
