#![no_main]
use libfuzzer_sys::fuzz_target;

use dns_wire::message::types::Message;

fuzz_target!(|message: Message| {
    if let Ok(serialised) = message.to_octets() {
        let deserialised = Message::from_octets(&serialised).unwrap();
        assert_eq!(message, deserialised);
    }
});
