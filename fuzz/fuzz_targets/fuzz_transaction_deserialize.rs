#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Wire payloads arrive as untrusted bytes. Decoding any protocol
    // type must fail cleanly, never panic.

    let _ = bincode::deserialize::<amalgam_protocol::SignedTransaction>(data);

    let _ = bincode::deserialize::<amalgam_protocol::SignedBlock>(data);

    let _ = bincode::deserialize::<amalgam_protocol::Operation>(data);

    let _ = bincode::deserialize::<amalgam_protocol::Authority>(data);

    let _ = bincode::deserialize::<amalgam_types::Asset>(data);

    let _ = bincode::deserialize::<amalgam_types::Price>(data);

    // A decoded operation must also survive structural validation.
    if let Ok(op) = bincode::deserialize::<amalgam_protocol::Operation>(data) {
        let _ = op.validate();
    }
});
