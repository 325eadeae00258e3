#![no_main]

use libfuzzer_sys::fuzz_target;

use amalgam_chain::{Database, DatabaseOptions, GenesisParams};
use amalgam_protocol::{SignedBlock, SignedTransaction};
use amalgam_types::PublicKey;

// A decoded-but-hostile block or transaction hitting the admission
// pipeline must come back as an error, never a panic, and must leave
// the head state untouched.
fuzz_target!(|data: &[u8]| {
    let genesis = GenesisParams {
        initiator_key: PublicKey([7u8; 32]),
    };
    let db = match Database::with_genesis(DatabaseOptions::default(), &genesis) {
        Ok(db) => db,
        Err(_) => return,
    };
    let head = db.head_block_num();

    if let Ok(block) = bincode::deserialize::<SignedBlock>(data) {
        if db.apply_block(&block).is_err() {
            assert_eq!(db.head_block_num(), head);
        }
    }

    // The dry run unwinds whatever it did, success or failure.
    if let Ok(tx) = bincode::deserialize::<SignedTransaction>(data) {
        let _ = db.validate_transaction(&tx);
        assert_eq!(db.head_block_num(), head);
    }
});
