#![no_main]

use std::collections::BTreeSet;

use libfuzzer_sys::fuzz_target;

use amalgam_protocol::{
    verify_authority, Authority, AuthorityLevel, AuthorityProvider, ProtocolError,
    RequiredAuthorities,
};
use amalgam_types::{AccountName, PublicKey};

/// Hands out one byte-seeded authority per account so recursive member
/// resolution has something to chase.
struct FuzzProvider {
    depth_key: u8,
}

impl AuthorityProvider for FuzzProvider {
    fn authority(
        &self,
        account: &AccountName,
        _level: AuthorityLevel,
    ) -> Result<Authority, ProtocolError> {
        let seed = account.as_str().bytes().last().unwrap_or(0);
        let mut auth = Authority::new(u32::from(seed % 4));
        auth.add_key(PublicKey([self.depth_key; 32]), 1);
        if seed % 3 == 0 {
            // A member account that may or may not resolve, exercising
            // the unknown-account and depth-limit paths.
            if let Ok(member) = AccountName::new(format!("mem{}", seed % 10)) {
                auth.add_account(member, 1);
            }
        }
        Ok(auth)
    }
}

// Authority resolution runs over attacker-chosen authority graphs. It
// must terminate and return an error at worst, whatever the shape.
fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let mut required = RequiredAuthorities::default();
    let mut signers: BTreeSet<PublicKey> = BTreeSet::new();

    for (i, chunk) in data.chunks(3).take(16).enumerate() {
        let tag = chunk[0] % 5;
        let byte = chunk.get(1).copied().unwrap_or(0);
        let weight = u16::from(chunk.get(2).copied().unwrap_or(1)) % 8;
        let name = match AccountName::new(format!("acc{}", byte % 32)) {
            Ok(name) => name,
            Err(_) => continue,
        };
        match tag {
            0 => {
                required.active.insert(name);
            }
            1 => {
                required.owner.insert(name);
            }
            2 => {
                required.posting.insert(name);
            }
            3 => {
                let mut other = Authority::new(u32::from(weight).max(1));
                other.add_key(PublicKey([byte; 32]), weight.max(1));
                required.other.push(other);
            }
            _ => {
                signers.insert(PublicKey([byte; 32]));
            }
        }
        if i > 32 {
            break;
        }
    }

    let provider = FuzzProvider { depth_key: data[0] };
    let _ = verify_authority(&required, &signers, &provider);
});
