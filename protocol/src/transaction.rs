//! Signed transactions and their TaPoS anchoring.
//!
//! Every transaction cites a recent block (`ref_block_num` plus a prefix
//! of that block's id) and an expiration no more than an hour out. The
//! pair makes replay on a different fork or a different chain fail the
//! admission checks without any global replay database.

use amalgam_crypto::{digest_of, sign_message, verify_signature};
use amalgam_types::{BlockId, Digest, KeyPair, PublicKey, Signature, Timestamp, TransactionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::ProtocolError;
use crate::operations::{Operation, RequiredAuthorities};

/// Reserved for future protocol extensions; no variants exist today, so
/// deserializing a non-empty extension list fails.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Extension {}

/// An unsigned bundle of operations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Low 16 bits of the referenced block's height.
    pub ref_block_num: u16,
    /// Anchor prefix from the referenced block's id.
    pub ref_block_prefix: u32,
    pub expiration: Timestamp,
    pub operations: Vec<Operation>,
    pub extensions: Vec<Extension>,
}

impl Transaction {
    /// An empty transaction anchored to the given recent block.
    pub fn referencing(block_id: &BlockId, expiration: Timestamp) -> Self {
        let mut tx = Self {
            ref_block_num: 0,
            ref_block_prefix: 0,
            expiration,
            operations: Vec::new(),
            extensions: Vec::new(),
        };
        tx.set_reference_block(block_id);
        tx
    }

    pub fn set_reference_block(&mut self, block_id: &BlockId) {
        self.ref_block_num = (block_id.block_num() & 0xffff) as u16;
        self.ref_block_prefix = block_id.ref_prefix();
    }

    /// Stateless validation: at least one operation, each one structurally
    /// valid and non-virtual.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.operations.is_empty() {
            return Err(ProtocolError::EmptyTransaction);
        }
        for op in &self.operations {
            op.validate()?;
        }
        Ok(())
    }

    /// Digest of the canonical transaction bytes, without any chain id.
    pub fn digest(&self) -> Result<Digest, ProtocolError> {
        Ok(digest_of(self)?)
    }

    /// The digest signatures commit to: chain id prepended to the
    /// canonical transaction bytes.
    pub fn sig_digest(&self, chain_id: &Digest) -> Result<Digest, ProtocolError> {
        Ok(digest_of(&(chain_id, self))?)
    }

    pub fn id(&self) -> Result<TransactionId, ProtocolError> {
        let digest = self.digest()?;
        Ok(TransactionId::new(*digest.as_bytes()))
    }

    /// Union of authority requirements over all operations.
    pub fn required_authorities(&self) -> RequiredAuthorities {
        let mut req = RequiredAuthorities::default();
        for op in &self.operations {
            op.required_authorities(&mut req);
        }
        req
    }
}

/// One signature over the transaction's signing digest, together with the
/// key that made it. Carrying the key keeps verification a pure check
/// instead of a key-recovery step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub signer: PublicKey,
    pub signature: Signature,
}

/// A transaction plus its signatures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub tx: Transaction,
    pub signatures: Vec<TransactionSignature>,
}

impl SignedTransaction {
    pub fn new(tx: Transaction) -> Self {
        Self {
            tx,
            signatures: Vec::new(),
        }
    }

    /// Append a signature by `keypair` over this transaction's signing
    /// digest for `chain_id`.
    pub fn sign(&mut self, keypair: &KeyPair, chain_id: &Digest) -> Result<(), ProtocolError> {
        let digest = self.tx.sig_digest(chain_id)?;
        let signature = sign_message(digest.as_bytes(), &keypair.private);
        self.signatures.push(TransactionSignature {
            signer: keypair.public,
            signature,
        });
        Ok(())
    }

    /// The set of keys that validly signed this transaction.
    ///
    /// Each attached signature must verify against the signing digest and
    /// no key may sign twice; anything else rejects the transaction
    /// outright rather than being skipped.
    pub fn signature_keys(&self, chain_id: &Digest) -> Result<BTreeSet<PublicKey>, ProtocolError> {
        let digest = self.tx.sig_digest(chain_id)?;
        let mut keys = BTreeSet::new();
        for sig in &self.signatures {
            if !verify_signature(digest.as_bytes(), &sig.signature, &sig.signer) {
                return Err(ProtocolError::InvalidSignature(sig.signer));
            }
            if !keys.insert(sig.signer) {
                return Err(ProtocolError::DuplicateSignature(sig.signer));
            }
        }
        Ok(keys)
    }

    pub fn id(&self) -> Result<TransactionId, ProtocolError> {
        self.tx.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::operations::TransferOp;
    use amalgam_crypto::keypair_from_seed;
    use amalgam_types::{AccountName, Asset, Symbol};

    fn name(s: &str) -> AccountName {
        AccountName::new(s).unwrap()
    }

    fn alice_key() -> KeyPair {
        keypair_from_seed(&[0xA1; 32])
    }

    fn make_tx() -> Transaction {
        let block_id = BlockId::from_digest(Digest::new([0x5A; 32]), 1234);
        let mut tx = Transaction::referencing(&block_id, Timestamp::new(600));
        tx.operations.push(Operation::Transfer(TransferOp {
            from: name("alice"),
            to: name("bobby"),
            amount: Asset::new(1_000, Symbol::Aml),
            memo: String::new(),
        }));
        tx
    }

    #[test]
    fn test_reference_block_anchoring() {
        let block_id = BlockId::from_digest(Digest::new([0x5A; 32]), 0x00_01_00_07);
        let tx = Transaction::referencing(&block_id, Timestamp::new(600));
        assert_eq!(tx.ref_block_num, 0x0007);
        assert_eq!(tx.ref_block_prefix, block_id.ref_prefix());
    }

    #[test]
    fn test_empty_transaction_is_invalid() {
        let tx = Transaction {
            ref_block_num: 0,
            ref_block_prefix: 0,
            expiration: Timestamp::new(60),
            operations: Vec::new(),
            extensions: Vec::new(),
        };
        assert!(matches!(
            tx.validate(),
            Err(ProtocolError::EmptyTransaction)
        ));
    }

    #[test]
    fn test_sig_digest_depends_on_chain_id() {
        let tx = make_tx();
        let a = tx.sig_digest(&config::chain_id()).unwrap();
        let b = tx.sig_digest(&Digest::new([1; 32])).unwrap();
        assert_ne!(a, b);
        assert_ne!(*a.as_bytes(), *tx.digest().unwrap().as_bytes());
    }

    #[test]
    fn test_sign_and_recover_keys() {
        let pair = alice_key();
        let mut signed = SignedTransaction::new(make_tx());
        signed.sign(&pair, &config::chain_id()).unwrap();

        let keys = signed.signature_keys(&config::chain_id()).unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys.contains(&pair.public));
    }

    #[test]
    fn test_duplicate_signature_rejected() {
        let pair = alice_key();
        let mut signed = SignedTransaction::new(make_tx());
        signed.sign(&pair, &config::chain_id()).unwrap();
        signed.sign(&pair, &config::chain_id()).unwrap();

        assert!(matches!(
            signed.signature_keys(&config::chain_id()),
            Err(ProtocolError::DuplicateSignature(_))
        ));
    }

    #[test]
    fn test_tampered_payload_fails_verification() {
        let pair = alice_key();
        let mut signed = SignedTransaction::new(make_tx());
        signed.sign(&pair, &config::chain_id()).unwrap();

        signed.tx.expiration = Timestamp::new(601);
        assert!(matches!(
            signed.signature_keys(&config::chain_id()),
            Err(ProtocolError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_wrong_chain_id_fails_verification() {
        let pair = alice_key();
        let mut signed = SignedTransaction::new(make_tx());
        signed.sign(&pair, &config::chain_id()).unwrap();

        assert!(signed.signature_keys(&Digest::new([9; 32])).is_err());
    }

    #[test]
    fn test_transaction_id_ignores_signatures() {
        let pair = alice_key();
        let tx = make_tx();
        let unsigned_id = tx.id().unwrap();

        let mut signed = SignedTransaction::new(tx);
        signed.sign(&pair, &config::chain_id()).unwrap();
        assert_eq!(signed.id().unwrap(), unsigned_id);
    }

    #[test]
    fn test_bincode_round_trip() {
        let pair = alice_key();
        let mut signed = SignedTransaction::new(make_tx());
        signed.sign(&pair, &config::chain_id()).unwrap();

        let bytes = bincode::serialize(&signed).unwrap();
        let back: SignedTransaction = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, signed);
    }
}
