//! Blocks: witness-signed containers of transactions.

use amalgam_crypto::{blake2b_256_multi, digest_of, sign_message, verify_signature};
use amalgam_types::{AccountName, BlockId, Digest, KeyPair, PublicKey, Signature, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::transaction::{Extension, SignedTransaction};

/// The part of a block the witness signature covers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub previous: BlockId,
    pub timestamp: Timestamp,
    pub witness: AccountName,
    pub transaction_merkle_root: Digest,
    pub extensions: Vec<Extension>,
}

impl BlockHeader {
    /// Height of this block: one past the height embedded in `previous`.
    pub fn block_num(&self) -> u32 {
        self.previous.block_num() + 1
    }

    pub fn digest(&self) -> Result<Digest, ProtocolError> {
        Ok(digest_of(self)?)
    }
}

/// A complete block.
///
/// The producing witness is identified by name in the header; the
/// signature is checked against the signing key that witness has
/// registered in state, so the key itself does not travel with the block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedBlock {
    pub header: BlockHeader,
    pub witness_signature: Signature,
    pub transactions: Vec<SignedTransaction>,
}

impl SignedBlock {
    pub fn block_num(&self) -> u32 {
        self.header.block_num()
    }

    /// The block id: header digest with the height spliced into the
    /// leading bytes.
    pub fn id(&self) -> Result<BlockId, ProtocolError> {
        Ok(BlockId::from_digest(self.header.digest()?, self.block_num()))
    }

    pub fn sign(&mut self, keypair: &KeyPair) -> Result<(), ProtocolError> {
        let digest = self.header.digest()?;
        self.witness_signature = sign_message(digest.as_bytes(), &keypair.private);
        Ok(())
    }

    /// Check the witness signature against the signing key the witness
    /// has on record.
    pub fn verify_signer(&self, expected: &PublicKey) -> Result<bool, ProtocolError> {
        let digest = self.header.digest()?;
        Ok(verify_signature(
            digest.as_bytes(),
            &self.witness_signature,
            expected,
        ))
    }

    /// Merkle root over the transaction ids (signature-independent), in
    /// block order. Odd leftovers carry up a level unhashed; an empty
    /// block has a zero root.
    pub fn calculate_merkle_root(&self) -> Result<Digest, ProtocolError> {
        if self.transactions.is_empty() {
            return Ok(Digest::ZERO);
        }

        let mut layer: Vec<Digest> = Vec::with_capacity(self.transactions.len());
        for tx in &self.transactions {
            let id = tx.id()?;
            layer.push(Digest::new(*id.as_bytes()));
        }

        while layer.len() > 1 {
            let mut next = Vec::with_capacity(layer.len() / 2 + 1);
            let mut pairs = layer.chunks_exact(2);
            for pair in &mut pairs {
                next.push(Digest::new(blake2b_256_multi(&[
                    pair[0].as_bytes(),
                    pair[1].as_bytes(),
                ])));
            }
            if let [odd] = pairs.remainder() {
                next.push(*odd);
            }
            layer = next;
        }
        Ok(layer[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::operations::{Operation, TransferOp};
    use crate::transaction::Transaction;
    use amalgam_crypto::keypair_from_seed;
    use amalgam_types::{Asset, Symbol};

    fn name(s: &str) -> AccountName {
        AccountName::new(s).unwrap()
    }

    fn make_transfer_tx(tag: u8) -> SignedTransaction {
        let block_id = BlockId::from_digest(Digest::new([tag; 32]), 41);
        let mut tx = Transaction::referencing(&block_id, Timestamp::new(9_000));
        tx.operations.push(Operation::Transfer(TransferOp {
            from: name("alice"),
            to: name("bobby"),
            amount: Asset::new(i64::from(tag), Symbol::Aml),
            memo: String::new(),
        }));
        let mut signed = SignedTransaction::new(tx);
        signed
            .sign(&keypair_from_seed(&[tag; 32]), &config::chain_id())
            .unwrap();
        signed
    }

    fn make_block(txs: Vec<SignedTransaction>) -> SignedBlock {
        let mut block = SignedBlock {
            header: BlockHeader {
                previous: BlockId::from_digest(Digest::new([0x11; 32]), 41),
                timestamp: Timestamp::new(42 * 3),
                witness: name("wit"),
                transaction_merkle_root: Digest::ZERO,
                extensions: Vec::new(),
            },
            witness_signature: Signature([0; 64]),
            transactions: txs,
        };
        block.header.transaction_merkle_root = block.calculate_merkle_root().unwrap();
        block
    }

    #[test]
    fn test_block_num_follows_previous() {
        let block = make_block(vec![]);
        assert_eq!(block.block_num(), 42);
        assert_eq!(block.id().unwrap().block_num(), 42);
    }

    #[test]
    fn test_empty_merkle_root_is_zero() {
        assert!(make_block(vec![]).calculate_merkle_root().unwrap().is_zero());
    }

    #[test]
    fn test_merkle_root_changes_with_contents() {
        let one = make_block(vec![make_transfer_tx(1)]);
        let two = make_block(vec![make_transfer_tx(1), make_transfer_tx(2)]);
        let three = make_block(vec![
            make_transfer_tx(1),
            make_transfer_tx(2),
            make_transfer_tx(3),
        ]);
        assert_ne!(one.calculate_merkle_root().unwrap(), two.calculate_merkle_root().unwrap());
        assert_ne!(two.calculate_merkle_root().unwrap(), three.calculate_merkle_root().unwrap());
    }

    #[test]
    fn test_merkle_root_single_tx_is_its_id() {
        let tx = make_transfer_tx(7);
        let id = tx.id().unwrap();
        let block = make_block(vec![tx]);
        assert_eq!(
            *block.calculate_merkle_root().unwrap().as_bytes(),
            *id.as_bytes()
        );
    }

    #[test]
    fn test_witness_signature_round_trip() {
        let pair = keypair_from_seed(&[0x77; 32]);
        let other = keypair_from_seed(&[0x78; 32]);
        let mut block = make_block(vec![make_transfer_tx(1)]);
        block.sign(&pair).unwrap();

        assert!(block.verify_signer(&pair.public).unwrap());
        assert!(!block.verify_signer(&other.public).unwrap());

        block.header.timestamp = Timestamp::new(999);
        assert!(!block.verify_signer(&pair.public).unwrap());
    }
}
