use crate::{Committee, PartyId};
use anyhow::{anyhow, Result};
use ed25519_dalek as ed25519;
use ed25519_dalek::Signer;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A protocol message tagged with its epoch and signed by the sender's
/// ed25519 key, as handed to a concrete transport
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SignedMessage {
    msg_bytes: Vec<u8>,
    signature: ed25519::Signature,
    pub signer: ed25519::PublicKey,
}

impl SignedMessage {
    pub fn sign<M>(tau: u64, msg: &M, key: &ed25519::Keypair) -> Result<SignedMessage>
    where
        M: Serialize,
    {
        let msg_bytes = bincode::serialize(&(tau, msg))?;
        let signature = key.sign(&msg_bytes);
        Ok(SignedMessage {
            msg_bytes,
            signature,
            signer: key.public,
        })
    }

    /// Check the signature and decode `(tau, msg)`
    pub fn verify<M>(&self) -> Result<(u64, M)>
    where
        M: DeserializeOwned,
    {
        self.signer
            .verify_strict(&self.msg_bytes, &self.signature)?;
        Ok(bincode::deserialize(&self.msg_bytes)?)
    }
}

impl Committee {
    /// Verify a message and resolve its signer to a committee member.
    /// Returns the sender, the epoch tag and the decoded message.
    pub fn authenticate<M>(&self, signed: &SignedMessage) -> Result<(PartyId, u64, M)>
    where
        M: DeserializeOwned,
    {
        let sender = self
            .members()
            .iter()
            .position(|member| member.signing_key == signed.signer)
            .ok_or_else(|| anyhow!("message signed by a key outside the committee"))?;
        let (tau, msg) = signed.verify()?;
        Ok((sender as PartyId, tau, msg))
    }
}
