use crate::*;

/// A party's signing capability for one epoch: its private key share, the
/// public commitment to the group polynomial and the set of parties whose
/// shares count. Produced by a completed DKG, or by [`setup`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Party<E: PairingEngine> {
    pub epoch: u64,
    pub threshold: u32,
    private_key_share: PrivateKeyShare<E>,
    public_key_shares: PublicKeyShares<E>,
    participants: BTreeSet<PartyId>,
}

impl<E: PairingEngine> Party<E> {
    /// Check that the key share opens the group commitment before accepting it
    pub fn new(
        epoch: u64,
        threshold: u32,
        private_key_share: PrivateKeyShare<E>,
        public_key_shares: PublicKeyShares<E>,
        participants: BTreeSet<PartyId>,
    ) -> Result<Self> {
        if threshold == 0
            || participants.len() < threshold as usize
            || public_key_shares.threshold() != threshold as usize
        {
            return Err(ThresholdSignatureError::InvalidThreshold {
                threshold,
                participants: participants.len(),
            });
        }
        let index = private_key_share.index;
        if public_key_shares.public_key_share(index) != private_key_share.public_key() {
            return Err(ThresholdSignatureError::InconsistentKeyShare { party: index });
        }
        Ok(Self {
            epoch,
            threshold,
            private_key_share,
            public_key_shares,
            participants,
        })
    }

    pub fn index(&self) -> PartyId {
        self.private_key_share.index
    }

    pub fn private_key_share(&self) -> &PrivateKeyShare<E> {
        &self.private_key_share
    }

    pub fn public_key_shares(&self) -> &PublicKeyShares<E> {
        &self.public_key_shares
    }

    pub fn participants(&self) -> &BTreeSet<PartyId> {
        &self.participants
    }

    pub fn is_participant(&self, party: PartyId) -> bool {
        self.participants.contains(&party)
    }

    pub fn group_public_key(&self) -> E::G1Affine {
        self.public_key_shares.group_public_key()
    }

    pub fn public_key_share(&self, party: PartyId) -> Result<E::G1Affine> {
        if !self.is_participant(party) {
            return Err(ThresholdSignatureError::UnknownParty { party });
        }
        Ok(self.public_key_shares.public_key_share(party))
    }

    pub fn sign(&self, message: &[u8]) -> SignatureShare<E> {
        self.private_key_share.sign(message)
    }

    /// False for shares of non-participants as well as for bad shares
    pub fn verify_share(&self, message: &[u8], party: PartyId, share: &SignatureShare<E>) -> bool {
        match self.public_key_share(party) {
            Ok(public_key) => verify_signature::<E>(&public_key, message, &share.0),
            Err(_) => false,
        }
    }

    /// Verify every share, then interpolate the group signature from the
    /// `threshold` lowest-indexed ones
    pub fn recover_group(
        &self,
        message: &[u8],
        shares: &BTreeMap<PartyId, SignatureShare<E>>,
    ) -> Result<GroupSignature<E>> {
        let required = self.threshold as usize;
        if shares.len() < required {
            return Err(ThresholdSignatureError::InsufficientShares {
                required,
                received: shares.len(),
            });
        }
        for (party, share) in shares.iter() {
            if !self.is_participant(*party) {
                return Err(ThresholdSignatureError::UnknownParty { party: *party });
            }
            if !self.verify_share(message, *party, share) {
                return Err(ThresholdSignatureError::ShareVerificationFailed { party: *party });
            }
        }
        let selected = shares
            .iter()
            .take(required)
            .map(|(party, share)| (*party, *share))
            .collect::<BTreeMap<_, _>>();
        combine_signature_shares(&selected)
    }

    pub fn verify_group(&self, message: &[u8], signature: &GroupSignature<E>) -> bool {
        verify_signature::<E>(&self.group_public_key(), message, &signature.0)
    }
}
