use crate::PartyId;
use anyhow::{anyhow, Result};
use ed25519_dalek as ed25519;
use serde::{Deserialize, Serialize};

/// A committee member as announced for an epoch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Network address the transport delivers to
    pub address: String,
    /// Key used to authenticate this member's protocol messages
    pub signing_key: ed25519::PublicKey,
}

/// The fixed membership of one DKG epoch, seen from one member.
///
/// Members are sorted by address so that every node derives the same
/// `PartyId` for the same member. The directory is immutable once built;
/// share it with `Arc` rather than mutating it.
#[derive(Clone, Debug)]
pub struct Committee {
    members: Vec<Member>,
    me: PartyId,
}

impl Committee {
    /// Build the directory from the announced members.
    /// `my_address` identifies the local node among them.
    pub fn new(mut members: Vec<Member>, my_address: &str) -> Result<Self> {
        if members.is_empty() {
            return Err(anyhow!("a committee needs at least one member"));
        }
        members.sort_by(|a, b| a.address.cmp(&b.address));
        if let Some(pair) = members
            .windows(2)
            .find(|pair| pair[0].address == pair[1].address)
        {
            return Err(anyhow!(
                "member {} appears twice in the committee",
                pair[0].address
            ));
        }
        let me = members
            .binary_search_by(|probe| probe.address.as_str().cmp(my_address))
            .map_err(|_| {
                anyhow!("{} is not a member of the committee", my_address)
            })?;
        Ok(Self {
            members,
            me: me as PartyId,
        })
    }

    /// The same committee as seen by member `me`
    pub fn view_of(&self, me: PartyId) -> Result<Self> {
        self.resolve(me)?;
        Ok(Self {
            members: self.members.clone(),
            me,
        })
    }

    pub fn my_id(&self) -> PartyId {
        self.me
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, id: PartyId) -> bool {
        (id as usize) < self.members.len()
    }

    pub fn resolve(&self, id: PartyId) -> Result<&Member> {
        self.members
            .get(id as usize)
            .ok_or_else(|| anyhow!("party {} is not in the committee", id))
    }

    pub fn address(&self, id: PartyId) -> Result<&str> {
        self.resolve(id).map(|member| member.address.as_str())
    }

    pub fn id_of(&self, address: &str) -> Option<PartyId> {
        self.members
            .binary_search_by(|probe| probe.address.as_str().cmp(address))
            .ok()
            .map(|id| id as PartyId)
    }

    /// All party ids, including our own
    pub fn ids(&self) -> impl Iterator<Item = PartyId> {
        0..self.members.len() as PartyId
    }

    /// Every party except ourselves
    pub fn peers(&self) -> impl Iterator<Item = PartyId> + '_ {
        self.ids().filter(move |id| *id != self.me)
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(address: &str, seed: u8) -> Member {
        let secret = ed25519::SecretKey::from_bytes(&[seed; 32]).unwrap();
        Member {
            address: address.into(),
            signing_key: ed25519::PublicKey::from(&secret),
        }
    }

    fn members() -> Vec<Member> {
        vec![
            member("miner-c:7071", 3),
            member("miner-a:7071", 1),
            member("miner-b:7071", 2),
        ]
    }

    #[test]
    fn test_ids_follow_address_order() {
        let committee = Committee::new(members(), "miner-b:7071").unwrap();
        assert_eq!(committee.size(), 3);
        assert_eq!(committee.my_id(), 1);
        assert_eq!(committee.address(0).unwrap(), "miner-a:7071");
        assert_eq!(committee.address(2).unwrap(), "miner-c:7071");
        assert_eq!(committee.id_of("miner-c:7071"), Some(2));
        assert_eq!(committee.id_of("miner-z:7071"), None);
    }

    #[test]
    fn test_every_view_agrees_on_ids() {
        let a = Committee::new(members(), "miner-a:7071").unwrap();
        let c = Committee::new(members(), "miner-c:7071").unwrap();
        assert_eq!(a.members(), c.members());
        assert_eq!(a.view_of(2).unwrap().my_id(), c.my_id());
    }

    #[test]
    fn test_peers_exclude_self() {
        let committee = Committee::new(members(), "miner-a:7071").unwrap();
        assert_eq!(committee.peers().collect::<Vec<_>>(), vec![1, 2]);
        assert!(committee.contains(2));
        assert!(!committee.contains(3));
        assert!(committee.resolve(3).is_err());
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let mut members = members();
        members.push(member("miner-a:7071", 9));
        assert!(Committee::new(members, "miner-a:7071").is_err());
    }

    #[test]
    fn test_unknown_local_member_rejected() {
        assert!(Committee::new(members(), "miner-x:7071").is_err());
        assert!(Committee::new(vec![], "miner-a:7071").is_err());
    }
}
