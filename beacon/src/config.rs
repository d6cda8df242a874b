use crate::*;
use anyhow::Context;
use ed25519_dalek as ed25519;
use std::path::Path;

/// Parameters of one DKG epoch, identical at every committee member
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    pub tau: u64,                // epoch
    pub security_threshold: u32, // T
    pub total_shares: u32,       // N
    /// Retransmission interval in milliseconds
    pub retry_after: u64,
    /// How long, in milliseconds, an accused dealer has to answer a complaint
    pub defend_window: u64,
}

impl Params {
    pub fn validate(&self) -> Result<()> {
        if self.security_threshold == 0 || self.security_threshold > self.total_shares {
            return Err(Error::InvalidParams(format!(
                "threshold {} outside 1..={}",
                self.security_threshold, self.total_shares
            )));
        }
        if self.retry_after == 0 {
            return Err(Error::InvalidParams(
                "retransmission interval must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Validate, and check that `total_shares` matches the committee
    pub fn validate_for(&self, committee: &Committee) -> Result<()> {
        self.validate()?;
        if committee.size() != self.total_shares as usize {
            return Err(Error::InvalidParams(format!(
                "{} shares configured for a committee of {}",
                self.total_shares,
                committee.size()
            )));
        }
        Ok(())
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_after)
    }

    pub fn defend_timeout(&self) -> Duration {
        Duration::from_millis(self.defend_window)
    }
}

/// `ceil(percent / 100 * n)`, kept within `1..=n`
pub fn threshold_from_percent(percent: u32, n: u32) -> u32 {
    let threshold = (percent as u64 * n as u64 + 99) / 100;
    (threshold as u32).clamp(1, n.max(1))
}

/// A committee member as written in the config file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberConfig {
    pub address: String,
    /// hex encoded ed25519 public key
    pub signing_key: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeConfig {
    pub members: Vec<MemberConfig>,
    /// Address of the local node
    pub me: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub params: Params,
    pub committee: CommitteeConfig,
}

impl Config {
    /// Build the epoch's committee directory
    pub fn committee(&self) -> anyhow::Result<Committee> {
        let members = self
            .committee
            .members
            .iter()
            .map(|member| {
                let bytes = hex::decode(&member.signing_key).with_context(|| {
                    format!("signing key of {} is not hex", member.address)
                })?;
                let signing_key = ed25519::PublicKey::from_bytes(&bytes).with_context(|| {
                    format!("signing key of {} is not an ed25519 key", member.address)
                })?;
                Ok(Member {
                    address: member.address.clone(),
                    signing_key,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let committee = Committee::new(members, &self.committee.me)?;
        self.params.validate_for(&committee)?;
        Ok(committee)
    }
}

pub fn read_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("unable to open config {}", path.display()))?;
    let config: Config = serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("malformed config {}", path.display()))?;
    config.params.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Params {
        Params {
            tau: 1,
            security_threshold: 3,
            total_shares: 4,
            retry_after: 100,
            defend_window: 500,
        }
    }

    fn member(address: &str, seed: u8) -> MemberConfig {
        let secret = ed25519::SecretKey::from_bytes(&[seed; 32]).unwrap();
        MemberConfig {
            address: address.into(),
            signing_key: hex::encode(ed25519::PublicKey::from(&secret).as_bytes()),
        }
    }

    fn config() -> Config {
        Config {
            params: params(),
            committee: CommitteeConfig {
                members: (0..4u8)
                    .map(|i| member(&format!("miner-{}:7071", i), i + 1))
                    .collect(),
                me: "miner-2:7071".into(),
            },
        }
    }

    #[test]
    fn test_threshold_from_percent() {
        assert_eq!(threshold_from_percent(67, 4), 3);
        assert_eq!(threshold_from_percent(50, 4), 2);
        assert_eq!(threshold_from_percent(51, 4), 3);
        assert_eq!(threshold_from_percent(100, 7), 7);
        assert_eq!(threshold_from_percent(0, 7), 1);
        assert_eq!(threshold_from_percent(150, 7), 7);
    }

    #[test]
    fn test_params_validation() {
        assert!(params().validate().is_ok());
        let zero = Params {
            security_threshold: 0,
            ..params()
        };
        assert!(matches!(zero.validate(), Err(Error::InvalidParams(_))));
        let too_high = Params {
            security_threshold: 5,
            ..params()
        };
        assert!(too_high.validate().is_err());
        let no_retry = Params {
            retry_after: 0,
            ..params()
        };
        assert!(no_retry.validate().is_err());
    }

    #[test]
    fn test_committee_from_config() {
        let committee = config().committee().unwrap();
        assert_eq!(committee.size(), 4);
        assert_eq!(committee.my_id(), 2);

        let mut mismatched = config();
        mismatched.params.total_shares = 5;
        mismatched.params.security_threshold = 3;
        assert!(mismatched.committee().is_err());

        let mut bad_key = config();
        bad_key.committee.members[0].signing_key = "not hex".into();
        assert!(bad_key.committee().is_err());
    }

    #[test]
    fn test_read_config_from_file() {
        let path = std::env::temp_dir().join(format!("beacon-config-{}.json", std::process::id()));
        std::fs::write(&path, serde_json::to_string_pretty(&config()).unwrap()).unwrap();
        let read = read_config(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(read, config());

        assert!(read_config(std::env::temp_dir().join("beacon-config-missing.json")).is_err());
    }
}
