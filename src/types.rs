use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::DaoError;

/// Token amounts are unbounded; width limits are enforced by the bank.
pub type Amount = BigUint;

/// 20-byte account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }

    /// Address whose low 8 bytes hold `value` big-endian.
    pub const fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; 20];
        let be = value.to_be_bytes();
        let mut i = 0;
        while i < 8 {
            bytes[12 + i] = be[i];
            i += 1;
        }
        Address(bytes)
    }

    /// Deterministic address for the `nonce`-th deployment labelled `label`.
    pub fn derive(label: &str, nonce: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(label.as_bytes());
        hasher.update(nonce.to_be_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[..20]);
        Address(bytes)
    }

    pub fn is_zero(&self) -> bool {
        *self == Address::ZERO
    }

    /// True for the GUILD/ESCROW/TOTAL sentinels.
    pub fn is_reserved(&self) -> bool {
        Reserved::from_address(*self).is_some()
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = DaoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let decoded = hex::decode(raw).map_err(|_| DaoError::InvalidAddress(s.to_string()))?;
        let bytes: [u8; 20] = decoded
            .try_into()
            .map_err(|_| DaoError::InvalidAddress(s.to_string()))?;
        Ok(Address(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

macro_rules! bytes32_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name([u8; 32]);

        impl $name {
            pub const ZERO: $name = $name([0u8; 32]);

            pub const fn new(bytes: [u8; 32]) -> Self {
                $name(bytes)
            }

            pub fn is_zero(&self) -> bool {
                *self == $name::ZERO
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(self, f)
            }
        }
    };
}

bytes32_id!(
    /// Caller-chosen proposal identifier, unique per DAO.
    ProposalId
);

bytes32_id!(
    /// Name-derived identifier for adapters, extensions and configuration keys.
    ScopeId
);

impl ProposalId {
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        ProposalId(bytes)
    }
}

impl From<u64> for ProposalId {
    fn from(value: u64) -> Self {
        ProposalId::from_u64(value)
    }
}

impl ScopeId {
    pub fn from_name(name: &str) -> Self {
        ScopeId(Sha256::digest(name.as_bytes()).into())
    }

    /// Key scoped to a token, e.g. the unit price for minting `token`.
    pub fn for_token(name: &str, token: &Address) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update(token.as_bytes());
        ScopeId(hasher.finalize().into())
    }
}

/// SHA-256 over arbitrary bytes, used for signature hashes.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

pub const GUILD_ADDRESS: Address = Address::from_low_u64(0xdead);
pub const ESCROW_ADDRESS: Address = Address::from_low_u64(0x4bec);
pub const TOTAL_ADDRESS: Address = Address::from_low_u64(0xbabe);

pub const ETH_TOKEN: Address = Address::ZERO;
pub const UNITS: Address = Address::from_low_u64(0xff1ce);
pub const LOOT: Address = Address::from_low_u64(0xb105f00d);

/// Ledger-only pseudo accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reserved {
    Guild,
    Escrow,
    Total,
}

impl Reserved {
    pub const fn address(self) -> Address {
        match self {
            Reserved::Guild => GUILD_ADDRESS,
            Reserved::Escrow => ESCROW_ADDRESS,
            Reserved::Total => TOTAL_ADDRESS,
        }
    }

    pub fn from_address(address: Address) -> Option<Self> {
        [Reserved::Guild, Reserved::Escrow, Reserved::Total]
            .into_iter()
            .find(|r| r.address() == address)
    }
}

/// Key of a bank balance: either a reserved pseudo account or a real address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AccountRef {
    Reserved(Reserved),
    Member(Address),
}

impl AccountRef {
    pub const GUILD: AccountRef = AccountRef::Reserved(Reserved::Guild);
    pub const ESCROW: AccountRef = AccountRef::Reserved(Reserved::Escrow);
    pub const TOTAL: AccountRef = AccountRef::Reserved(Reserved::Total);

    pub fn is_reserved(&self) -> bool {
        matches!(self, AccountRef::Reserved(_))
    }

    pub fn member(&self) -> Option<Address> {
        match self {
            AccountRef::Member(address) => Some(*address),
            AccountRef::Reserved(_) => None,
        }
    }
}

impl From<Address> for AccountRef {
    fn from(address: Address) -> Self {
        AccountRef::Member(address)
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRef::Reserved(Reserved::Guild) => write!(f, "GUILD"),
            AccountRef::Reserved(Reserved::Escrow) => write!(f, "ESCROW"),
            AccountRef::Reserved(Reserved::Total) => write!(f, "TOTAL"),
            AccountRef::Member(address) => write!(f, "{}", address),
        }
    }
}

/// Names of the well-known adapters and extensions and their derived ids.
pub mod ids {
    use once_cell::sync::Lazy;

    use super::ScopeId;

    pub const BANK_NAME: &str = "bank";
    pub const EXECUTOR_NAME: &str = "executor-ext";
    pub const ERC1271_NAME: &str = "erc1271";

    pub const VOTING_NAME: &str = "voting";
    pub const ONBOARDING_NAME: &str = "onboarding";
    pub const FINANCING_NAME: &str = "financing";
    pub const GUILDKICK_NAME: &str = "guildkick";
    pub const MANAGING_NAME: &str = "managing";
    pub const DISTRIBUTE_NAME: &str = "distribute";
    pub const DAO_REGISTRY_NAME: &str = "daoRegistry";
    pub const BANK_ADAPTER_NAME: &str = "bankAdapter";
    pub const CONFIGURATION_NAME: &str = "configuration";
    pub const VETOER_NAME: &str = "vetoer";
    pub const SERVICE_PROVIDER_NAME: &str = "serviceProvider";
    pub const SIGNATURES_NAME: &str = "signatures";
    pub const INITIATIVE_NAME: &str = "initiative";

    pub static BANK: Lazy<ScopeId> = Lazy::new(|| ScopeId::from_name(BANK_NAME));
    pub static EXECUTOR: Lazy<ScopeId> = Lazy::new(|| ScopeId::from_name(EXECUTOR_NAME));
    pub static ERC1271: Lazy<ScopeId> = Lazy::new(|| ScopeId::from_name(ERC1271_NAME));

    pub static VOTING: Lazy<ScopeId> = Lazy::new(|| ScopeId::from_name(VOTING_NAME));
    pub static ONBOARDING: Lazy<ScopeId> = Lazy::new(|| ScopeId::from_name(ONBOARDING_NAME));
    pub static FINANCING: Lazy<ScopeId> = Lazy::new(|| ScopeId::from_name(FINANCING_NAME));
    pub static GUILDKICK: Lazy<ScopeId> = Lazy::new(|| ScopeId::from_name(GUILDKICK_NAME));
    pub static MANAGING: Lazy<ScopeId> = Lazy::new(|| ScopeId::from_name(MANAGING_NAME));
    pub static DISTRIBUTE: Lazy<ScopeId> = Lazy::new(|| ScopeId::from_name(DISTRIBUTE_NAME));
    pub static DAO_REGISTRY: Lazy<ScopeId> = Lazy::new(|| ScopeId::from_name(DAO_REGISTRY_NAME));
    pub static BANK_ADAPTER: Lazy<ScopeId> = Lazy::new(|| ScopeId::from_name(BANK_ADAPTER_NAME));
    pub static CONFIGURATION: Lazy<ScopeId> =
        Lazy::new(|| ScopeId::from_name(CONFIGURATION_NAME));
    pub static VETOER: Lazy<ScopeId> = Lazy::new(|| ScopeId::from_name(VETOER_NAME));
    pub static SERVICE_PROVIDER: Lazy<ScopeId> =
        Lazy::new(|| ScopeId::from_name(SERVICE_PROVIDER_NAME));
    pub static SIGNATURES: Lazy<ScopeId> = Lazy::new(|| ScopeId::from_name(SIGNATURES_NAME));
    pub static INITIATIVE: Lazy<ScopeId> = Lazy::new(|| ScopeId::from_name(INITIATIVE_NAME));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_hex_roundtrip() {
        let addr: Address = "0x000000000000000000000000000000000000dead".parse().unwrap();
        assert_eq!(addr, GUILD_ADDRESS);
        assert_eq!(addr.to_string(), "0x000000000000000000000000000000000000dead");

        let no_prefix: Address = "000000000000000000000000000000000000babe".parse().unwrap();
        assert_eq!(no_prefix, TOTAL_ADDRESS);
    }

    #[test]
    fn test_address_parse_rejects_bad_input() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("0xzz00000000000000000000000000000000000000".parse::<Address>().is_err());
    }

    #[test]
    fn test_reserved_sentinels() {
        assert!(GUILD_ADDRESS.is_reserved());
        assert!(ESCROW_ADDRESS.is_reserved());
        assert!(TOTAL_ADDRESS.is_reserved());
        assert!(!UNITS.is_reserved());
        assert!(!Address::ZERO.is_reserved());
        assert_eq!(Reserved::from_address(ESCROW_ADDRESS), Some(Reserved::Escrow));
    }

    #[test]
    fn test_account_ref_keeps_reserved_apart_from_members() {
        // The sentinel address used as a plain address is a different ledger key.
        assert_ne!(AccountRef::from(GUILD_ADDRESS), AccountRef::GUILD);
        assert_eq!(AccountRef::GUILD.to_string(), "GUILD");
        assert!(AccountRef::ESCROW.is_reserved());
    }

    #[test]
    fn test_scope_ids_are_name_derived() {
        assert_eq!(*ids::BANK, ScopeId::from_name("bank"));
        assert_ne!(*ids::BANK, *ids::VOTING);
        assert_ne!(
            ScopeId::for_token("onboarding.unitPrice", &UNITS),
            ScopeId::for_token("onboarding.unitPrice", &LOOT)
        );
    }

    #[test]
    fn test_proposal_id_from_u64() {
        assert!(ProposalId::from_u64(0).is_zero());
        assert!(!ProposalId::from(1).is_zero());
        assert_ne!(ProposalId::from(1), ProposalId::from(2));
    }

    #[test]
    fn test_derived_addresses_are_distinct() {
        assert_ne!(Address::derive("bank", 1), Address::derive("bank", 2));
        assert_ne!(Address::derive("bank", 1), Address::derive("voting", 1));
    }
}
