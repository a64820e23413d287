use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::acl::{build_flags, BankFlag, DaoFlag, Erc1271Flag, ExecutorFlag, Flag, Flags};
use crate::error::{DaoError, DaoResult};
use crate::types::{ids, Address, Amount, ETH_TOKEN, UNITS};

/// Owner of the DAO deployed by the default configuration.
pub const DEFAULT_OWNER: Address = Address::from_low_u64(0xc0ffee);

/// Adapters a deployment knows how to build.
pub const ADAPTER_NAMES: &[&str] = &[
    ids::VOTING_NAME,
    ids::ONBOARDING_NAME,
    ids::FINANCING_NAME,
    ids::GUILDKICK_NAME,
    ids::MANAGING_NAME,
    ids::DISTRIBUTE_NAME,
    ids::DAO_REGISTRY_NAME,
    ids::BANK_ADAPTER_NAME,
    ids::CONFIGURATION_NAME,
    ids::VETOER_NAME,
    ids::SERVICE_PROVIDER_NAME,
    ids::SIGNATURES_NAME,
    ids::INITIATIVE_NAME,
];

/// DAO deployment description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub dao: DaoConfig,
    pub bank: BankConfig,
    pub voting: VotingConfig,
    #[serde(default)]
    pub onboarding: Vec<OnboardingConfig>,
    pub extensions: ExtensionsConfig,
    #[serde(default)]
    pub adapters: Vec<AdapterAclConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaoConfig {
    /// Unique DAO name
    pub name: String,
    /// Creator and first member
    pub owner: Address,
    /// Leave creation mode once everything is wired
    pub finalize: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankConfig {
    /// Maximum number of external tokens, 1 to 200
    pub max_external_tokens: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingConfig {
    /// Voting period in seconds
    pub voting_period: u64,
    /// Grace period in seconds
    pub grace_period: u64,
}

/// Minting terms for one internal token. Amounts are decimal strings since
/// they routinely exceed 64 bits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingConfig {
    pub token_to_mint: Address,
    pub unit_price: String,
    pub units_per_chunk: String,
    pub max_chunks: String,
    pub payment_token: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionsConfig {
    /// Deploy the executor extension
    pub executor: bool,
    /// Deploy the ERC1271 signing extension
    pub erc1271: bool,
}

/// Permissions granted to one adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdapterAclConfig {
    pub name: String,
    /// DAO registry flags
    #[serde(default)]
    pub dao: Vec<String>,
    /// Extension name -> flags on that extension
    #[serde(default)]
    pub extensions: BTreeMap<String, Vec<String>>,
}

impl AdapterAclConfig {
    fn new(name: &str, dao: &[&str], extensions: &[(&str, &[&str])]) -> Self {
        Self {
            name: name.to_string(),
            dao: dao.iter().map(|f| f.to_string()).collect(),
            extensions: extensions
                .iter()
                .map(|(ext, flags)| {
                    (
                        ext.to_string(),
                        flags.iter().map(|f| f.to_string()).collect(),
                    )
                })
                .collect(),
        }
    }

    pub fn dao_flags(&self) -> DaoResult<Flags<DaoFlag>> {
        Flags::from_names(&self.dao)
    }

    /// Packed flags per extension name.
    pub fn extension_flags(&self) -> DaoResult<Vec<(String, u128)>> {
        self.extensions
            .iter()
            .map(|(extension, names)| {
                let all = scope_flag_names(extension).ok_or(DaoError::ExtensionNotFound)?;
                Ok((extension.clone(), build_flags(&all, names)?))
            })
            .collect()
    }
}

/// Canonical flag order of a permission scope: `dao` or an extension name.
pub fn scope_flag_names(scope: &str) -> Option<Vec<&'static str>> {
    match scope {
        "dao" => Some(DaoFlag::names()),
        ids::BANK_NAME => Some(BankFlag::names()),
        ids::EXECUTOR_NAME | "executor" => Some(ExecutorFlag::names()),
        ids::ERC1271_NAME => Some(Erc1271Flag::names()),
        _ => None,
    }
}

pub(crate) fn parse_amount(field: &str, raw: &str) -> anyhow::Result<Amount> {
    raw.trim()
        .parse::<Amount>()
        .map_err(|e| anyhow::anyhow!("Invalid {}: '{}' ({})", field, raw, e))
}

/// Parsed onboarding terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingAmounts {
    pub unit_price: Amount,
    pub units_per_chunk: Amount,
    pub max_chunks: Amount,
}

impl OnboardingConfig {
    pub fn amounts(&self) -> anyhow::Result<OnboardingAmounts> {
        Ok(OnboardingAmounts {
            unit_price: parse_amount("unit_price", &self.unit_price)?,
            units_per_chunk: parse_amount("units_per_chunk", &self.units_per_chunk)?,
            max_chunks: parse_amount("max_chunks", &self.max_chunks)?,
        })
    }
}

fn default_adapters() -> Vec<AdapterAclConfig> {
    use ids::*;

    vec![
        AdapterAclConfig::new(VOTING_NAME, &[], &[]),
        AdapterAclConfig::new(
            ONBOARDING_NAME,
            &["SUBMIT_PROPOSAL", "UPDATE_DELEGATE_KEY", "NEW_MEMBER"],
            &[(BANK_NAME, &["ADD_TO_BALANCE", "INTERNAL_TRANSFER"])],
        ),
        AdapterAclConfig::new(
            FINANCING_NAME,
            &["SUBMIT_PROPOSAL"],
            &[(
                BANK_NAME,
                &["INTERNAL_TRANSFER", "SUB_FROM_BALANCE", "ADD_TO_BALANCE"],
            )],
        ),
        AdapterAclConfig::new(
            GUILDKICK_NAME,
            &["SUBMIT_PROPOSAL"],
            &[(
                BANK_NAME,
                &[
                    "INTERNAL_TRANSFER",
                    "SUB_FROM_BALANCE",
                    "ADD_TO_BALANCE",
                    "REGISTER_NEW_TOKEN",
                ],
            )],
        ),
        AdapterAclConfig::new(
            MANAGING_NAME,
            &[
                "SUBMIT_PROPOSAL",
                "REPLACE_ADAPTER",
                "ADD_EXTENSION",
                "REMOVE_EXTENSION",
                "SET_CONFIGURATION",
            ],
            &[],
        ),
        AdapterAclConfig::new(
            DISTRIBUTE_NAME,
            &["SUBMIT_PROPOSAL"],
            &[(BANK_NAME, &["INTERNAL_TRANSFER"])],
        ),
        AdapterAclConfig::new(DAO_REGISTRY_NAME, &["UPDATE_DELEGATE_KEY"], &[]),
        AdapterAclConfig::new(
            BANK_ADAPTER_NAME,
            &[],
            &[(
                BANK_NAME,
                &["WITHDRAW", "SUB_FROM_BALANCE", "ADD_TO_BALANCE", "UPDATE_TOKEN"],
            )],
        ),
        AdapterAclConfig::new(
            CONFIGURATION_NAME,
            &["SUBMIT_PROPOSAL", "SET_CONFIGURATION"],
            &[],
        ),
        AdapterAclConfig::new(
            VETOER_NAME,
            &["SUBMIT_PROPOSAL", "ADD_VETOER", "REMOVE_VETOER"],
            &[],
        ),
        AdapterAclConfig::new(
            SERVICE_PROVIDER_NAME,
            &[
                "SUBMIT_PROPOSAL",
                "ADD_SERVICE_PROVIDER",
                "REMOVE_SERVICE_PROVIDER",
            ],
            &[],
        ),
        AdapterAclConfig::new(
            SIGNATURES_NAME,
            &["SUBMIT_PROPOSAL"],
            &[(ERC1271_NAME, &["SIGN"])],
        ),
        AdapterAclConfig::new(
            INITIATIVE_NAME,
            &["SUBMIT_PROPOSAL"],
            &[(BANK_NAME, &["INTERNAL_TRANSFER"])],
        ),
    ]
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            dao: DaoConfig {
                name: "aegis-dao".to_string(),
                owner: DEFAULT_OWNER,
                finalize: true,
            },
            bank: BankConfig {
                max_external_tokens: 100,
            },
            voting: VotingConfig {
                voting_period: 10,
                grace_period: 1,
            },
            onboarding: vec![OnboardingConfig {
                token_to_mint: UNITS,
                unit_price: "120000000000000000".to_string(),
                units_per_chunk: "1000000000000000".to_string(),
                max_chunks: "11".to_string(),
                payment_token: ETH_TOKEN,
            }],
            extensions: ExtensionsConfig {
                executor: true,
                erc1271: true,
            },
            adapters: default_adapters(),
        }
    }
}

impl DeploymentConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let config: DeploymentConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(&self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.dao.name.trim().is_empty() {
            anyhow::bail!("Invalid dao name: cannot be empty");
        }

        if self.dao.owner.is_zero() || self.dao.owner.is_reserved() {
            anyhow::bail!("Invalid dao owner: {}", self.dao.owner);
        }

        if self.bank.max_external_tokens == 0 || self.bank.max_external_tokens > 200 {
            anyhow::bail!(
                "Invalid bank max_external_tokens: must be in 1..=200, got {}",
                self.bank.max_external_tokens
            );
        }

        if self.voting.voting_period == 0 {
            anyhow::bail!("Invalid voting_period: must be > 0");
        }

        for terms in &self.onboarding {
            if terms.token_to_mint.is_reserved() {
                anyhow::bail!("Invalid token_to_mint: {} is reserved", terms.token_to_mint);
            }
            let amounts = terms.amounts()?;
            if amounts.unit_price.is_zero()
                || amounts.units_per_chunk.is_zero()
                || amounts.max_chunks.is_zero()
            {
                anyhow::bail!(
                    "Invalid onboarding terms for {}: amounts must be > 0",
                    terms.token_to_mint
                );
            }
        }

        let mut seen = HashSet::new();
        for acl in &self.adapters {
            if !ADAPTER_NAMES.contains(&acl.name.as_str()) {
                anyhow::bail!("Invalid adapter name: {}", acl.name);
            }
            if !seen.insert(acl.name.as_str()) {
                anyhow::bail!("Duplicate adapter entry: {}", acl.name);
            }
            acl.dao_flags()?;
            for extension in acl.extensions.keys() {
                if !self.extension_enabled(extension) {
                    anyhow::bail!(
                        "Invalid extension '{}' for adapter {}",
                        extension,
                        acl.name
                    );
                }
            }
            acl.extension_flags()?;
        }

        Ok(())
    }

    /// Whether `extension` is deployed by this configuration.
    pub fn extension_enabled(&self, extension: &str) -> bool {
        match extension {
            ids::BANK_NAME => true,
            ids::EXECUTOR_NAME | "executor" => self.extensions.executor,
            ids::ERC1271_NAME => self.extensions.erc1271,
            _ => false,
        }
    }

    pub fn adapter(&self, name: &str) -> Option<&AdapterAclConfig> {
        self.adapters.iter().find(|acl| acl.name == name)
    }
}
