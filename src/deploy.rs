//! Wires a complete DAO from a [`DeploymentConfig`]: the DAO itself, its
//! extensions, every adapter with its ACL, and the voting and onboarding
//! settings.

use anyhow::Context;
use tracing::info;

use crate::adapters::{
    Adapter, BankAdapter, ConfigurationAdapter, DaoRegistryAdapter, DistributeAdapter,
    FinancingAdapter, GuildKickAdapter, InitiativeAdapter, ManagingAdapter, OnboardingAdapter,
    ServiceProviderAdapter, SignaturesAdapter, VetoerAdapter, Voting,
};
use crate::chain::{Chain, Msg};
use crate::config::DeploymentConfig;
use crate::dao::Dao;
use crate::factory::{AdapterEntry, BankFactory, DaoFactory, Erc1271Factory, ExecutorFactory};
use crate::types::{ids, Address, ScopeId, LOOT};

/// One instance of every known adapter.
#[derive(Debug, Clone)]
pub struct Adapters {
    pub voting: Voting,
    pub onboarding: OnboardingAdapter,
    pub financing: FinancingAdapter,
    pub guildkick: GuildKickAdapter,
    pub managing: ManagingAdapter,
    pub distribute: DistributeAdapter,
    pub dao_registry: DaoRegistryAdapter,
    pub bank_adapter: BankAdapter,
    pub configuration: ConfigurationAdapter,
    pub vetoer: VetoerAdapter,
    pub service_provider: ServiceProviderAdapter,
    pub signatures: SignaturesAdapter,
    pub initiative: InitiativeAdapter,
}

impl Adapters {
    pub fn new(chain: &mut Chain) -> Self {
        Self {
            voting: Voting::new(chain.next_address(ids::VOTING_NAME)),
            onboarding: OnboardingAdapter::new(chain.next_address(ids::ONBOARDING_NAME)),
            financing: FinancingAdapter::new(chain.next_address(ids::FINANCING_NAME)),
            guildkick: GuildKickAdapter::new(chain.next_address(ids::GUILDKICK_NAME)),
            managing: ManagingAdapter::new(chain.next_address(ids::MANAGING_NAME)),
            distribute: DistributeAdapter::new(chain.next_address(ids::DISTRIBUTE_NAME)),
            dao_registry: DaoRegistryAdapter::new(chain.next_address(ids::DAO_REGISTRY_NAME)),
            bank_adapter: BankAdapter::new(chain.next_address(ids::BANK_ADAPTER_NAME)),
            configuration: ConfigurationAdapter::new(chain.next_address(ids::CONFIGURATION_NAME)),
            vetoer: VetoerAdapter::new(chain.next_address(ids::VETOER_NAME)),
            service_provider: ServiceProviderAdapter::new(
                chain.next_address(ids::SERVICE_PROVIDER_NAME),
            ),
            signatures: SignaturesAdapter::new(chain.next_address(ids::SIGNATURES_NAME)),
            initiative: InitiativeAdapter::new(chain.next_address(ids::INITIATIVE_NAME)),
        }
    }

    fn all(&self) -> [&dyn Adapter; 13] {
        [
            &self.voting,
            &self.onboarding,
            &self.financing,
            &self.guildkick,
            &self.managing,
            &self.distribute,
            &self.dao_registry,
            &self.bank_adapter,
            &self.configuration,
            &self.vetoer,
            &self.service_provider,
            &self.signatures,
            &self.initiative,
        ]
    }

    pub fn address_of(&self, name: &str) -> Option<Address> {
        self.all()
            .into_iter()
            .find(|adapter| adapter.name() == name)
            .map(|adapter| adapter.address())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Factories {
    pub dao: DaoFactory,
    pub bank: BankFactory,
    pub executor: ExecutorFactory,
    pub erc1271: Erc1271Factory,
}

/// A deployed DAO together with the adapters and factories serving it.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub dao: Dao,
    pub adapters: Adapters,
    pub factories: Factories,
    pub owner: Address,
}

impl Deployment {
    pub fn owner_msg(&self) -> Msg {
        Msg::sender(self.owner)
    }
}

pub fn deploy_dao(chain: &mut Chain, config: &DeploymentConfig) -> anyhow::Result<Deployment> {
    config.validate()?;

    let owner = config.dao.owner;
    let msg = Msg::sender(owner);
    let mut factories = Factories::default();
    let mut dao = factories
        .dao
        .create_dao(chain, &msg, &config.dao.name, owner)
        .context("Failed to create DAO")?;

    let block = chain.block_number();
    let bank = factories
        .bank
        .create(&mut dao, chain, config.bank.max_external_tokens)?;
    dao.add_extension(owner, *ids::BANK, bank, owner, block)
        .context("Failed to add bank extension")?;
    let mut extensions = vec![(ids::BANK_NAME, bank)];

    if config.extensions.executor {
        let executor = factories.executor.create(&mut dao, chain);
        dao.add_extension(owner, *ids::EXECUTOR, executor, owner, block)
            .context("Failed to add executor extension")?;
        extensions.push((ids::EXECUTOR_NAME, executor));
    }
    if config.extensions.erc1271 {
        let erc1271 = factories.erc1271.create(&mut dao, chain);
        dao.add_extension(owner, *ids::ERC1271, erc1271, owner, block)
            .context("Failed to add erc1271 extension")?;
        extensions.push((ids::ERC1271_NAME, erc1271));
    }

    let adapters = Adapters::new(chain);
    let mut entries = Vec::with_capacity(config.adapters.len());
    for acl in &config.adapters {
        let address = adapters
            .address_of(&acl.name)
            .with_context(|| format!("Unknown adapter {}", acl.name))?;
        entries.push(AdapterEntry {
            id: ScopeId::from_name(&acl.name),
            address,
            flags: acl.dao_flags()?,
        });
    }
    factories.dao.add_adapters(&mut dao, &msg, &entries)?;

    for (acl, entry) in config.adapters.iter().zip(&entries) {
        for (extension_name, bits) in acl.extension_flags()? {
            let canonical = if extension_name == "executor" {
                ids::EXECUTOR_NAME
            } else {
                extension_name.as_str()
            };
            let extension = extensions
                .iter()
                .find(|(name, _)| *name == canonical)
                .map(|(_, address)| *address)
                .with_context(|| format!("Extension {} is not deployed", extension_name))?;
            factories
                .dao
                .configure_extension(&mut dao, &msg, extension, &[(entry.address, bits)])?;
        }
    }

    adapters.voting.configure_dao(
        &mut dao,
        owner,
        config.voting.voting_period,
        config.voting.grace_period,
    )?;
    for terms in &config.onboarding {
        let amounts = terms.amounts()?;
        adapters.onboarding.configure_dao(
            &mut dao,
            owner,
            terms.token_to_mint,
            amounts.unit_price,
            amounts.units_per_chunk,
            amounts.max_chunks,
            terms.payment_token,
        )?;
    }
    dao.register_potential_new_internal_token(owner, LOOT)?;

    if config.dao.finalize {
        dao.finalize_dao(owner)?;
    }

    info!(
        "DAO '{}' deployed at {} with {} adapters",
        dao.name(),
        dao.address(),
        entries.len()
    );

    Ok(Deployment {
        dao,
        adapters,
        factories,
        owner,
    })
}
