use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use aegis_dao::adapters::onboarding::OnboardingAdapter;
use aegis_dao::adapters::{Adapter, VoteChoice};
use aegis_dao::config::scope_flag_names;
use aegis_dao::extensions::BankExtension;
use aegis_dao::types::{AccountRef, ProposalId, ETH_TOKEN};
use aegis_dao::{deploy_dao, Chain, DeploymentConfig};

#[derive(Parser)]
#[command(name = "aegis-dao")]
#[command(author = "AEGIS Team")]
#[command(version = "0.1.0")]
#[command(about = "Deploy and inspect AEGIS DAOs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a deployment config
    Validate {
        /// Path to the deployment TOML file
        #[arg(long)]
        config: PathBuf,
    },

    /// Show the decoded ACL of every adapter
    Acl {
        /// Path to the deployment TOML file
        #[arg(long)]
        config: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show the canonical flag order of a scope (dao, bank, executor, erc1271)
    Flags {
        scope: String,
    },

    /// Write the default deployment config
    InitConfig {
        path: PathBuf,
    },

    /// Deploy the DAO in a fresh chain and run one onboarding round
    Simulate {
        /// Path to the deployment TOML file
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(Serialize)]
struct AclReport {
    adapter: String,
    dao_flags: Vec<String>,
    dao_value: u128,
    extensions: Vec<ExtensionAclReport>,
}

#[derive(Serialize)]
struct ExtensionAclReport {
    extension: String,
    flags: Vec<String>,
    value: u128,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::Acl { config, json } => acl(&config, json),
        Commands::Flags { scope } => flags(&scope),
        Commands::InitConfig { path } => init_config(&path),
        Commands::Simulate { config } => simulate(&config),
    }
}

fn load(path: &Path) -> Result<DeploymentConfig> {
    let config = DeploymentConfig::from_file(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

fn validate(path: &Path) -> Result<()> {
    let config = load(path)?;
    println!(
        "{} {} ({} adapters, {} onboarding terms)",
        "✓".bright_green(),
        config.dao.name.bright_white(),
        config.adapters.len(),
        config.onboarding.len()
    );
    Ok(())
}

fn acl(path: &Path, json: bool) -> Result<()> {
    let config = load(path)?;
    let mut reports = Vec::with_capacity(config.adapters.len());
    for adapter in &config.adapters {
        let mut extensions = Vec::new();
        for (extension, value) in adapter.extension_flags()? {
            extensions.push(ExtensionAclReport {
                flags: adapter.extensions[&extension].clone(),
                extension,
                value,
            });
        }
        reports.push(AclReport {
            adapter: adapter.name.clone(),
            dao_flags: adapter.dao.clone(),
            dao_value: adapter.dao_flags()?.bits(),
            extensions,
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    println!("{}", format!("═══ ACL of {} ═══", config.dao.name).bright_cyan());
    for report in &reports {
        println!();
        println!("  {}", report.adapter.bright_yellow().bold());
        println!(
            "    dao        {:>6}  {}",
            report.dao_value,
            report.dao_flags.join(", ").dimmed()
        );
        for ext in &report.extensions {
            println!(
                "    {:<10} {:>6}  {}",
                ext.extension,
                ext.value,
                ext.flags.join(", ").dimmed()
            );
        }
    }
    Ok(())
}

fn flags(scope: &str) -> Result<()> {
    let names = scope_flag_names(scope)
        .with_context(|| format!("Unknown scope '{}': use dao, bank, executor or erc1271", scope))?;
    println!("{}", format!("═══ {} flags ═══", scope).bright_cyan());
    for (bit, name) in names.iter().enumerate() {
        println!("  {:>3}  {:<26} {}", bit, name.bright_white(), 1u128 << bit);
    }
    Ok(())
}

fn init_config(path: &Path) -> Result<()> {
    DeploymentConfig::default().to_file(path)?;
    println!("{} wrote {}", "✓".bright_green(), path.display());
    Ok(())
}

fn simulate(path: &Path) -> Result<()> {
    let config = load(path)?;
    let terms_config = config
        .onboarding
        .first()
        .context("Simulation needs at least one [[onboarding]] entry")?;

    let mut chain = Chain::new();
    let mut d = deploy_dao(&mut chain, &config)?;
    let owner = d.owner_msg();
    let applicant = chain.next_address("applicant");
    let token = terms_config.token_to_mint;
    let terms = OnboardingAdapter::terms(&d.dao, token)?;
    let payment = terms.unit_price.clone();

    info!("onboarding {} for one chunk of {}", applicant, token);
    let proposal_id = ProposalId::from_u64(1);
    d.adapters.onboarding.submit_proposal(
        &mut d.dao,
        &mut chain,
        &mut d.adapters.voting,
        &owner,
        proposal_id,
        applicant,
        token,
        payment.clone(),
    )?;
    d.adapters
        .voting
        .submit_vote(&d.dao, &chain, &owner, proposal_id, VoteChoice::Yes as u8)?;
    chain.advance_time(config.voting.voting_period + config.voting.grace_period + 1);

    chain.mint(d.owner, terms.payment_token, &payment);
    let msg = if terms.payment_token == ETH_TOKEN {
        owner.clone().with_value(payment.clone())
    } else {
        chain.approve(
            d.owner,
            d.adapters.onboarding.address(),
            terms.payment_token,
            payment.clone(),
        );
        owner.clone()
    };
    let result = d.adapters.onboarding.process_proposal(
        &mut d.dao,
        &mut chain,
        &d.adapters.voting,
        &msg,
        proposal_id,
    )?;

    println!("{}", format!("═══ {} ═══", d.dao.name()).bright_cyan());
    println!("  Address:   {}", d.dao.address().to_string().bright_yellow());
    println!("  Proposal:  {:?}", result);
    println!();
    println!("{}", "═══ Ledger ═══".bright_cyan());
    let bank = d.dao.bank()?;
    for member in d.dao.registry().members() {
        print_balances(bank, AccountRef::Member(*member));
    }
    print_balances(bank, AccountRef::GUILD);
    print_balances(bank, AccountRef::TOTAL);
    Ok(())
}

fn print_balances(bank: &BankExtension, account: AccountRef) {
    let tokens = bank
        .get_internal_tokens()
        .iter()
        .chain(bank.get_tokens())
        .map(|token| format!("{}={}", token, bank.balance_of(account, *token)))
        .collect::<Vec<_>>()
        .join("  ");
    println!("  {:<44} {}", account.to_string().bright_white(), tokens.dimmed());
}
