//! Library interface for the AEGIS DAO framework
//! Registry, bank ledger, governance adapters and extensions over an
//! in-process chain simulator

pub mod acl;
pub mod adapters;
pub mod chain;
pub mod config;
pub mod dao;
pub mod deploy;
pub mod error;
pub mod extensions;
pub mod factory;
pub mod registry;
pub mod types;

pub use chain::{atomically, Chain, Msg};
pub use config::DeploymentConfig;
pub use dao::Dao;
pub use deploy::{deploy_dao, Deployment};
pub use error::{DaoError, DaoResult};
