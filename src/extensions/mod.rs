//! Resource-holding extensions. Each one guards itself by asking the registry
//! whether the calling adapter holds the right bit for it.

pub mod bank;
pub mod erc1271;
pub mod executor;

use crate::acl::Flag;
use crate::error::{DaoError, DaoResult};
use crate::registry::DaoRegistry;
use crate::types::Address;

pub use bank::BankExtension;
pub use erc1271::Erc1271Extension;
pub use executor::ExecutorExtension;

pub trait Extension {
    fn address(&self) -> Address;

    fn is_initialized(&self) -> bool;

    /// Binds the extension to its DAO. Runs once, for a member `creator`.
    fn initialize(&mut self, registry: &DaoRegistry, creator: Address, block: u64)
        -> DaoResult<()>;
}

/// Every extension deployed for a DAO, registered or not.
#[derive(Debug, Clone)]
pub enum ExtensionInstance {
    Bank(BankExtension),
    Executor(ExecutorExtension),
    Erc1271(Erc1271Extension),
}

impl ExtensionInstance {
    pub fn as_extension(&self) -> &dyn Extension {
        match self {
            ExtensionInstance::Bank(ext) => ext,
            ExtensionInstance::Executor(ext) => ext,
            ExtensionInstance::Erc1271(ext) => ext,
        }
    }

    pub fn as_extension_mut(&mut self) -> &mut dyn Extension {
        match self {
            ExtensionInstance::Bank(ext) => ext,
            ExtensionInstance::Executor(ext) => ext,
            ExtensionInstance::Erc1271(ext) => ext,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ExtensionInstance::Bank(_) => "bank",
            ExtensionInstance::Executor(_) => "executor",
            ExtensionInstance::Erc1271(_) => "erc1271",
        }
    }
}

/// Shared guard: granted flag, creation-mode access, the DAO itself, or an
/// extension that has not been initialized yet.
pub(crate) fn check_access<F: Flag>(
    registry: &DaoRegistry,
    extension: Address,
    dao: Address,
    initialized: bool,
    caller: Address,
    flag: F,
) -> DaoResult<()> {
    if registry.address() != dao {
        return Err(DaoError::AccessDenied {
            caller,
            permission: flag.name(),
        });
    }
    let allowed = !initialized
        || caller == dao
        || registry.in_creation_mode_with_access(caller)
        || registry.has_adapter_access_to_extension(caller, extension, flag.bit());
    if allowed {
        Ok(())
    } else {
        Err(DaoError::AccessDenied {
            caller,
            permission: flag.name(),
        })
    }
}

/// Creator check shared by every `initialize`.
pub(crate) fn check_initialize(
    registry: &DaoRegistry,
    dao: Address,
    initialized: bool,
    creator: Address,
) -> DaoResult<()> {
    if initialized {
        return Err(DaoError::AlreadyInitialized);
    }
    if registry.address() != dao {
        return Err(DaoError::AccessDenied {
            caller: registry.address(),
            permission: "INITIALIZE",
        });
    }
    if !registry.is_member(creator) {
        return Err(DaoError::NotAMember(creator));
    }
    Ok(())
}
