//! Access-control flags: named permissions packed into one integer per
//! (grantee, scope). Bit positions follow the declaration order of each enum.
//! Never reorder or insert variants; stored values would change meaning.

use std::fmt;
use std::marker::PhantomData;

use crate::error::{DaoError, DaoResult};

/// A closed, ordered permission set.
pub trait Flag: Copy + Eq + fmt::Debug + 'static {
    /// Canonical order. Bit `i` of a stored value means `ALL[i]`.
    const ALL: &'static [Self];

    fn name(self) -> &'static str;

    fn bit(self) -> u8;

    fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|f| f.name()).collect()
    }

    fn from_name(name: &str) -> DaoResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.name() == name)
            .ok_or_else(|| DaoError::InvalidFlagName(name.to_string()))
    }
}

macro_rules! flag_enum {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        $vis enum $name {
            $($variant),+
        }

        impl Flag for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            fn bit(self) -> u8 {
                self as u8
            }
        }
    };
}

pub(crate) use flag_enum;

flag_enum! {
    /// Permissions an adapter holds on the DAO registry itself.
    pub enum DaoFlag {
        ReplaceAdapter => "REPLACE_ADAPTER",
        SubmitProposal => "SUBMIT_PROPOSAL",
        UpdateDelegateKey => "UPDATE_DELEGATE_KEY",
        SetConfiguration => "SET_CONFIGURATION",
        AddExtension => "ADD_EXTENSION",
        RemoveExtension => "REMOVE_EXTENSION",
        NewMember => "NEW_MEMBER",
        AddVetoer => "ADD_VETOER",
        RemoveVetoer => "REMOVE_VETOER",
        AddServiceProvider => "ADD_SERVICE_PROVIDER",
        RemoveServiceProvider => "REMOVE_SERVICE_PROVIDER",
    }
}

flag_enum! {
    /// Permissions on the bank extension.
    pub enum BankFlag {
        AddToBalance => "ADD_TO_BALANCE",
        SubFromBalance => "SUB_FROM_BALANCE",
        InternalTransfer => "INTERNAL_TRANSFER",
        Withdraw => "WITHDRAW",
        RegisterNewToken => "REGISTER_NEW_TOKEN",
        RegisterNewInternalToken => "REGISTER_NEW_INTERNAL_TOKEN",
        UpdateToken => "UPDATE_TOKEN",
    }
}

flag_enum! {
    pub enum ExecutorFlag {
        Execute => "EXECUTE",
    }
}

flag_enum! {
    pub enum Erc1271Flag {
        Sign => "SIGN",
    }
}

/// Packs `selected` names into an integer using the order of `all`.
pub fn build_flags<S: AsRef<str>>(all: &[&str], selected: &[S]) -> DaoResult<u128> {
    let mut bits = 0u128;
    for name in selected {
        let name = name.as_ref();
        let index = all
            .iter()
            .position(|candidate| *candidate == name)
            .ok_or_else(|| DaoError::InvalidFlagName(name.to_string()))?;
        if index >= 128 {
            return Err(DaoError::InvalidFlagName(name.to_string()));
        }
        bits |= 1u128 << index;
    }
    Ok(bits)
}

pub fn has_flag(stored: u128, bit: u8) -> bool {
    bit < 128 && (stored >> bit) & 1 == 1
}

/// Typed view over a stored permission integer.
pub struct Flags<F> {
    bits: u128,
    marker: PhantomData<F>,
}

impl<F: Flag> Flags<F> {
    pub const fn empty() -> Self {
        Flags {
            bits: 0,
            marker: PhantomData,
        }
    }

    pub const fn from_bits(bits: u128) -> Self {
        Flags {
            bits,
            marker: PhantomData,
        }
    }

    pub fn of(flags: &[F]) -> Self {
        flags.iter().fold(Self::empty(), |acc, f| acc.with(*f))
    }

    pub fn all() -> Self {
        Self::of(F::ALL)
    }

    pub fn from_names<S: AsRef<str>>(names: &[S]) -> DaoResult<Self> {
        build_flags(&F::names(), names).map(Self::from_bits)
    }

    pub fn bits(&self) -> u128 {
        self.bits
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn with(mut self, flag: F) -> Self {
        self.insert(flag);
        self
    }

    pub fn insert(&mut self, flag: F) {
        self.bits |= 1u128 << flag.bit();
    }

    pub fn remove(&mut self, flag: F) {
        self.bits &= !(1u128 << flag.bit());
    }

    pub fn has(&self, flag: F) -> bool {
        has_flag(self.bits, flag.bit())
    }

    pub fn iter(&self) -> impl Iterator<Item = F> + '_ {
        F::ALL.iter().copied().filter(move |f| self.has(*f))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|f| f.name()).collect()
    }
}

impl<F> Clone for Flags<F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F> Copy for Flags<F> {}

impl<F> PartialEq for Flags<F> {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<F> Eq for Flags<F> {}

impl<F: Flag> Default for Flags<F> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<F: Flag> fmt::Debug for Flags<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}
