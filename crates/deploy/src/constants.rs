//! Address and constant tables, and their per-network views.
//!
//! Tables are keyed by logical name, then by [`NetworkId`]. An empty string in a
//! table means "not deployed / not configured" and resolves to
//! [`Resolved::Unset`], which is distinct from a value that is set to zero.

use std::collections::BTreeMap;

use alloy_core::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    network::NetworkId,
};

/// Outcome of looking a name up for one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolved<T> {
    Set(T),
    Unset,
}

impl<T> Resolved<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    /// Turn the sentinel into an [`Error::UnresolvedDependency`].
    pub fn require(self, name: &str, network: NetworkId) -> Result<T> {
        match self {
            Self::Set(value) => Ok(value),
            Self::Unset => Err(Error::UnresolvedDependency {
                name: name.to_string(),
                network,
            }),
        }
    }
}

/// One cell of the address table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AddressSlot(Option<Address>);

impl TryFrom<String> for AddressSlot {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self(None));
        }
        s.parse::<Address>()
            .map(|addr| Self(Some(addr)))
            .map_err(|e| format!("invalid address '{s}': {e}"))
    }
}

impl From<AddressSlot> for String {
    fn from(slot: AddressSlot) -> Self {
        slot.0.map(|addr| addr.to_checksum(None)).unwrap_or_default()
    }
}

/// Contract name -> network -> deployed address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressTable(BTreeMap<String, BTreeMap<NetworkId, AddressSlot>>);

impl AddressTable {
    pub fn for_network(&self, network: NetworkId) -> AddressBook {
        let entries = self
            .0
            .iter()
            .map(|(name, cells)| {
                let resolved = match cells.get(&network) {
                    Some(AddressSlot(Some(addr))) => Resolved::Set(*addr),
                    _ => Resolved::Unset,
                };
                (name.clone(), resolved)
            })
            .collect();

        AddressBook { network, entries }
    }
}

/// Typed deployment parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstantValue {
    Integer(U256),
    Address(Address),
    /// Basis-like share, see [`SumInvariant`].
    Percent(u32),
}

impl ConstantValue {
    pub fn as_uint(&self) -> U256 {
        match self {
            Self::Integer(v) => *v,
            Self::Percent(p) => U256::from(*p),
            Self::Address(a) => U256::from_be_slice(a.as_slice()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawConstant {
    Int(u64),
    Percent { percent: u32 },
    Text(String),
}

/// One cell of the constant table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawConstant")]
pub struct ConstantSlot(Option<ConstantValue>);

impl TryFrom<RawConstant> for ConstantSlot {
    type Error = String;

    fn try_from(raw: RawConstant) -> std::result::Result<Self, Self::Error> {
        let value = match raw {
            RawConstant::Int(v) => ConstantValue::Integer(U256::from(v)),
            RawConstant::Percent { percent } => ConstantValue::Percent(percent),
            RawConstant::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(Self(None));
                }
                if s.len() == 42 && s.starts_with("0x") {
                    ConstantValue::Address(
                        s.parse().map_err(|e| format!("invalid address '{s}': {e}"))?,
                    )
                } else {
                    ConstantValue::Integer(
                        s.parse().map_err(|e| format!("invalid integer '{s}': {e}"))?,
                    )
                }
            }
        };
        Ok(Self(Some(value)))
    }
}

/// Constant name -> network -> value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ConstantTable(BTreeMap<String, BTreeMap<NetworkId, ConstantSlot>>);

impl ConstantTable {
    pub fn for_network(&self, network: NetworkId) -> ConstantBook {
        let entries = self
            .0
            .iter()
            .map(|(name, cells)| {
                let resolved = match cells.get(&network) {
                    Some(ConstantSlot(Some(value))) => Resolved::Set(*value),
                    _ => Resolved::Unset,
                };
                (name.clone(), resolved)
            })
            .collect();

        ConstantBook { network, entries }
    }
}

/// Address table projected onto one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressBook {
    network: NetworkId,
    entries: BTreeMap<String, Resolved<Address>>,
}

impl AddressBook {
    pub fn network(&self) -> NetworkId {
        self.network
    }

    /// Unknown names resolve to [`Resolved::Unset`] as well.
    pub fn get(&self, name: &str) -> Resolved<Address> {
        self.entries.get(name).copied().unwrap_or(Resolved::Unset)
    }

    pub fn require(&self, name: &str) -> Result<Address> {
        self.get(name).require(name, self.network)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Resolved<Address>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Constant table projected onto one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstantBook {
    network: NetworkId,
    entries: BTreeMap<String, Resolved<ConstantValue>>,
}

impl ConstantBook {
    pub fn network(&self) -> NetworkId {
        self.network
    }

    pub fn get(&self, name: &str) -> Resolved<ConstantValue> {
        self.entries.get(name).copied().unwrap_or(Resolved::Unset)
    }

    pub fn require(&self, name: &str) -> Result<ConstantValue> {
        self.get(name).require(name, self.network)
    }
}

/// Sibling constants that must add up to a fixed total.
///
/// `MASTERCHEF_STAKING_PERCENT + MASTERCHEF_DEV_PERCENT == 1_000_000` is the
/// canonical case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SumInvariant {
    pub parts: Vec<String>,
    pub total: U256,
}

impl SumInvariant {
    pub fn new<I, S>(parts: I, total: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
            total: U256::from(total),
        }
    }

    /// Check the invariant against a network's constants.
    pub fn check(&self, constants: &ConstantBook) -> Result<()> {
        let mut sum = U256::ZERO;
        for part in &self.parts {
            let value = constants.require(part)?.as_uint();
            sum = sum.checked_add(value).ok_or_else(|| {
                Error::InvalidConstantInvariant(format!("sum of {} overflows", self.parts.join(" + ")))
            })?;
        }

        if sum != self.total {
            return Err(Error::InvalidConstantInvariant(format!(
                "{} = {} on network {}, expected {}",
                self.parts.join(" + "),
                sum,
                constants.network(),
                self.total
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::address;

    fn constants(toml_src: &str) -> ConstantBook {
        let table: ConstantTable = toml::from_str(toml_src).unwrap();
        table.for_network(NetworkId(97))
    }

    #[test]
    fn test_empty_string_is_unset_but_zero_is_set() {
        let book = constants(
            r#"
[START_BLOCK]
97 = 0
[REWARD]
97 = ""
"#,
        );
        assert_eq!(book.get("START_BLOCK"), Resolved::Set(ConstantValue::Integer(U256::ZERO)));
        assert_eq!(book.get("REWARD"), Resolved::Unset);
        assert_eq!(book.get("NOT_IN_TABLE"), Resolved::Unset);
        assert!(matches!(
            book.require("REWARD"),
            Err(Error::UnresolvedDependency { .. })
        ));
    }

    #[test]
    fn test_value_forms() {
        let book = constants(
            r#"
[REWARD_PER_BLOCK]
97 = "40000000000000000000"
[DEV]
97 = "0x59201fb8cb2D61118B280c8542127331DD141654"
[STAKING]
97 = { percent = 900000 }
"#,
        );
        assert_eq!(
            book.require("REWARD_PER_BLOCK").unwrap(),
            ConstantValue::Integer(U256::from(40u64) * U256::from(10u64).pow(U256::from(18u64)))
        );
        assert_eq!(
            book.require("DEV").unwrap(),
            ConstantValue::Address(address!("0x59201fb8cb2D61118B280c8542127331DD141654"))
        );
        assert_eq!(book.require("STAKING").unwrap(), ConstantValue::Percent(900_000));
    }

    #[test]
    fn test_invalid_address_is_rejected() {
        let res: std::result::Result<AddressTable, _> = toml::from_str(
            r#"
[helixToken]
97 = "0x1234"
"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_sum_invariant() {
        let book = constants(
            r#"
[STAKING]
97 = { percent = 900000 }
[DEV]
97 = { percent = 100000 }
[BAD_DEV]
97 = { percent = 50000 }
"#,
        );
        assert!(SumInvariant::new(["STAKING", "DEV"], 1_000_000).check(&book).is_ok());
        assert!(matches!(
            SumInvariant::new(["STAKING", "BAD_DEV"], 1_000_000).check(&book),
            Err(Error::InvalidConstantInvariant(_))
        ));
        assert!(matches!(
            SumInvariant::new(["STAKING", "MISSING"], 1_000_000).check(&book),
            Err(Error::UnresolvedDependency { .. })
        ));
    }
}
