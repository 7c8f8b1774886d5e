//! ABI encoding of constructor arguments and wiring calls.

use alloy_core::{
    dyn_abi::{DynSolType, DynSolValue, Specifier},
    json_abi::{Function, Param},
    primitives::{Address, Bytes, FixedBytes, U256},
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A concrete argument value, before it is fitted to a parameter type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum ArgValue {
    Uint(U256),
    Address(Address),
    Bool(bool),
    String(String),
    Bytes(Bytes),
    Array(Vec<ArgValue>),
}

impl ArgValue {
    pub fn uint(v: u64) -> Self {
        Self::Uint(U256::from(v))
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            Self::Address(addr) => Some(*addr),
            _ => None,
        }
    }

    /// Fit this value to the declared Solidity type.
    pub fn coerce(&self, ty: &DynSolType) -> Result<DynSolValue> {
        let mismatch = || Error::invalid_arguments(format!("cannot pass {self} as `{ty}`"));

        let value = match (self, ty) {
            (Self::Uint(v), DynSolType::Uint(bits)) => {
                if v.bit_len() > *bits {
                    return Err(Error::invalid_arguments(format!(
                        "{v} does not fit in `uint{bits}`"
                    )));
                }
                DynSolValue::Uint(*v, *bits)
            }
            (Self::Address(addr), DynSolType::Address) => DynSolValue::Address(*addr),
            (Self::Bool(b), DynSolType::Bool) => DynSolValue::Bool(*b),
            (Self::String(s), DynSolType::String) => DynSolValue::String(s.clone()),
            (Self::Bytes(b), DynSolType::Bytes) => DynSolValue::Bytes(b.to_vec()),
            (Self::Bytes(b), DynSolType::FixedBytes(size)) if b.len() == *size => {
                DynSolValue::FixedBytes(FixedBytes::right_padding_from(b), *size)
            }
            (Self::Array(items), DynSolType::Array(inner)) => DynSolValue::Array(
                items
                    .iter()
                    .map(|item| item.coerce(inner))
                    .collect::<Result<_>>()?,
            ),
            (Self::Array(items), DynSolType::FixedArray(inner, len)) if items.len() == *len => {
                DynSolValue::FixedArray(
                    items
                        .iter()
                        .map(|item| item.coerce(inner))
                        .collect::<Result<_>>()?,
                )
            }
            _ => return Err(mismatch()),
        };

        Ok(value)
    }
}

impl std::fmt::Display for ArgValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uint(v) => write!(f, "{v}"),
            Self::Address(a) => write!(f, "{a}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Bytes(b) => write!(f, "{b}"),
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Encode `args` against a parameter list, without selector.
pub fn encode_params(params: &[Param], args: &[ArgValue]) -> Result<Vec<u8>> {
    if params.len() != args.len() {
        return Err(Error::invalid_arguments(format!(
            "expected {} arguments, got {}",
            params.len(),
            args.len()
        )));
    }

    let values = params
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            let ty = param
                .resolve()
                .map_err(|e| Error::invalid_arguments(format!("parameter `{}`: {e}", param.name)))?;
            arg.coerce(&ty)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DynSolValue::Tuple(values).abi_encode_params())
}

/// Parse a Solidity method signature such as `addMinter(address)`.
pub fn parse_method(signature: &str) -> Result<Function> {
    Function::parse(signature)
        .map_err(|e| Error::invalid_arguments(format!("invalid method signature `{signature}`: {e}")))
}

/// Selector followed by the encoded arguments.
pub fn encode_call(signature: &str, args: &[ArgValue]) -> Result<Bytes> {
    let function = parse_method(signature)?;
    let mut data = function.selector().to_vec();
    data.extend(encode_params(&function.inputs, args)?);
    Ok(data.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::{address, hex};

    #[test]
    fn test_encode_add_minter() {
        let minter = address!("0x56451b5Fb2A9bBe47eC6717CC6d77C3558Fe58cA");
        let data = encode_call("addMinter(address)", &[ArgValue::Address(minter)]).unwrap();

        // keccak256("addMinter(address)")[..4]
        assert_eq!(hex::encode(&data[..4]), "983b2d56");
        assert_eq!(data.len(), 4 + 32);
        assert_eq!(&data[16..], minter.as_slice());
    }

    #[test]
    fn test_encode_pool_registration() {
        let lp = address!("0x1A6a1fcb7E6457Dd8a75c67829745B9b6b34e28f");
        let data = encode_call(
            "add(uint256,address,bool)",
            &[ArgValue::uint(822), ArgValue::Address(lp), ArgValue::Bool(true)],
        )
        .unwrap();

        assert_eq!(data.len(), 4 + 3 * 32);
        assert_eq!(U256::from_be_slice(&data[4..36]), U256::from(822u64));
        assert_eq!(data[4 + 3 * 32 - 1], 1);
    }

    #[test]
    fn test_arity_mismatch() {
        let err = encode_call("addMinter(address)", &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidArguments(_)));
    }

    #[test]
    fn test_type_mismatch() {
        let err = encode_call("addMinter(address)", &[ArgValue::uint(1)]).unwrap_err();
        assert!(matches!(err, Error::InvalidArguments(_)));
    }

    #[test]
    fn test_uint_width_is_checked() {
        assert!(ArgValue::uint(255).coerce(&DynSolType::Uint(8)).is_ok());
        assert!(ArgValue::uint(256).coerce(&DynSolType::Uint(8)).is_err());
    }

    #[test]
    fn test_malformed_signature() {
        assert!(matches!(
            parse_method("addMinter(address"),
            Err(Error::InvalidArguments(_))
        ));
    }
}
