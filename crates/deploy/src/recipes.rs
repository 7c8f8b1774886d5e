//! Built-in recipes for the Helix contract suite.

use alloy_core::primitives::Address;

use crate::{
    abi::ArgValue,
    error::{Error, Result},
    recipe::{Arg, Recipe},
};

/// Gas limit of every wiring call in the catalog.
pub const WIRING_GAS_LIMIT: u64 = 3_000_000;

/// Total that the MasterChef staking and dev percentages must add up to.
pub const MASTERCHEF_PERCENT_TOTAL: u64 = 1_000_000;

/// Deploy the MasterChef and let it mint HelixToken rewards.
pub fn deploy_master_chef() -> Result<Recipe> {
    Recipe::builder("deploy-master-chef")
        .require_sum(
            ["MASTERCHEF_STAKING_PERCENT", "MASTERCHEF_DEV_PERCENT"],
            MASTERCHEF_PERCENT_TOTAL,
        )
        .deploy(
            "chef",
            "MasterChef",
            vec![
                Arg::contract("helixToken"),
                Arg::contract("masterChefDeveloper"),
                Arg::constant("MASTERCHEF_HELIX_TOKEN_REWARD_PER_BLOCK"),
                Arg::constant("MASTERCHEF_START_BLOCK"),
                Arg::constant("MASTERCHEF_STAKING_PERCENT"),
                Arg::constant("MASTERCHEF_DEV_PERCENT"),
                Arg::contract("referralRegister"),
            ],
        )
        .call(
            "add-chef-minter",
            Arg::contract("helixToken"),
            "addMinter(address)",
            vec![Arg::output("chef")],
        )
        .gas_limit(WIRING_GAS_LIMIT)
        .retry_safe()
        .build()
}

/// Register an LP token as a new MasterChef pool.
///
/// Running it twice registers the token twice, so it is not retry-safe.
pub fn add_lp_pool(alloc_point: u64, lp_token: Address, with_update: bool) -> Result<Recipe> {
    Recipe::builder("add-lp-pool")
        .call(
            "add-pool",
            Arg::contract("masterChef"),
            "add(uint256,address,bool)",
            vec![
                Arg::uint(alloc_point),
                Arg::address(lp_token),
                Arg::bool(with_update),
            ],
        )
        .gas_limit(WIRING_GAS_LIMIT)
        .build()
}

/// Deploy the AuraNFT bridge, register the deployer as bridger and let the
/// bridge mint AuraNFTs.
pub fn deploy_nft_bridge() -> Result<Recipe> {
    Recipe::builder("deploy-nft-bridge")
        .deploy("bridge", "AuraNFTBridge", vec![Arg::contract("auraNFT")])
        .call(
            "add-bridger",
            Arg::output("bridge"),
            "addBridger(address)",
            vec![Arg::Signer],
        )
        .gas_limit(WIRING_GAS_LIMIT)
        .retry_safe()
        .call(
            "add-bridge-minter",
            Arg::contract("auraNFT"),
            "addMinter(address)",
            vec![Arg::output("bridge")],
        )
        .gas_limit(WIRING_GAS_LIMIT)
        .retry_safe()
        .build()
}

pub fn deploy_token_tools() -> Result<Recipe> {
    Recipe::builder("deploy-token-tools")
        .deploy("token-tools", "TokenTools", vec![])
        .build()
}

/// Deploy a PaymentSplitter sharing incoming payments between `payees`
/// in proportion to `shares`.
///
/// The constructor rejects empty, mismatched or zero-share input on-chain;
/// the same checks run here so a bad split never costs a transaction.
pub fn deploy_payment_splitter(payees: &[Address], shares: &[u64]) -> Result<Recipe> {
    if payees.is_empty() {
        return Err(Error::invalid_arguments("payment splitter needs at least one payee"));
    }
    if payees.len() != shares.len() {
        return Err(Error::invalid_arguments(format!(
            "{} payees but {} shares",
            payees.len(),
            shares.len()
        )));
    }
    if let Some(position) = shares.iter().position(|&share| share == 0) {
        return Err(Error::invalid_arguments(format!(
            "payee {} has zero shares",
            payees[position]
        )));
    }

    let payees = payees.iter().copied().map(ArgValue::Address).collect();
    let shares = shares.iter().copied().map(ArgValue::uint).collect();

    Recipe::builder("deploy-payment-splitter")
        .deploy(
            "splitter",
            "PaymentSplitter",
            vec![
                Arg::Literal(ArgValue::Array(payees)),
                Arg::Literal(ArgValue::Array(shares)),
            ],
        )
        .build()
}

/// (Re)connect the NFT chef: HelixNFT lets it stake, and it accepts
/// accruals from the swap rewards contract.
pub fn connect_helix_chef_nft() -> Result<Recipe> {
    Recipe::builder("connect-helix-chef-nft")
        .call(
            "add-chef-staker",
            Arg::contract("helixNFT"),
            "addStaker(address)",
            vec![Arg::contract("helixNFTChef")],
        )
        .gas_limit(WIRING_GAS_LIMIT)
        .retry_safe()
        .call(
            "add-swap-rewards-accruer",
            Arg::contract("helixNFTChef"),
            "addAccruer(address)",
            vec![Arg::contract("swapRewards")],
        )
        .gas_limit(WIRING_GAS_LIMIT)
        .retry_safe()
        .build()
}

/// Grant `minter` the minter role on `token`.
pub fn add_minter(token: Address, minter: Address) -> Result<Recipe> {
    Recipe::builder("add-minter")
        .call(
            "add-minter",
            Arg::address(token),
            "addMinter(address)",
            vec![Arg::address(minter)],
        )
        .gas_limit(WIRING_GAS_LIMIT)
        .retry_safe()
        .build()
}

/// Register `bridger` on `bridge`.
pub fn add_bridger(bridge: Address, bridger: Address) -> Result<Recipe> {
    Recipe::builder("add-bridger")
        .call(
            "add-bridger",
            Arg::address(bridge),
            "addBridger(address)",
            vec![Arg::address(bridger)],
        )
        .gas_limit(WIRING_GAS_LIMIT)
        .retry_safe()
        .build()
}
