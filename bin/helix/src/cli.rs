use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{Parser, Subcommand};
use helix_deploy::{Recipe, recipes};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "helix")]
#[command(
    author,
    version,
    about = "Deploy and wire the Helix contracts, one recipe at a time"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "HELIX_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// The network to run against, by registry name or chain id.
    #[arg(short, long, global = true, env = "HELIX_NETWORK")]
    pub network: Option<String>,

    /// Path to the registry file (networks, addresses, constants).
    ///
    /// Defaults to `Helix.toml` in the working directory.
    #[arg(long, alias = "conf", global = true, env = "HELIX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the compiled Hardhat artifacts.
    #[arg(long, global = true)]
    pub artifacts: Option<PathBuf>,

    /// Directory where run records are written.
    #[arg(long, global = true)]
    pub output: Option<PathBuf>,

    /// Confirmation timeout in seconds, for every step of the run.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Record of an aborted run of the same recipe: run only the steps after
    /// its last confirmed one.
    #[arg(long, global = true)]
    pub resume: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Deploy the MasterChef and make it a HelixToken minter.
    DeployMasterChef,

    /// Register an LP token as a MasterChef pool.
    AddLpPool {
        /// Allocation points of the new pool.
        #[arg(long)]
        alloc_point: u64,

        /// Address of the LP token.
        #[arg(long)]
        lp_token: Address,

        /// Update every pool before adding this one.
        #[arg(long, default_value_t = false)]
        with_update: bool,
    },

    /// Deploy the AuraNFT bridge and wire it to AuraNFT.
    DeployNftBridge,

    /// Deploy the TokenTools helper contract.
    DeployTokenTools,

    /// Deploy a PaymentSplitter.
    DeployPaymentSplitter {
        /// A payee address; repeat once per payee.
        #[arg(long = "payee", required = true)]
        payees: Vec<Address>,

        /// Shares of the payee at the same position; repeat once per payee.
        #[arg(long = "shares", required = true)]
        shares: Vec<u64>,
    },

    /// (Re)connect the HelixNFT chef to HelixNFT and the swap rewards.
    ConnectHelixChefNft,

    /// Grant the minter role on a token.
    AddMinter {
        #[arg(long)]
        token: Address,

        #[arg(long)]
        minter: Address,
    },

    /// Register a bridger on an AuraNFT bridge.
    AddBridger {
        #[arg(long)]
        bridge: Address,

        #[arg(long)]
        bridger: Address,
    },

    /// List the networks of the registry.
    Networks,

    /// List the run records of the selected network.
    History,
}

impl Command {
    /// The recipe this subcommand runs, if any.
    pub fn recipe(&self) -> Option<helix_deploy::Result<Recipe>> {
        let recipe = match self {
            Self::DeployMasterChef => recipes::deploy_master_chef(),
            Self::AddLpPool {
                alloc_point,
                lp_token,
                with_update,
            } => recipes::add_lp_pool(*alloc_point, *lp_token, *with_update),
            Self::DeployNftBridge => recipes::deploy_nft_bridge(),
            Self::DeployTokenTools => recipes::deploy_token_tools(),
            Self::DeployPaymentSplitter { payees, shares } => {
                recipes::deploy_payment_splitter(payees, shares)
            }
            Self::ConnectHelixChefNft => recipes::connect_helix_chef_nft(),
            Self::AddMinter { token, minter } => recipes::add_minter(*token, *minter),
            Self::AddBridger { bridge, bridger } => recipes::add_bridger(*bridge, *bridger),
            Self::Networks | Self::History => return None,
        };
        Some(recipe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add_lp_pool() {
        let cli = Cli::try_parse_from([
            "helix",
            "--network",
            "bsc_testnet",
            "add-lp-pool",
            "--alloc-point",
            "822",
            "--lp-token",
            "0x56451b5Fb2A9bBe47eC6717CC6d77C3558Fe58cA",
            "--with-update",
        ])
        .unwrap();

        assert_eq!(cli.network.as_deref(), Some("bsc_testnet"));
        let recipe = cli.command.recipe().unwrap().unwrap();
        assert_eq!(recipe.name(), "add-lp-pool");
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["helix", "deploy-master-chef", "--network", "97", "--timeout", "30"])
                .unwrap();
        assert_eq!(cli.network.as_deref(), Some("97"));
        assert_eq!(cli.timeout, Some(30));
    }

    #[test]
    fn test_parse_payment_splitter_payees() {
        let cli = Cli::try_parse_from([
            "helix",
            "deploy-payment-splitter",
            "--payee",
            "0x59201fb8cb2D61118B280c8542127331DD141654",
            "--shares",
            "70",
            "--payee",
            "0xC232Ce0b83b3B320CdA3ec78c57A0D101A4Ac5cD",
            "--shares",
            "30",
        ])
        .unwrap();

        let Command::DeployPaymentSplitter { payees, shares } = &cli.command else {
            panic!("expected deploy-payment-splitter");
        };
        assert_eq!(payees.len(), 2);
        assert_eq!(shares, &vec![70, 30]);
        assert_eq!(cli.command.recipe().unwrap().unwrap().name(), "deploy-payment-splitter");
    }

    #[test]
    fn test_resume_flag() {
        let cli = Cli::try_parse_from([
            "helix",
            "deploy-master-chef",
            "--resume",
            "runs/97/deploy-master-chef-20261019T120000000Z.json",
        ])
        .unwrap();
        assert!(cli.resume.is_some());
    }

    #[test]
    fn test_listing_commands_have_no_recipe() {
        let cli = Cli::try_parse_from(["helix", "networks"]).unwrap();
        assert!(cli.command.recipe().is_none());
    }

    #[test]
    fn test_invalid_address_is_rejected() {
        assert!(
            Cli::try_parse_from(["helix", "add-minter", "--token", "0x12", "--minter", "0x34"])
                .is_err()
        );
    }
}
