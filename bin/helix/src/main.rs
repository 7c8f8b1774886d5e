//! helix deploys and wires the Helix contract suite across networks.

mod cli;
mod config;
mod output;

use alloy_signer_local::{MnemonicBuilder, PrivateKeySigner, coins_bip39::English};
use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Command};
use config::Settings;
use helix_deploy::{
    AccountLock, ArtifactStore, DeploymentStep, Recipe, RecipeRunner, RpcClient, RunRecord,
    TxSigner, cancellation, record,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let settings = Settings::load(cli.config.as_deref())?.with_cli(&cli);

    match &cli.command {
        Command::Networks => {
            println!("{}", output::networks_table(&settings.registry));
            Ok(())
        }
        Command::History => {
            let id = settings.registry.lookup(selected_network(&cli)?)?;
            let records = record::list(&settings.output_dir, id)?;
            println!("{}", output::history_table(&records));
            Ok(())
        }
        command => {
            let recipe = command
                .recipe()
                .context("Subcommand does not run a recipe")??;
            run(&cli, &settings, recipe).await
        }
    }
}

fn selected_network(cli: &Cli) -> Result<&str> {
    cli.network
        .as_deref()
        .context("No network selected, pass --network or set HELIX_NETWORK")
}

/// Read the signing key from `PRIVATE_KEY`, falling back to `MNEMONIC`.
fn signer_from_env() -> Result<PrivateKeySigner> {
    if let Ok(key) = std::env::var("PRIVATE_KEY") {
        return key.trim().parse().context("PRIVATE_KEY is not a valid private key");
    }

    let phrase = std::env::var("MNEMONIC").context("Set PRIVATE_KEY or MNEMONIC to sign transactions")?;
    MnemonicBuilder::<English>::default()
        .phrase(phrase.trim())
        .index(0u32)?
        .build()
        .context("MNEMONIC is not a valid mnemonic")
}

async fn run(cli: &Cli, settings: &Settings, recipe: Recipe) -> Result<()> {
    let id = settings.registry.lookup(selected_network(cli)?)?;
    let network = settings.registry.resolve(id)?;
    if network.endpoint.is_empty() {
        anyhow::bail!(
            "Network `{}` has no RPC endpoint, set HELIX_NETWORKS__{}__RPC_URL",
            network.name,
            network.name.to_uppercase()
        );
    }

    let recipe = match &cli.resume {
        Some(path) => {
            let previous = RunRecord::load_from_file(path)?;
            if previous.result.network != id {
                anyhow::bail!(
                    "{} was recorded on network {}, not {id}",
                    path.display(),
                    previous.result.network
                );
            }
            let rest = recipe.resume(&previous.result)?;
            tracing::info!(
                record = %path.display(),
                after = previous.result.last_confirmed().unwrap_or("nothing"),
                steps = rest.steps().len(),
                "Resuming aborted run"
            );
            rest
        }
        None => recipe,
    };

    let signer = signer_from_env()?;
    let account = TxSigner::address(&signer);

    let needs_artifacts = recipe
        .steps()
        .iter()
        .any(|step| matches!(step, DeploymentStep::DeployUnit { .. }));
    let artifacts = if needs_artifacts {
        ArtifactStore::load_dir(&settings.artifacts_dir)?
    } else {
        ArtifactStore::new()
    };

    tracing::info!(
        recipe = recipe.name(),
        network = %network.name,
        chain_id = %id,
        %account,
        "Preparing recipe run..."
    );

    let client = RpcClient::connect(&network.endpoint, id).await?;
    let lock = AccountLock::acquire(&settings.lock_dir, id, account)?;

    let (cancel, token) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl+C received, stopping before the next transaction...");
            cancel.cancel();
        }
    });

    let mut runner =
        RecipeRunner::new(&client, &signer, &network, &artifacts, lock)?.with_cancellation(token);
    if let Some(timeout) = settings.confirmation_timeout() {
        runner = runner.with_confirmation_timeout(timeout);
    }

    let result = runner.run(&recipe).await?;
    let path = RunRecord::new(result.clone()).save(&settings.output_dir)?;

    println!("{}", output::run_table(&result));
    tracing::info!(record = %path.display(), status = %result.status, "Run recorded");

    if let Some(abort) = &result.abort {
        anyhow::bail!(
            "Recipe `{}` aborted at step {} ({}): {}",
            result.recipe,
            abort.step,
            abort.kind,
            abort.message
        );
    }

    Ok(())
}
