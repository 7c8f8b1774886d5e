//! Tables printed to stdout.

use comfy_table::{Table, presets::UTF8_FULL};
use helix_deploy::{NetworkRegistry, RecordSummary, RunResult, StepReport, StepState};

pub fn run_table(result: &RunResult) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["#", "Step", "Action", "State", "Nonce", "Tx", "Outcome"]);

    for step in &result.steps {
        table.add_row(vec![
            step.index.to_string(),
            step.label.clone(),
            step.action.clone(),
            step.state.to_string(),
            step.nonce.map(|n| n.to_string()).unwrap_or_default(),
            step.tx_hash.map(|h| h.to_string()).unwrap_or_default(),
            outcome(step),
        ]);
    }

    table
}

fn outcome(step: &StepReport) -> String {
    match step.state {
        StepState::Confirmed => step
            .address
            .map(|a| format!("deployed at {a}"))
            .unwrap_or_else(|| "ok".to_string()),
        StepState::Failed => step
            .failure
            .as_ref()
            .map(|f| match &f.revert_reason {
                Some(reason) => format!("{}: {reason}", f.kind),
                None => format!("{}: {}", f.kind, f.message),
            })
            .unwrap_or_default(),
        StepState::Pending | StepState::Submitted => String::new(),
    }
}

pub fn networks_table(registry: &NetworkRegistry) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Name", "Chain id", "RPC", "Gas price", "Gas limit"]);

    for (name, config) in &registry.networks {
        table.add_row(vec![
            name.clone(),
            config.chain_id.to_string(),
            config.rpc_url.clone(),
            config.gas_price.to_string(),
            config.gas_limit.to_string(),
        ]);
    }

    table
}

pub fn history_table(records: &[RecordSummary]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Recorded",
        "Recipe",
        "Status",
        "Confirmed",
        "Last confirmed",
        "File",
    ]);

    for record in records {
        table.add_row(vec![
            record.recorded_at.clone(),
            record.recipe.clone(),
            record.status.to_string(),
            format!("{}/{}", record.confirmed, record.total),
            record.last_confirmed.clone().unwrap_or_default(),
            record.path.display().to_string(),
        ]);
    }

    table
}
