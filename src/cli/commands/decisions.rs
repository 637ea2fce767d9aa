use anyhow::Result;
use serde::Serialize;

use super::{open_audit_store, ListArgs};
use crate::cli::display::{colorize_decision, list_table, output, render_list, CommandOutput};
use crate::domain::models::{Config, GatekeeperLogRecord};

#[derive(Debug, Serialize)]
pub struct DecisionList {
    pub decisions: Vec<GatekeeperLogRecord>,
}

impl CommandOutput for DecisionList {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "time", "user", "status", "remaining"]);
        for decision in &self.decisions {
            table.add_row(vec![
                decision.id.to_string(),
                decision.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                decision.user_id.clone(),
                colorize_decision(decision.status).to_string(),
                decision
                    .remaining
                    .map_or_else(|| "-".to_string(), |r| r.to_string()),
            ]);
        }
        render_list("decision", &table, self.decisions.len())
    }
}

pub async fn execute(args: ListArgs, config: &Config, json: bool) -> Result<()> {
    let store = open_audit_store(config).await?;
    let decisions = store.recent_gatekeeper_logs(args.limit).await?;
    output(&DecisionList { decisions }, json);
    Ok(())
}
