use anyhow::Result;
use serde::Serialize;

use super::{open_audit_store, ListArgs};
use crate::cli::display::{colorize_level, list_table, output, render_list, truncate, CommandOutput};
use crate::domain::models::{AlertRecord, Config};

#[derive(Debug, Serialize)]
pub struct AlertList {
    pub alerts: Vec<AlertRecord>,
}

impl CommandOutput for AlertList {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "time", "level", "message"]);
        for alert in &self.alerts {
            table.add_row(vec![
                alert.id.to_string(),
                alert.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                colorize_level(alert.level).to_string(),
                truncate(&alert.message, 80),
            ]);
        }
        render_list("alert", &table, self.alerts.len())
    }
}

pub async fn execute(args: ListArgs, config: &Config, json: bool) -> Result<()> {
    let store = open_audit_store(config).await?;
    let alerts = store.recent_alerts(args.limit).await?;
    output(&AlertList { alerts }, json);
    Ok(())
}
