//! `sieved presets` - read the preset store.

use anyhow::{Context as _, Result};
use colored::Colorize;
use sieve_core::{JsonPolicyStore, PolicyStore, PresetResponse};
use tabled::{settings::Style, Table, Tabled};

use super::Context;
use crate::cli::args::PresetsCommand;

#[derive(Tabled)]
struct PresetRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Enabled")]
    enabled: bool,
    #[tabled(rename = "Offset")]
    offset: i32,
    #[tabled(rename = "Blocked")]
    blocked: usize,
    #[tabled(rename = "Scheduled")]
    scheduled: usize,
}

impl From<&PresetResponse> for PresetRow {
    fn from(preset: &PresetResponse) -> Self {
        let count = |status: &str| {
            preset
                .fields
                .categories
                .iter()
                .filter(|c| c.status == status)
                .count()
        };
        Self {
            id: preset.id.clone(),
            name: preset.fields.name.clone(),
            enabled: preset.fields.enabled,
            offset: preset.fields.utc_offset,
            blocked: count("blocked"),
            scheduled: count("active"),
        }
    }
}

pub async fn execute(ctx: &Context, command: PresetsCommand) -> Result<()> {
    let path = &ctx.config.store.path;
    let store = JsonPolicyStore::open(path.clone())
        .await
        .with_context(|| format!("opening preset store {}", path.display()))?;

    match command {
        PresetsCommand::List { json } => {
            let mut presets: Vec<PresetResponse> = store
                .get_all_configs()
                .await?
                .iter()
                .map(PresetResponse::from)
                .collect();
            presets.sort_by(|a, b| a.id.cmp(&b.id));

            if json {
                println!("{}", serde_json::to_string_pretty(&presets)?);
            } else if presets.is_empty() {
                println!("{}", format!("No presets in {}", path.display()).dimmed());
            } else {
                let rows: Vec<PresetRow> = presets.iter().map(PresetRow::from).collect();
                println!("{}", Table::new(&rows).with(Style::rounded()));
            }
        }
        PresetsCommand::Show { id } => {
            let settings = store.get_config(&id).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&PresetResponse::from(&settings))?
            );
        }
    }
    Ok(())
}
