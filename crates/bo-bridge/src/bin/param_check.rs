use anyhow::Context;
use bo_bridge::{config_error, load_parameters_with_report, BoptParams};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env("BOPT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: bo-param-check <config.json>")?;

    let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let document: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("parsing {path}"))?;
    let config = document
        .as_object()
        .ok_or_else(|| config_error!("{path}: top-level value must be an object"))?;

    let (params, report) = load_parameters_with_report(config, BoptParams::default())?;
    tracing::info!(
        "{} fields applied, {} defaults kept",
        report.applied.len(),
        report.missing.len()
    );

    println!("{}", serde_json::to_string_pretty(&params)?);
    Ok(())
}
