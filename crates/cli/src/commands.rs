use std::io::Write;

use anyhow::Context;

use demandflow_forecast::{
    CategoryEncoding, ENCODING_VERSION, LinearDemandModel, PlanningConfig, PlanningJob, PlanningOverrides,
    ReorderRecommendation, read_recommendations_path, write_recommendations_path,
};
use demandflow_inventory::{InventoryTable, SyntheticHistory};

use crate::{ForecastArgs, GenerateArgs, ShowArgs, ShowFilter};

pub const HISTORY_FILE: &str = "inventory.csv";
pub const ENCODING_FILE: &str = "encoding.json";
pub const MODEL_FILE: &str = "model.json";

pub fn generate(args: &GenerateArgs, out: &mut impl Write) -> anyhow::Result<()> {
    let history = SyntheticHistory::default()
        .with_skus(args.skus)
        .with_months(args.months)
        .with_start(args.start)
        .with_seed(args.seed)
        .generate()?;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;

    let history_path = args.out_dir.join(HISTORY_FILE);
    let file = std::fs::File::create(&history_path)
        .with_context(|| format!("failed to create {}", history_path.display()))?;
    InventoryTable::from_records(&history).write_to(std::io::BufWriter::new(file))?;

    let encoding = CategoryEncoding::fit(ENCODING_VERSION, &history);
    encoding.save(&args.out_dir.join(ENCODING_FILE))?;
    LinearDemandModel::persistence()
        .with_encoding_version(encoding.version)
        .save(&args.out_dir.join(MODEL_FILE))?;

    tracing::info!(
        records = history.len(),
        skus = args.skus,
        months = args.months,
        out_dir = %args.out_dir.display(),
        "synthetic history written"
    );
    writeln!(
        out,
        "wrote {} records for {} SKUs to {}",
        history.len(),
        args.skus,
        args.out_dir.display()
    )?;
    Ok(())
}

pub fn forecast(args: &ForecastArgs, out: &mut impl Write) -> anyhow::Result<()> {
    let overrides = PlanningOverrides {
        threshold_fraction: args.threshold_fraction,
        horizon_months: args.horizon_months,
        lead_time_buffer_days: args.lead_time_buffer_days,
    };
    let config = PlanningConfig::resolve(args.config.as_deref(), overrides).context("invalid planning config")?;

    let model = LinearDemandModel::load(&args.model).context("failed to load model")?;
    let encoding = CategoryEncoding::load(&args.encoding).context("failed to load encoding")?;
    let history = InventoryTable::from_path(&args.input)
        .and_then(|table| table.to_records())
        .with_context(|| format!("failed to load inventory history from {}", args.input.display()))?;

    let as_of = match args.as_of {
        Some(d) => d,
        None => history
            .iter()
            .map(|r| r.date)
            .max()
            .unwrap_or_else(|| chrono::Utc::now().date_naive()),
    };

    let outcome = PlanningJob::new(&model, &encoding, &history, as_of)
        .with_config(config)
        .run()?;

    write_recommendations_path(&args.output, &outcome.recommendations)?;
    if let Some(path) = &args.summary {
        outcome.summary.save(path)?;
    }

    let s = &outcome.summary;
    writeln!(out, "run {}", s.run_id)?;
    writeln!(
        out,
        "{} SKUs, {} forecast rows, {} reorders (total quantity {:.2})",
        s.skus, s.forecast_rows, s.reorders, s.total_reorder_quantity
    )?;
    writeln!(out, "forecast written to {}", args.output.display())?;
    Ok(())
}

pub fn show(args: &ShowArgs, out: &mut impl Write) -> anyhow::Result<()> {
    let recs = read_recommendations_path(&args.artifact)?;
    let shown: Vec<&ReorderRecommendation> = recs
        .iter()
        .filter(|r| args.filter.keeps(r.reorder_needed))
        .collect();

    writeln!(
        out,
        "{:<12} {:<7} {:>10} {:>10} {:>10} {:>10}  {:<15} {:<15}",
        "SKU", "Month", "Demand", "Balance", "Threshold", "Quantity", "Order Date", "Place By"
    )?;
    for r in &shown {
        writeln!(
            out,
            "{:<12} {:<7} {:>10.2} {:>10.2} {:>10.2} {:>10.2}  {:<15} {:<15}",
            r.sku.as_str(),
            r.target.to_string(),
            r.predicted_demand,
            r.stock_balance,
            r.reorder_threshold,
            r.reorder_quantity,
            r.recommended_order_date.to_string(),
            r.place_order_by.to_string()
        )?;
    }
    writeln!(out, "{} of {} rows", shown.len(), recs.len())?;
    Ok(())
}
