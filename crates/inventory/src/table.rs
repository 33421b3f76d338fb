//! Tabular inventory source (CSV) with column validation.
//!
//! The table is kept as raw strings so that column presence can be checked
//! before any row is interpreted. `to_records` is the only place source cells
//! become typed [`InventoryRecord`]s.

use std::io::{Read, Write};
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};

use demandflow_core::{ForecastError, ForecastResult, Sku};

use crate::record::InventoryRecord;

/// Source column names.
pub mod columns {
    pub const SKU: &str = "SKU";
    pub const DATE: &str = "Date";
    pub const STOCK_IN: &str = "Stock In";
    pub const STOCK_OUT: &str = "Stock Out";
    pub const STOCK_BALANCE: &str = "Stock Balance";
    pub const PROMOTION: &str = "Promotion";
    pub const HOLIDAY: &str = "Holiday";
    pub const SEASON: &str = "Season";
    pub const LEAD_TIME: &str = "Lead Time";
    pub const MANUFACTURING_DATE: &str = "Manufacturing Date";
    pub const EXPIRATION_DATE: &str = "Expiration Date";
    pub const ORDER_DATE: &str = "Order Date";
    pub const DELIVERY_DATE: &str = "Delivery Date";

    /// Columns every source table must carry.
    pub const REQUIRED: [&str; 7] = [SKU, DATE, STOCK_IN, STOCK_OUT, PROMOTION, HOLIDAY, SEASON];
}

/// Raw inventory table: a header row plus string cells.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InventoryTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Where a record's lead time comes from.
enum LeadTimeSource {
    Column(usize),
    OrderToDelivery { order: usize, delivery: usize },
}

impl InventoryTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Read a CSV table with a header row.
    pub fn from_reader<R: Read>(reader: R) -> ForecastResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| ForecastError::artifact(format!("failed to read headers: {e}")))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (idx, result) in csv_reader.records().enumerate() {
            let record = result.map_err(|e| {
                ForecastError::artifact(format!("CSV parse error at line {}: {e}", idx + 2))
            })?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn from_path(path: &Path) -> ForecastResult<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| ForecastError::artifact(format!("failed to open {}: {e}", path.display())))?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Build a table from typed records (used by the synthetic generator).
    pub fn from_records(records: &[InventoryRecord]) -> Self {
        let headers = [
            columns::SKU,
            columns::DATE,
            columns::STOCK_IN,
            columns::STOCK_OUT,
            columns::STOCK_BALANCE,
            columns::PROMOTION,
            columns::HOLIDAY,
            columns::SEASON,
            columns::LEAD_TIME,
            columns::EXPIRATION_DATE,
        ]
        .iter()
        .map(|h| h.to_string())
        .collect();

        let rows = records
            .iter()
            .map(|r| {
                vec![
                    r.sku.to_string(),
                    r.date.to_string(),
                    format_number(r.stock_in),
                    format_number(r.stock_out),
                    format_number(r.stock_balance()),
                    u8::from(r.promotion).to_string(),
                    u8::from(r.holiday).to_string(),
                    r.season.clone(),
                    format_number(r.lead_time_days),
                    r.expiration_date.map(|d| d.to_string()).unwrap_or_default(),
                ]
            })
            .collect();

        Self { headers, rows }
    }

    pub fn write_to<W: Write>(&self, writer: W) -> ForecastResult<()> {
        let mut w = csv::Writer::from_writer(writer);
        w.write_record(&self.headers)
            .map_err(|e| ForecastError::artifact(e.to_string()))?;
        for row in &self.rows {
            w.write_record(row)
                .map_err(|e| ForecastError::artifact(e.to_string()))?;
        }
        w.flush().map_err(|e| ForecastError::artifact(e.to_string()))
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a required column; `MissingColumn` when absent.
    pub fn column(&self, name: &str) -> ForecastResult<usize> {
        self.optional_column(name)
            .ok_or_else(|| ForecastError::missing_column(name))
    }

    pub fn optional_column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Interpret every row as an [`InventoryRecord`].
    ///
    /// Column presence is checked before any row is parsed, so a table
    /// missing a required column fails with `MissingColumn` even when empty.
    pub fn to_records(&self) -> ForecastResult<Vec<InventoryRecord>> {
        let sku = self.column(columns::SKU)?;
        let date = self.column(columns::DATE)?;
        let stock_in = self.column(columns::STOCK_IN)?;
        let stock_out = self.column(columns::STOCK_OUT)?;
        let promotion = self.column(columns::PROMOTION)?;
        let holiday = self.column(columns::HOLIDAY)?;
        let season = self.column(columns::SEASON)?;
        let lead_time = self.lead_time_source()?;

        let manufacturing = self.optional_column(columns::MANUFACTURING_DATE);
        let expiration = self.optional_column(columns::EXPIRATION_DATE);
        let order = self.optional_column(columns::ORDER_DATE);
        let delivery = self.optional_column(columns::DELIVERY_DATE);

        self.rows
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                let line = idx + 1;
                let cell = |col: usize| row.get(col).map(String::as_str).unwrap_or("");
                let named = |col: usize| self.headers[col].as_str();

                let sku_raw = cell(sku);
                if sku_raw.is_empty() {
                    return Err(ForecastError::invalid_value(columns::SKU, line, sku_raw));
                }

                let order_date = parse_optional_date(order, &cell, &named, line)?;
                let delivery_date = parse_optional_date(delivery, &cell, &named, line)?;

                // Lead times are never negative; delivery before order is bad data.
                let lead_time_days = match lead_time {
                    LeadTimeSource::Column(col) => {
                        let days = parse_number(cell(col), named(col), line)?;
                        if days < 0.0 {
                            return Err(ForecastError::invalid_value(named(col), line, cell(col)));
                        }
                        days
                    }
                    LeadTimeSource::OrderToDelivery { order, delivery } => {
                        let placed = parse_date(cell(order), named(order), line)?;
                        let received = parse_date(cell(delivery), named(delivery), line)?;
                        if received < placed {
                            return Err(ForecastError::invalid_value(named(delivery), line, cell(delivery)));
                        }
                        received.signed_duration_since(placed).num_days() as f64
                    }
                };

                Ok(InventoryRecord {
                    sku: Sku::new(sku_raw),
                    date: parse_date(cell(date), columns::DATE, line)?,
                    stock_in: parse_number(cell(stock_in), columns::STOCK_IN, line)?,
                    stock_out: parse_number(cell(stock_out), columns::STOCK_OUT, line)?,
                    promotion: parse_flag(cell(promotion), columns::PROMOTION, line)?,
                    holiday: parse_flag(cell(holiday), columns::HOLIDAY, line)?,
                    season: cell(season).to_string(),
                    lead_time_days,
                    manufacturing_date: parse_optional_date(manufacturing, &cell, &named, line)?,
                    expiration_date: parse_optional_date(expiration, &cell, &named, line)?,
                    order_date,
                    delivery_date,
                })
            })
            .collect()
    }

    fn lead_time_source(&self) -> ForecastResult<LeadTimeSource> {
        if let Some(col) = self.optional_column(columns::LEAD_TIME) {
            return Ok(LeadTimeSource::Column(col));
        }
        match (
            self.optional_column(columns::ORDER_DATE),
            self.optional_column(columns::DELIVERY_DATE),
        ) {
            (Some(order), Some(delivery)) => Ok(LeadTimeSource::OrderToDelivery { order, delivery }),
            _ => Err(ForecastError::missing_column(columns::LEAD_TIME)),
        }
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        v.to_string()
    }
}

fn parse_number(raw: &str, column: &str, line: usize) -> ForecastResult<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ForecastError::invalid_value(column, line, raw))
}

fn parse_flag(raw: &str, column: &str, line: usize) -> ForecastResult<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" | "yes" => Ok(true),
        "0" | "0.0" | "false" | "no" => Ok(false),
        _ => Err(ForecastError::invalid_value(column, line, raw)),
    }
}

fn parse_date(raw: &str, column: &str, line: usize) -> ForecastResult<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(d);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(dt.date());
        }
    }
    Err(ForecastError::invalid_value(column, line, raw))
}

fn parse_optional_date<'a>(
    col: Option<usize>,
    cell: &impl Fn(usize) -> &'a str,
    named: &impl Fn(usize) -> &'a str,
    line: usize,
) -> ForecastResult<Option<NaiveDate>> {
    match col {
        None => Ok(None),
        Some(c) if cell(c).is_empty() => Ok(None),
        Some(c) => parse_date(cell(c), named(c), line).map(Some),
    }
}
