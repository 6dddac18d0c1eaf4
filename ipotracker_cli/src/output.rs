use anyhow::Result;
use ipotracker_lib::{RecentIpoRow, UpcomingIpoRow};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
    Markdown,
    /// The raw response envelope, as the query service returns it.
    Envelope,
}

impl OutputFormat {
    pub fn parse(name: &str) -> Self {
        match name {
            "json" => Self::Json,
            "csv" => Self::Csv,
            "md" | "markdown" => Self::Markdown,
            "envelope" => Self::Envelope,
            _ => Self::Table,
        }
    }
}

#[derive(Tabled, Serialize)]
struct RecentRow {
    #[tabled(rename = "Symbol")]
    #[serde(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Company")]
    #[serde(rename = "Company")]
    company: String,
    #[tabled(rename = "Industry")]
    #[serde(rename = "Industry")]
    industry: String,
    #[tabled(rename = "Offer Date")]
    #[serde(rename = "Offer Date")]
    offer_date: String,
    #[tabled(rename = "Offer Price")]
    #[serde(rename = "Offer Price")]
    offer_price: String,
    #[tabled(rename = "1st Day Close")]
    #[serde(rename = "1st Day Close")]
    first_day_close: String,
    #[tabled(rename = "1st Day Return")]
    #[serde(rename = "1st Day Return")]
    first_day_return: String,
}

#[derive(Tabled, Serialize)]
struct UpcomingRow {
    #[tabled(rename = "Symbol")]
    #[serde(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Company")]
    #[serde(rename = "Company")]
    company: String,
    #[tabled(rename = "Lead Managers")]
    #[serde(rename = "Lead Managers")]
    lead_managers: String,
    #[tabled(rename = "Shares (M)")]
    #[serde(rename = "Shares (M)")]
    shares: String,
    #[tabled(rename = "Price Range")]
    #[serde(rename = "Price Range")]
    price_range: String,
    #[tabled(rename = "Expected")]
    #[serde(rename = "Expected")]
    expected_to_trade: String,
}

// -- Row builders --

fn build_recent_rows(ipos: &[RecentIpoRow]) -> Vec<RecentRow> {
    ipos.iter()
        .map(|r| RecentRow {
            symbol: r.symbol.clone(),
            company: r.company.clone(),
            industry: r.industry.clone(),
            offer_date: r.offer_date.clone(),
            offer_price: format_price(r.offer_price),
            first_day_close: format_price(r.first_day_close),
            first_day_return: format_return(r.offer_price, r.first_day_close),
        })
        .collect()
}

fn build_upcoming_rows(ipos: &[UpcomingIpoRow]) -> Vec<UpcomingRow> {
    ipos.iter()
        .map(|r| UpcomingRow {
            symbol: r.symbol.clone(),
            company: r.company.clone(),
            lead_managers: r.lead_managers.clone(),
            shares: format!("{:.2}", r.shares_millions),
            price_range: format_range(r.price_low, r.price_high),
            expected_to_trade: r.expected_to_trade.clone(),
        })
        .collect()
}

// -- Table output --

pub fn print_recent_table(ipos: &[RecentIpoRow]) {
    println!("{}", Table::new(build_recent_rows(ipos)));
}

pub fn print_upcoming_table(ipos: &[UpcomingIpoRow]) {
    println!("{}", Table::new(build_upcoming_rows(ipos)));
}

// -- Markdown output --

pub fn print_recent_markdown(ipos: &[RecentIpoRow]) {
    let mut table = Table::new(build_recent_rows(ipos));
    table.with(Style::markdown());
    println!("{}", table);
}

pub fn print_upcoming_markdown(ipos: &[UpcomingIpoRow]) {
    let mut table = Table::new(build_upcoming_rows(ipos));
    table.with(Style::markdown());
    println!("{}", table);
}

// -- CSV output --

pub fn print_recent_csv(ipos: &[RecentIpoRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(std::io::stdout());
    for row in build_recent_rows(ipos) {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn print_upcoming_csv(ipos: &[UpcomingIpoRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(std::io::stdout());
    for row in build_upcoming_rows(ipos) {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

// -- JSON output --

pub fn print_json<T: serde::Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize to JSON: {}", e),
    }
}

fn format_price(price: f64) -> String {
    if price > 0.0 {
        format!("${:.2}", price)
    } else {
        "-".to_string()
    }
}

fn format_range(low: f64, high: f64) -> String {
    match (low > 0.0, high > 0.0) {
        (false, false) => "TBA".to_string(),
        _ if low == high => format_price(low),
        _ => format!("{} - {}", format_price(low), format_price(high)),
    }
}

fn format_return(offer: f64, close: f64) -> String {
    if offer <= 0.0 || close <= 0.0 {
        return "-".to_string();
    }
    format!("{:+.1}%", (close - offer) / offer * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recent_fixture() -> Vec<RecentIpoRow> {
        vec![
            RecentIpoRow {
                symbol: "EFGH".into(),
                company: "EFGH Holdings Corp.".into(),
                industry: "Financial".into(),
                offer_date: "2023-03-15".into(),
                offer_price: 21.0,
                first_day_close: 19.75,
            },
            RecentIpoRow {
                symbol: "IJKL".into(),
                company: "IJKL Biotech".into(),
                industry: "Healthcare".into(),
                offer_date: "2023-02-10".into(),
                offer_price: 4.0,
                first_day_close: 0.0,
            },
        ]
    }

    fn upcoming_fixture() -> Vec<UpcomingIpoRow> {
        vec![UpcomingIpoRow {
            symbol: "NWRB".into(),
            company: "Northwind Robotics Inc.".into(),
            lead_managers: "Goldman Sachs/ Morgan Stanley".into(),
            shares_millions: 12.5,
            price_low: 18.0,
            price_high: 20.0,
            expected_to_trade: "2026-10-22".into(),
        }]
    }

    #[test]
    fn parse_output_formats() {
        assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("csv"), OutputFormat::Csv);
        assert_eq!(OutputFormat::parse("md"), OutputFormat::Markdown);
        assert_eq!(OutputFormat::parse("envelope"), OutputFormat::Envelope);
        assert_eq!(OutputFormat::parse("anything"), OutputFormat::Table);
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(10.0), "$10.00");
        assert_eq!(format_price(0.0), "-");
    }

    #[test]
    fn test_format_range() {
        assert_eq!(format_range(18.0, 20.0), "$18.00 - $20.00");
        assert_eq!(format_range(15.0, 15.0), "$15.00");
        assert_eq!(format_range(0.0, 0.0), "TBA");
    }

    #[test]
    fn test_format_return() {
        assert_eq!(format_return(10.0, 12.5), "+25.0%");
        assert_eq!(format_return(21.0, 19.74), "-6.0%");
        assert_eq!(format_return(4.0, 0.0), "-");
    }

    #[test]
    fn test_build_recent_rows_mapping() {
        let rows = build_recent_rows(&recent_fixture());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, "EFGH");
        assert_eq!(rows[0].offer_price, "$21.00");
        assert_eq!(rows[0].first_day_close, "$19.75");
        assert_eq!(rows[1].first_day_close, "-");
        assert_eq!(rows[1].first_day_return, "-");
    }

    #[test]
    fn test_build_upcoming_rows_mapping() {
        let rows = build_upcoming_rows(&upcoming_fixture());
        assert_eq!(rows[0].shares, "12.50");
        assert_eq!(rows[0].price_range, "$18.00 - $20.00");
        assert_eq!(rows[0].expected_to_trade, "2026-10-22");
    }

    #[test]
    fn test_recent_table_has_headers() {
        let table = Table::new(build_recent_rows(&recent_fixture())).to_string();
        assert!(table.contains("Symbol"));
        assert!(table.contains("1st Day Close"));
        assert!(table.contains("EFGH Holdings Corp."));
    }

    #[test]
    fn test_markdown_upcoming_structure() {
        let mut table = Table::new(build_upcoming_rows(&upcoming_fixture()));
        table.with(Style::markdown());
        let md = table.to_string();
        let lines: Vec<&str> = md.lines().collect();
        assert!(lines[0].starts_with('|'));
        assert!(lines[1].contains("---"));
        assert!(lines[2].contains("NWRB"));
    }

    #[test]
    fn test_csv_recent_headers() {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        for row in build_recent_rows(&recent_fixture()) {
            wtr.serialize(row).unwrap();
        }
        let data = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        let header = data.lines().next().unwrap();
        assert_eq!(
            header,
            "Symbol,Company,Industry,Offer Date,Offer Price,1st Day Close,1st Day Return"
        );
    }
}
