//! Terminal rendering of dashboard data

use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use dash_api::{ChatSession, Financials, NewsArticle, PricePoint, Quote, SymbolInfo, User};
use dash_app::{ActiveSession, ChatMessage, StockSnapshot};

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    table
}

/// 1234567890 -> "1.23B"
fn compact(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e12 {
        format!("{:.2}T", value / 1e12)
    } else if abs >= 1e9 {
        format!("{:.2}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.2}M", value / 1e6)
    } else {
        format!("{value:.2}")
    }
}

fn opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

fn opt_compact(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), compact)
}

fn change_cell(change: f64, text: String) -> Cell {
    let color = if change >= 0.0 { Color::Green } else { Color::Red };
    Cell::new(text).fg(color)
}

pub fn quotes(quotes: &[Quote]) -> Table {
    let mut table = table(&["Symbol", "Price", "Change", "Change %", "Volume"]);
    for quote in quotes {
        table.add_row(vec![
            Cell::new(&quote.symbol),
            Cell::new(format!("{:.2}", quote.price)),
            change_cell(quote.change, format!("{:+.2}", quote.change)),
            change_cell(quote.change, format!("{:+.2}%", quote.change_percent)),
            Cell::new(quote.volume.map_or_else(|| "-".to_string(), |v| compact(v as f64))),
        ]);
    }
    table
}

pub fn fundamentals(financials: &Financials) -> Table {
    let mut table = table(&["Metric", "Value"]);
    let rows = [
        ("Company", financials.company_name.clone()),
        ("Sector", financials.sector.clone().unwrap_or_else(|| "-".to_string())),
        ("Industry", financials.industry.clone().unwrap_or_else(|| "-".to_string())),
        ("Market cap", opt_compact(financials.market_cap)),
        ("P/E", opt(financials.pe_ratio)),
        ("EPS", opt(financials.eps)),
        ("Dividend yield", opt(financials.dividend_yield)),
        ("Revenue", opt_compact(financials.revenue)),
        ("Profit margin", opt(financials.profit_margin)),
        ("Debt/Equity", opt(financials.debt_to_equity)),
        ("Beta", opt(financials.beta)),
        ("RSI", opt(financials.rsi)),
        ("50-day MA", opt(financials.fifty_day_ma)),
        ("200-day MA", opt(financials.two_hundred_day_ma)),
    ];
    for (metric, value) in rows {
        table.add_row(vec![metric.to_string(), value]);
    }
    table
}

/// The most recent `limit` points, oldest first
pub fn prices(points: &[PricePoint], limit: usize) -> Table {
    let mut table = table(&["Date", "Open", "High", "Low", "Close", "Volume"]);
    let skip = points.len().saturating_sub(limit);
    for point in points.iter().skip(skip) {
        table.add_row(vec![
            point.date.clone(),
            format!("{:.2}", point.open),
            format!("{:.2}", point.high),
            format!("{:.2}", point.low),
            format!("{:.2}", point.close),
            compact(point.volume as f64),
        ]);
    }
    table
}

pub fn news(articles: &[NewsArticle]) -> Table {
    let mut table = table(&["Date", "Source", "Headline"]);
    for article in articles {
        table.add_row(vec![
            article
                .date
                .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d").to_string()),
            article.source.clone(),
            article.headline.clone(),
        ]);
    }
    table
}

pub fn article(article: &NewsArticle) -> String {
    let mut out = format!("{}\n{}", article.headline, article.source);
    if let Some(date) = article.date {
        out.push_str(&format!(" | {}", date.format("%Y-%m-%d %H:%M")));
    }
    if let Some(summary) = &article.summary {
        out.push_str(&format!("\n\n{summary}"));
    }
    if let Some(url) = &article.url {
        out.push_str(&format!("\n\n{url}"));
    }
    out
}

pub fn symbols(symbols: &[SymbolInfo]) -> Table {
    let mut table = table(&["Symbol", "Company"]);
    for info in symbols {
        table.add_row(vec![
            info.symbol.clone(),
            info.company_name.clone().unwrap_or_default(),
        ]);
    }
    table
}

pub fn user(user: &User) -> Table {
    let mut table = table(&["Field", "Value"]);
    let full_name = [user.first_name.as_deref(), user.last_name.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    table.add_row(vec!["Username", user.username.as_str()]);
    table.add_row(vec!["Email", user.email.as_str()]);
    table.add_row(vec!["Name", if full_name.is_empty() { "-" } else { full_name.as_str() }]);
    table.add_row(vec!["Id", user.id.as_str()]);
    table
}

pub fn sessions(sessions: &[ChatSession], active: &ActiveSession) -> Table {
    let mut table = table(&["", "Id", "Title", "Symbols", "Updated"]);
    for session in sessions {
        let marker = if active.id() == Some(session.id.as_str()) { "*" } else { "" };
        table.add_row(vec![
            marker.to_string(),
            session.id.clone(),
            session.title.clone(),
            session
                .context
                .as_ref()
                .map(|c| c.symbols.join(", "))
                .unwrap_or_default(),
            session
                .updated_at
                .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d %H:%M").to_string()),
        ]);
    }
    table
}

pub fn message(message: &ChatMessage) -> String {
    let speaker = if message.is_user { "you" } else { "assistant" };
    format!("[{}] {}: {}", message.timestamp.format("%H:%M"), speaker, message.content)
}

pub fn snapshot(snapshot: &StockSnapshot, series: &[PricePoint], points: usize) -> String {
    let mut out = format!(
        "{} ({})  fetched {}\n",
        snapshot.symbol,
        snapshot.timeframe,
        snapshot.fetched_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    out.push_str(&quotes(std::slice::from_ref(&snapshot.quote)).to_string());
    out.push_str("\n\nPrice history\n");
    out.push_str(&prices(series, points).to_string());
    out.push_str("\n\nFundamentals\n");
    out.push_str(&fundamentals(&snapshot.financials).to_string());
    if !snapshot.news.is_empty() {
        out.push_str("\n\nNews\n");
        out.push_str(&news(&snapshot.news).to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_numbers() {
        assert_eq!(compact(2_500_000_000_000.0), "2.50T");
        assert_eq!(compact(1_234_567_890.0), "1.23B");
        assert_eq!(compact(-3_400_000.0), "-3.40M");
        assert_eq!(compact(42.0), "42.00");
    }

    #[test]
    fn test_prices_keeps_latest_points() {
        let points: Vec<PricePoint> = (1..=5)
            .map(|day| PricePoint {
                date: format!("2024-01-0{day}"),
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: f64::from(day),
                volume: 100,
            })
            .collect();

        let rendered = prices(&points, 2).to_string();
        assert!(rendered.contains("2024-01-05"));
        assert!(rendered.contains("2024-01-04"));
        assert!(!rendered.contains("2024-01-03"));
    }

    #[test]
    fn test_session_marker() {
        let session = ChatSession {
            id: "s1".to_string(),
            title: "Semis".to_string(),
            context: None,
            created_at: None,
            updated_at: None,
            message_count: None,
        };
        let rendered = sessions(&[session], &ActiveSession::Persisted("s1".to_string())).to_string();
        assert!(rendered.contains('*'));
        assert!(rendered.contains("Semis"));
    }
}
