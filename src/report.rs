//! Text rendering of Adsterra responses.

use crate::integrations::{DirectLink, Domain, StatRow};

/// Sentinel returned for an empty statistics report.
pub const NO_DATA: &str = "No Data";
pub const NO_WEBSITES: &str = "No Website Found";
pub const NO_DIRECT_LINKS: &str = "No Direct Links Found";

/// Telegram rejects messages longer than this many UTF-16 code units.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Message length as Telegram counts it.
pub fn telegram_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Round half away from zero to two decimals.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One block per bucket followed by an aggregate block.
pub fn format_statistics(rows: &[StatRow]) -> String {
    if rows.is_empty() {
        return NO_DATA.to_string();
    }

    let mut message = String::new();
    let mut total_impressions: u64 = 0;
    let mut total_clicks: u64 = 0;
    let mut total_cpm = 0.0;
    let mut total_revenue = 0.0;

    for row in rows {
        total_impressions += row.impression;
        total_clicks += row.clicks;
        total_cpm += row.cpm;
        total_revenue += row.revenue;

        if let Some(label) = row.label() {
            message.push_str(&format!("📌 {}\n", label));
        }
        message.push_str(&format!(
            "Impressions: {}\nCpm: {}\nClicks: {}\nRevenue: ${:.2}\n\n",
            row.impression,
            row.cpm,
            row.clicks,
            round2(row.revenue)
        ));
    }

    message.push_str(&format!(
        "Total Impressions: {}\nCpm: {:.3}\nTotal Clicks: {}\nTotal Revenue: ${:.2}",
        total_impressions,
        total_cpm,
        total_clicks,
        round2(total_revenue)
    ));

    message
}

pub fn format_websites(websites: &[Domain]) -> String {
    if websites.is_empty() {
        return NO_WEBSITES.to_string();
    }

    websites
        .iter()
        .map(|w| format!("🆔  {}\n🖥️  {}\n", w.id, w.title))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_direct_links(links: &[DirectLink]) -> String {
    if links.is_empty() {
        return NO_DIRECT_LINKS.to_string();
    }

    links
        .iter()
        .map(|l| format!("____ {} ____\n\n{}\n", l.alias, l.url))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Cut `text` so it fits in a single Telegram message. Never splits a char.
pub fn fit_message(text: String) -> String {
    if telegram_len(&text) <= TELEGRAM_MESSAGE_LIMIT {
        return text;
    }

    let marker = "\n…";
    let budget = TELEGRAM_MESSAGE_LIMIT - telegram_len(marker);
    let mut used = 0;
    let mut end = 0;
    for (idx, ch) in text.char_indices() {
        if used + ch.len_utf16() > budget {
            break;
        }
        used += ch.len_utf16();
        end = idx + ch.len_utf8();
    }

    let mut cut = text[..end].to_string();
    cut.push_str(marker);
    cut
}
