use stayrate_core::domain::{Listing, Recommendation};
use stayrate_core::time::calendar;
use stayrate_core::view::compare::OverlayRow;
use stayrate_core::view::summary::{DirectorySummary, SeriesSummary};

pub fn listings_table(listings: &[&Listing]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<38} {:<28} {:<16} {:>5}\n",
        "ID", "NAME", "CITY", "ROOMS"
    ));
    for l in listings {
        let rooms = l
            .rooms
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<38} {:<28} {:<16} {:>5}\n",
            l.id, l.name, l.city, rooms
        ));
    }
    out
}

pub fn directory_summary_line(summary: &DirectorySummary) -> String {
    format!(
        "{} listing(s) across {} city(ies), median {:.1} room(s)",
        summary.listings, summary.cities, summary.rooms_median
    )
}

pub fn series_table(series: &[Recommendation]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<12} {:>10} {:>10} {:>10}  {}\n",
        "DATE", "PRICE", "LOW", "HIGH", "REASON"
    ));
    for rec in series {
        out.push_str(&format!(
            "{:<12} {:>10.2} {:>10.2} {:>10.2}  {}\n",
            calendar::to_iso(rec.dt),
            rec.rec_price,
            rec.conf_low,
            rec.conf_high,
            rec.reason
        ));
    }
    out
}

pub fn series_summary_line(summary: &SeriesSummary) -> String {
    format!(
        "{} day(s)  avg {:.0}  min {:.0}  max {:.0}",
        summary.days, summary.avg, summary.min, summary.max
    )
}

// Blank cells where a listing has no data on that date.
pub fn overlay_table(ids: &[String], rows: &[OverlayRow]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<12}", "DATE"));
    for id in ids {
        out.push_str(&format!(" {:>12}", truncate(id, 12)));
    }
    out.push('\n');

    for row in rows {
        out.push_str(&format!("{:<12}", calendar::to_iso(row.dt)));
        for id in ids {
            match row.prices.get(id) {
                Some(price) => out.push_str(&format!(" {:>12.2}", price)),
                None => out.push_str(&format!(" {:>12}", "")),
            }
        }
        out.push('\n');
    }
    out
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
