use crate::domain::{Listing, Recommendation};
use std::collections::BTreeSet;

// Headline figures for one listing's recommendation window.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSummary {
    pub days: usize,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

impl SeriesSummary {
    pub fn from_series(series: &[Recommendation]) -> Option<Self> {
        if series.is_empty() {
            return None;
        }

        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for rec in series {
            sum += rec.rec_price;
            min = min.min(rec.rec_price);
            max = max.max(rec.rec_price);
        }

        Some(Self {
            days: series.len(),
            avg: sum / series.len() as f64,
            min,
            max,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectorySummary {
    pub listings: usize,
    pub cities: usize,
    pub rooms_median: f64,
}

impl DirectorySummary {
    pub fn from_listings(listings: &[Listing]) -> Self {
        let cities: BTreeSet<&str> = listings.iter().map(|l| l.city.as_str()).collect();
        let rooms: Vec<f64> = listings
            .iter()
            .map(|l| f64::from(l.rooms.unwrap_or(0)))
            .collect();

        Self {
            listings: listings.len(),
            cities: cities.len(),
            rooms_median: median(&rooms),
        }
    }
}

// Case-insensitive filter on name or city substring.
pub fn filter_listings<'a>(listings: &'a [Listing], query: &str) -> Vec<&'a Listing> {
    let term = query.trim().to_lowercase();
    if term.is_empty() {
        return listings.iter().collect();
    }
    listings
        .iter()
        .filter(|l| l.name.to_lowercase().contains(&term) || l.city.to_lowercase().contains(&term))
        .collect()
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}
