use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

// conf_low <= rec_price <= conf_high is expected from the backend but not
// validated here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub dt: NaiveDate,
    #[serde(deserialize_with = "flexible_price")]
    pub rec_price: f64,
    #[serde(deserialize_with = "flexible_price")]
    pub conf_low: f64,
    #[serde(deserialize_with = "flexible_price")]
    pub conf_high: f64,
    #[serde(default)]
    pub reason: String,
}

// Date order is a rendering assumption, not a backend guarantee.
pub fn sort_by_date(series: &mut [Recommendation]) {
    series.sort_by_key(|r| r.dt);
}

// Some endpoints send prices as JSON numbers, others as decimal strings.
fn flexible_price<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(v) => Ok(v),
        Raw::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid price value: {s:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_numeric_prices() {
        let r: Recommendation = serde_json::from_value(json!({
            "dt": "2024-01-01",
            "rec_price": 100.0,
            "conf_low": 90.0,
            "conf_high": 112.5,
            "reason": "baseline"
        }))
        .unwrap();
        assert_eq!(r.rec_price, 100.0);
        assert_eq!(r.conf_high, 112.5);
    }

    #[test]
    fn decodes_string_prices() {
        let r: Recommendation = serde_json::from_value(json!({
            "dt": "2024-01-01",
            "rec_price": "100.00",
            "conf_low": "90.50",
            "conf_high": "112.00",
            "reason": ""
        }))
        .unwrap();
        assert_eq!(r.rec_price, 100.0);
        assert_eq!(r.conf_low, 90.5);
    }

    #[test]
    fn rejects_non_numeric_price_strings() {
        let res = serde_json::from_value::<Recommendation>(json!({
            "dt": "2024-01-01",
            "rec_price": "a lot",
            "conf_low": 1,
            "conf_high": 2,
            "reason": ""
        }));
        assert!(res.is_err());
    }

    #[test]
    fn sorts_unordered_input_by_date() {
        let mut series: Vec<Recommendation> = serde_json::from_value(json!([
            {"dt": "2024-01-03", "rec_price": 3, "conf_low": 1, "conf_high": 5, "reason": ""},
            {"dt": "2024-01-01", "rec_price": 1, "conf_low": 1, "conf_high": 5, "reason": ""},
            {"dt": "2024-01-02", "rec_price": 2, "conf_low": 1, "conf_high": 5, "reason": ""}
        ]))
        .unwrap();
        sort_by_date(&mut series);
        let prices: Vec<f64> = series.iter().map(|r| r.rec_price).collect();
        assert_eq!(prices, vec![1.0, 2.0, 3.0]);
    }
}
