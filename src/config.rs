use std::env;
use std::path::PathBuf;

use listing_explorer::data::explorer::DEFAULT_EXPENSIVE_THRESHOLD;

pub const DEFAULT_DATA_PATH: &str = "data/listings.csv";
pub const DEFAULT_PRICE_CAP: f64 = 10_000.0;

/// Startup settings: first CLI argument or `LISTINGS_DATA` for the source,
/// `LISTINGS_PRICE_CAP` and `LISTINGS_EXPENSIVE_THRESHOLD` for slider limits.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_path: PathBuf,
    /// Upper end of the price sliders.
    pub price_cap: f64,
    pub expensive_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            price_cap: DEFAULT_PRICE_CAP,
            expensive_threshold: DEFAULT_EXPENSIVE_THRESHOLD,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let args: Vec<String> = env::args().collect();
        Self::from_sources(&args, |key| env::var(key).ok())
    }

    pub fn from_sources(args: &[String], var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let data_path = args
            .get(1)
            .cloned()
            .or_else(|| var("LISTINGS_DATA"))
            .map(PathBuf::from)
            .unwrap_or(defaults.data_path);

        Self {
            data_path,
            price_cap: positive_var(&var, "LISTINGS_PRICE_CAP", defaults.price_cap),
            expensive_threshold: positive_var(
                &var,
                "LISTINGS_EXPENSIVE_THRESHOLD",
                defaults.expensive_threshold,
            ),
        }
    }
}

fn positive_var(var: &impl Fn(&str) -> Option<String>, key: &str, default: f64) -> f64 {
    match var(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && v > 0.0 => v,
            _ => {
                log::warn!("Ignoring {key}={raw:?}: expected a positive number");
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_without_args_or_env() {
        let cfg = Config::from_sources(&args(&["bin"]), |_| None);
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn cli_argument_wins_over_env() {
        let cfg = Config::from_sources(&args(&["bin", "a.csv"]), |k| {
            (k == "LISTINGS_DATA").then(|| "b.csv".to_string())
        });
        assert_eq!(cfg.data_path, PathBuf::from("a.csv"));
    }

    #[test]
    fn bad_numbers_fall_back_to_defaults() {
        let cfg = Config::from_sources(&args(&["bin"]), |k| match k {
            "LISTINGS_PRICE_CAP" => Some("lots".to_string()),
            "LISTINGS_EXPENSIVE_THRESHOLD" => Some("150".to_string()),
            _ => None,
        });
        assert_eq!(cfg.price_cap, DEFAULT_PRICE_CAP);
        assert_eq!(cfg.expensive_threshold, 150.0);
    }
}
