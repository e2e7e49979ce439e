use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::flow::DEFAULT_PRECISION;
use crate::model::CostMetric;
use crate::route_compute::{DisjointKind, KspConstraints, PathAlgorithm};

#[derive(Debug, Clone, PartialEq)]
pub struct KspConfig {
    pub k: usize,
    pub constraints: KspConstraints,
}

impl Default for KspConfig {
    fn default() -> Self {
        Self {
            k: 3,
            constraints: KspConstraints::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub precision: f64,
    pub algorithm: PathAlgorithm,
    pub cost: CostMetric,
    pub disjoint: DisjointKind,
    pub ksp: KspConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            algorithm: PathAlgorithm::Dijkstra,
            cost: CostMetric::Hops,
            disjoint: DisjointKind::Link,
            ksp: KspConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawKsp {
    k: Option<usize>,
    max_hops: Option<usize>,
    max_length_km: Option<f64>,
    max_delay_ms: Option<f64>,
    max_cost: Option<f64>,
    max_cost_factor: Option<f64>,
    max_cost_offset: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct RawEngineConfig {
    precision: Option<f64>,
    algorithm: Option<String>,
    cost: Option<String>,
    disjoint: Option<String>,
    ksp: Option<RawKsp>,
}

pub fn load_engine_config(path: &Path) -> Result<EngineConfig> {
    let raw_text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    EngineConfig::from_yaml_str(&raw_text)
        .with_context(|| format!("invalid engine config {}", path.display()))
}

impl EngineConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        // an empty document parses as unit, not as an empty map
        let raw_cfg: RawEngineConfig = if text.trim().is_empty() {
            RawEngineConfig::default()
        } else {
            serde_yaml::from_str(text).context("failed to parse engine config yaml")?
        };
        let ksp_raw = raw_cfg.ksp.unwrap_or_default();

        let precision = raw_cfg.precision.unwrap_or(DEFAULT_PRECISION);
        if !precision.is_finite() || precision < 0.0 {
            bail!("precision must be a non-negative number, got {precision}");
        }

        let algorithm = match raw_cfg.algorithm {
            Some(name) => name.parse::<PathAlgorithm>()?,
            None => PathAlgorithm::Dijkstra,
        };
        let cost = match raw_cfg.cost {
            Some(name) => parse_cost_metric(&name)?,
            None => CostMetric::Hops,
        };
        let disjoint = match raw_cfg.disjoint {
            Some(name) => name.parse::<DisjointKind>()?,
            None => DisjointKind::Link,
        };

        Ok(EngineConfig {
            precision,
            algorithm,
            cost,
            disjoint,
            ksp: KspConfig {
                k: ksp_raw.k.unwrap_or(3),
                constraints: KspConstraints {
                    max_hops: ksp_raw.max_hops,
                    max_length_km: ksp_raw.max_length_km,
                    max_delay_ms: ksp_raw.max_delay_ms,
                    max_cost: ksp_raw.max_cost,
                    max_cost_factor: ksp_raw.max_cost_factor,
                    max_cost_offset: ksp_raw.max_cost_offset,
                },
            },
        })
    }
}

fn parse_cost_metric(raw: &str) -> Result<CostMetric> {
    Ok(match raw.trim().to_lowercase().as_str() {
        "hops" | "hop" => CostMetric::Hops,
        "weight" | "cost" => CostMetric::Weight,
        "length" | "length_km" | "km" => CostMetric::LengthKm,
        "delay" | "delay_ms" => CostMetric::DelayMs,
        other => bail!("unknown cost metric: {other}"),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_document_matches_defaults() {
        assert_eq!(EngineConfig::from_yaml_str("").unwrap(), EngineConfig::default());
        assert_eq!(EngineConfig::from_yaml_str("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn every_section_is_read() {
        let cfg = EngineConfig::from_yaml_str(
            r#"
precision: 1.0e-4
algorithm: ksp
cost: length
disjoint: node
ksp:
  k: 5
  max_hops: 4
  max_cost_factor: 1.5
"#,
        )
        .unwrap();
        assert_eq!(cfg.precision, 1e-4);
        assert_eq!(cfg.algorithm, PathAlgorithm::Yen);
        assert_eq!(cfg.cost, CostMetric::LengthKm);
        assert_eq!(cfg.disjoint, DisjointKind::Node);
        assert_eq!(cfg.ksp.k, 5);
        assert_eq!(cfg.ksp.constraints.max_hops, Some(4));
        assert_eq!(cfg.ksp.constraints.max_cost_factor, Some(1.5));
        assert_eq!(cfg.ksp.constraints.max_length_km, None);
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(EngineConfig::from_yaml_str("cost: bandwidth").is_err());
        assert!(EngineConfig::from_yaml_str("disjoint: srlg").is_err());
        assert!(EngineConfig::from_yaml_str("algorithm: bellman").is_err());
        assert!(EngineConfig::from_yaml_str("precision: -1").is_err());
    }

    #[test]
    fn plural_disjoint_names_are_accepted() {
        let cfg = EngineConfig::from_yaml_str("disjoint: nodes").unwrap();
        assert_eq!(cfg.disjoint, DisjointKind::Node);
        let cfg = EngineConfig::from_yaml_str("disjoint: links").unwrap();
        assert_eq!(cfg.disjoint, DisjointKind::Link);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cost: weight\nksp:\n  k: 2").unwrap();
        let cfg = load_engine_config(file.path()).unwrap();
        assert_eq!(cfg.cost, CostMetric::Weight);
        assert_eq!(cfg.ksp.k, 2);
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let err = load_engine_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("absent.yaml"));
    }
}
