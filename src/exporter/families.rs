//! Projection of snapshots and host stats onto Prometheus gauge families.
//!
//! Each family is built independently from a fresh gauge, so one family
//! failing (no GPU on this board, no sensors, `/proc` unreadable) never
//! affects the others. Samples inside a family keep the order they were
//! recorded in: cores ascending, then the fixed statistic order.

use prometheus::core::Collector as _;
use prometheus::proto::{Metric, MetricFamily};
use prometheus::{Gauge, GaugeVec, Opts};

use crate::collector::procfs::CollectError;
use crate::storage::model::{DiskStat, MemoryUsage, Snapshot, UptimeStat};

/// Why a family was left out of a scrape.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("no snapshot decoded yet")]
    NoSnapshot,
    #[error("{0} not reported by this board")]
    Missing(&'static str),
    #[error("{0} has no samples")]
    Empty(&'static str),
    #[error(transparent)]
    Prometheus(#[from] prometheus::Error),
    #[error(transparent)]
    Collect(#[from] CollectError),
}

impl ProjectError {
    /// Whether the family is absent by nature rather than by failure.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            ProjectError::NoSnapshot | ProjectError::Missing(_) | ProjectError::Empty(_)
        )
    }
}

pub type FamilyResult = Result<Vec<MetricFamily>, ProjectError>;

/// A labelled gauge family that remembers the order samples were set in.
struct OrderedGauge {
    name: &'static str,
    vec: GaugeVec,
    labels: &'static [&'static str],
    order: Vec<Vec<String>>,
}

impl OrderedGauge {
    fn new(
        name: &'static str,
        help: impl Into<String>,
        labels: &'static [&'static str],
    ) -> Result<Self, ProjectError> {
        Ok(Self {
            name,
            vec: GaugeVec::new(Opts::new(name, help), labels)?,
            labels,
            order: Vec::new(),
        })
    }

    fn set(&mut self, values: &[&str], value: f64) -> Result<(), ProjectError> {
        self.vec.get_metric_with_label_values(values)?.set(value);
        let key: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        if !self.order.contains(&key) {
            self.order.push(key);
        }
        Ok(())
    }

    fn position(&self, metric: &Metric) -> usize {
        let key: Vec<&str> = self
            .labels
            .iter()
            .map(|name| {
                metric
                    .get_label()
                    .iter()
                    .find(|pair| pair.get_name() == *name)
                    .map_or("", |pair| pair.get_value())
            })
            .collect();
        self.order
            .iter()
            .position(|k| k.iter().map(String::as_str).eq(key.iter().copied()))
            .unwrap_or(usize::MAX)
    }

    fn finish(self) -> FamilyResult {
        if self.order.is_empty() {
            return Err(ProjectError::Empty(self.name));
        }
        let mut families = self.vec.collect();
        for family in &mut families {
            family
                .mut_metric()
                .sort_by_key(|metric| self.position(metric));
        }
        Ok(families)
    }
}

fn single_gauge(name: &str, help: &str, value: f64) -> FamilyResult {
    let gauge = Gauge::with_opts(Opts::new(name, help))?;
    gauge.set(value);
    Ok(gauge.collect())
}

fn require(snapshot: Option<&Snapshot>) -> Result<&Snapshot, ProjectError> {
    snapshot.ok_or(ProjectError::NoSnapshot)
}

/// `cpu{core, statistic}`: `status` for every core, `freq` and `val` only
/// for cores that are online.
pub fn cpu(snapshot: Option<&Snapshot>) -> FamilyResult {
    let snapshot = require(snapshot)?;
    let mut gauge = OrderedGauge::new(
        "cpu",
        "cpu statistics from tegrastats",
        &["core", "statistic"],
    )?;

    for core in &snapshot.cpu_cores {
        let index = core.index.to_string();
        let index = index.as_str();
        gauge.set(&[index, "status"], if core.enabled { 1.0 } else { 0.0 })?;
        if !core.enabled {
            continue;
        }
        if let Some(freq) = core.frequency_mhz {
            gauge.set(&[index, "freq"], f64::from(freq))?;
        }
        if let Some(load) = core.utilization {
            gauge.set(&[index, "val"], f64::from(load))?;
        }
    }

    gauge.finish()
}

pub fn gpu(snapshot: Option<&Snapshot>) -> FamilyResult {
    let snapshot = require(snapshot)?;
    let utilization = snapshot
        .gpu_utilization()
        .ok_or(ProjectError::Missing("gpu_utilization_percentage"))?;
    single_gauge(
        "gpu_utilization_percentage",
        "gpu statistics from tegrastats",
        f64::from(utilization),
    )
}

fn memory(name: &'static str, usage: &MemoryUsage) -> FamilyResult {
    let mut gauge = OrderedGauge::new(
        name,
        format!(
            "{name} statistics from tegrastats, with units in {}",
            usage.unit
        ),
        &["statistic"],
    )?;
    gauge.set(&["total"], usage.total as f64)?;
    gauge.set(&["used"], usage.used as f64)?;
    gauge.finish()
}

pub fn ram(snapshot: Option<&Snapshot>) -> FamilyResult {
    memory("ram", &require(snapshot)?.memory)
}

pub fn swap(snapshot: Option<&Snapshot>) -> FamilyResult {
    let swap = require(snapshot)?
        .swap
        .as_ref()
        .ok_or(ProjectError::Missing("swap"))?;
    memory("swap", swap)
}

pub fn temperature(snapshot: Option<&Snapshot>) -> FamilyResult {
    let snapshot = require(snapshot)?;
    let mut gauge = OrderedGauge::new(
        "temperature",
        "temperature statistics from tegrastats",
        &["machine_part"],
    )?;
    for (part, celsius) in &snapshot.temperatures {
        gauge.set(&[part.as_str()], *celsius)?;
    }
    gauge.finish()
}

/// `voltage{source}`: current draw of each rail, in milliwatts.
pub fn voltage(snapshot: Option<&Snapshot>) -> FamilyResult {
    let snapshot = require(snapshot)?;
    let mut gauge = OrderedGauge::new(
        "voltage",
        "voltage statistics from tegrastats",
        &["source"],
    )?;
    for (rail, power) in &snapshot.power_rails {
        gauge.set(&[rail.as_str()], power.current_mw as f64)?;
    }
    gauge.finish()
}

pub fn disk(disks: Result<Vec<DiskStat>, CollectError>) -> FamilyResult {
    let mut gauge = OrderedGauge::new(
        "disk",
        "disk statistics in bytes",
        &["mountpoint", "statistic"],
    )?;
    for d in disks? {
        let mp = d.mountpoint.as_str();
        gauge.set(&[mp, "total"], d.total as f64)?;
        gauge.set(&[mp, "used"], d.used as f64)?;
        gauge.set(&[mp, "free"], d.free as f64)?;
        gauge.set(&[mp, "percent"], d.percent)?;
    }
    gauge.finish()
}

pub fn uptime(uptime: Result<UptimeStat, CollectError>) -> FamilyResult {
    single_gauge("uptime", "machine uptime", uptime?.seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::samples;
    use crate::collector::tegrastats::parse_line;
    use prometheus::proto::MetricType;
    use std::io;

    fn labels(metric: &Metric) -> Vec<(String, String)> {
        metric
            .get_label()
            .iter()
            .map(|p| (p.get_name().to_string(), p.get_value().to_string()))
            .collect()
    }

    fn label(metric: &Metric, name: &str) -> String {
        metric
            .get_label()
            .iter()
            .find(|p| p.get_name() == name)
            .map(|p| p.get_value().to_string())
            .unwrap()
    }

    #[test]
    fn test_cpu_family_order_and_offline_cores() {
        let snapshot = parse_line("RAM 1/2MB (lfb 1x4MB) CPU [off,5%@102,off,3%@102]").unwrap();
        let families = cpu(Some(&snapshot)).unwrap();
        assert_eq!(families.len(), 1);

        let family = &families[0];
        assert_eq!(family.get_name(), "cpu");
        assert_eq!(family.get_field_type(), MetricType::GAUGE);

        let samples: Vec<(String, String, f64)> = family
            .get_metric()
            .iter()
            .map(|m| {
                (
                    label(m, "core"),
                    label(m, "statistic"),
                    m.get_gauge().get_value(),
                )
            })
            .collect();
        let expected = [
            ("1", "status", 0.0),
            ("2", "status", 1.0),
            ("2", "freq", 102.0),
            ("2", "val", 5.0),
            ("3", "status", 0.0),
            ("4", "status", 1.0),
            ("4", "freq", 102.0),
            ("4", "val", 3.0),
        ];
        assert_eq!(samples.len(), expected.len());
        for ((core, stat, value), (ec, es, ev)) in samples.iter().zip(expected) {
            assert_eq!((core.as_str(), stat.as_str(), *value), (ec, es, ev));
        }
    }

    #[test]
    fn test_cpu_family_many_cores_stay_numeric_order() {
        let list = (0..12).map(|i| format!("{i}%@100")).collect::<Vec<_>>();
        let line = format!("RAM 1/2MB (lfb 1x4MB) CPU [{}]", list.join(","));
        let snapshot = parse_line(&line).unwrap();

        let families = cpu(Some(&snapshot)).unwrap();
        let cores: Vec<String> = families[0]
            .get_metric()
            .iter()
            .filter(|m| label(m, "statistic") == "status")
            .map(|m| label(m, "core"))
            .collect();
        let expected: Vec<String> = (1..=12).map(|i| i.to_string()).collect();
        assert_eq!(cores, expected);
    }

    #[test]
    fn test_families_need_snapshot() {
        for result in [
            cpu(None),
            gpu(None),
            ram(None),
            swap(None),
            temperature(None),
            voltage(None),
        ] {
            assert!(matches!(result, Err(ProjectError::NoSnapshot)));
        }
    }

    #[test]
    fn test_gpu_family() {
        let snapshot = parse_line(samples::TX2).unwrap();
        let families = gpu(Some(&snapshot)).unwrap();
        assert_eq!(families[0].get_name(), "gpu_utilization_percentage");
        assert!(families[0].get_metric()[0].get_label().is_empty());
        assert_eq!(families[0].get_metric()[0].get_gauge().get_value(), 0.0);

        let no_gpu = parse_line("RAM 1/2MB (lfb 1x4MB) APE 150").unwrap();
        let err = gpu(Some(&no_gpu)).unwrap_err();
        assert!(matches!(err, ProjectError::Missing(_)));
        assert!(err.is_expected());
    }

    #[test]
    fn test_memory_families() {
        let snapshot = parse_line(samples::NANO).unwrap();

        let families = ram(Some(&snapshot)).unwrap();
        let family = &families[0];
        assert_eq!(
            family.get_help(),
            "ram statistics from tegrastats, with units in M"
        );
        let values: Vec<(String, f64)> = family
            .get_metric()
            .iter()
            .map(|m| (label(m, "statistic"), m.get_gauge().get_value()))
            .collect();
        assert_eq!(
            values,
            vec![("total".to_string(), 3964.0), ("used".to_string(), 2015.0)]
        );

        let families = swap(Some(&snapshot)).unwrap();
        assert_eq!(
            families[0].get_help(),
            "swap statistics from tegrastats, with units in M"
        );

        let tk1 = parse_line(samples::TK1).unwrap();
        assert!(matches!(swap(Some(&tk1)), Err(ProjectError::Missing("swap"))));
    }

    #[test]
    fn test_temperature_and_voltage() {
        let snapshot = parse_line(samples::ORIN).unwrap();

        let families = temperature(Some(&snapshot)).unwrap();
        let cv0 = families[0]
            .get_metric()
            .iter()
            .find(|m| label(m, "machine_part") == "CV0")
            .unwrap();
        assert_eq!(cv0.get_gauge().get_value(), -256.0);

        let families = voltage(Some(&snapshot)).unwrap();
        assert_eq!(families[0].get_metric().len(), 3);
        let gpu_rail = families[0]
            .get_metric()
            .iter()
            .find(|m| label(m, "source") == "VDD_GPU_SOC")
            .unwrap();
        assert_eq!(gpu_rail.get_gauge().get_value(), 2383.0);
    }

    #[test]
    fn test_empty_maps_are_skipped() {
        let snapshot = parse_line("RAM 1/2MB (lfb 1x4MB)").unwrap();
        assert!(matches!(
            temperature(Some(&snapshot)),
            Err(ProjectError::Empty("temperature"))
        ));
        assert!(matches!(
            voltage(Some(&snapshot)),
            Err(ProjectError::Empty("voltage"))
        ));
        assert!(matches!(
            cpu(Some(&snapshot)),
            Err(ProjectError::Empty("cpu"))
        ));
    }

    #[test]
    fn test_disk_family() {
        let disks = vec![DiskStat {
            mountpoint: "/".to_string(),
            total: 100,
            used: 40,
            free: 60,
            percent: 40.0,
        }];
        let families = disk(Ok(disks)).unwrap();
        let metrics: Vec<Vec<(String, String)>> =
            families[0].get_metric().iter().map(labels).collect();
        let stats: Vec<&str> = metrics
            .iter()
            .map(|l| {
                l.iter()
                    .find(|(k, _)| k == "statistic")
                    .map(|(_, v)| v.as_str())
                    .unwrap()
            })
            .collect();
        assert_eq!(stats, vec!["total", "used", "free", "percent"]);

        let err = disk(Err(CollectError::Io(io::Error::other("boom")))).unwrap_err();
        assert!(!err.is_expected());
    }

    #[test]
    fn test_uptime_family() {
        let families = uptime(Ok(UptimeStat { seconds: 12.5 })).unwrap();
        assert_eq!(families[0].get_name(), "uptime");
        assert_eq!(families[0].get_help(), "machine uptime");
        assert_eq!(families[0].get_metric()[0].get_gauge().get_value(), 12.5);
    }
}
