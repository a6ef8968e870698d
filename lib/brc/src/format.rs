use crate::error::{BrcError, Result};
use crate::reduce::GlobalStats;
use crate::value::{Scaled, Stats};
use std::fmt::Write as _;
use std::io::Write;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MeanMode {
    /// `sum / count` with integer division, truncating toward zero.
    #[default]
    Truncate,
    HalfAwayFromZero,
}

impl MeanMode {
    pub fn mean(self, stats: &Stats) -> Scaled {
        let count = stats.count.max(1) as i128;
        let sum = stats.sum as i128;
        let q = match self {
            MeanMode::Truncate => sum / count,
            MeanMode::HalfAwayFromZero => (2 * sum + sum.signum() * count) / (2 * count),
        };
        Scaled(q as i64)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputRow {
    pub key: String,
    pub min: Scaled,
    pub mean: Scaled,
    pub max: Scaled,
}

/// Rows in byte-wise key order.
pub fn rows(global: &GlobalStats, mode: MeanMode) -> Vec<OutputRow> {
    let mut keys: Vec<&String> = global.keys().collect();
    keys.sort_unstable();
    keys.into_iter()
        .map(|k| {
            let s = &global[k];
            OutputRow { key: k.clone(), min: s.min, mean: mode.mean(s), max: s.max }
        })
        .collect()
}

/// `{k1=min/mean/max, k2=min/mean/max}`
pub fn render(rows: &[OutputRow]) -> String {
    let mut out = String::with_capacity(rows.len() * 24 + 2);
    out.push('{');
    for (i, r) in rows.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{}={}/{}/{}", r.key, r.min, r.mean, r.max);
    }
    out.push('}');
    out
}

pub fn write_summary<W: Write>(mut w: W, rows: &[OutputRow]) -> Result<()> {
    let line = render(rows);
    w.write_all(line.as_bytes())
        .and_then(|_| w.write_all(b"\n"))
        .and_then(|_| w.flush())
        .map_err(|e| BrcError::io("write summary", e))
}
