use crate::power::ModeReport;
use crate::types::{ScanMode, TestOutcome};
use anyhow::{Context, Result};
use csv::{Writer, WriterBuilder};
use std::path::{Path, PathBuf};

/// Numeric stand-ins written for outcomes that are not p-values.
///
/// Bidirectional scans write `999` for "not tested" and `-999` for "test
/// failed"; the uniparental scan writes `1` and `NaN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelStyle {
    Bidirectional,
    Uniparental,
}

impl SentinelStyle {
    pub fn for_mode(mode: ScanMode) -> Self {
        match mode {
            ScanMode::XAutosome | ScanMode::AutosomeAutosome => SentinelStyle::Bidirectional,
            ScanMode::Uniparental => SentinelStyle::Uniparental,
        }
    }

    pub fn format(&self, outcome: TestOutcome) -> String {
        match (outcome, self) {
            (TestOutcome::PValue(p), _) => format_p_value(p),
            (TestOutcome::NotEligible, SentinelStyle::Bidirectional) => "999".to_string(),
            (TestOutcome::TestFailed, SentinelStyle::Bidirectional) => "-999".to_string(),
            (TestOutcome::NotEligible, SentinelStyle::Uniparental) => "1".to_string(),
            (TestOutcome::TestFailed, SentinelStyle::Uniparental) => "NaN".to_string(),
        }
    }
}

/// Plain decimal, switching to scientific notation for very small values.
pub fn format_p_value(p: f64) -> String {
    if p != 0.0 && p.abs() < 1e-4 {
        format!("{:e}", p)
    } else {
        format!("{}", p)
    }
}

/// Output file for a mode's result row
pub fn legacy_path(prefix: &str, mode: ScanMode) -> PathBuf {
    let name = match mode {
        ScanMode::XAutosome => format!("{}_xa_power_pvalues_bidirectional.csv", prefix),
        ScanMode::AutosomeAutosome => format!("{}_aa_power_pvalues_bidirectional.csv", prefix),
        ScanMode::Uniparental => format!("{}_uniparental_power_pvalues.csv", prefix),
    };
    PathBuf::from(name)
}

/// Legacy row: every target's empirical value, then every target's null minimum.
pub fn legacy_record(report: &ModeReport) -> Vec<String> {
    let style = SentinelStyle::for_mode(report.mode);
    let empirical = report.targets.iter().map(|t| style.format(t.empirical));
    let null = report
        .targets
        .iter()
        .map(|t| style.format(t.null_minimum().outcome()));
    empirical.chain(null).collect()
}

/// Write the single headerless result row for a mode.
pub fn write_legacy(report: &ModeReport, path: &Path) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    wtr.write_record(legacy_record(report))?;
    wtr.flush()?;
    Ok(())
}

/// Write one detailed row per test target.
pub fn write_summary(reports: &[ModeReport], seed: u64, path: &Path) -> Result<()> {
    let mut wtr = Writer::from_path(path)
        .with_context(|| format!("Failed to create summary file: {}", path.display()))?;

    wtr.write_record([
        "mode",
        "target",
        "locus1",
        "locus2",
        "focal1",
        "focal2",
        "n_sterile",
        "n_fertile",
        "bd1",
        "bd2",
        "bd3",
        "bd4",
        "bd5",
        "bd6",
        "bd7",
        "bd8",
        "empirical_status",
        "empirical_p",
        "null_min",
        "null_status",
        "null_total",
        "null_genuine",
        "null_not_eligible",
        "null_failed",
        "seed",
    ])?;

    for report in reports {
        let style = SentinelStyle::for_mode(report.mode);
        for t in &report.targets {
            let minimum = t.null_minimum();
            let counts = t.null.counts();
            let mut record = vec![
                report.mode.label().to_string(),
                t.design.label.to_string(),
                t.pair.locus1.to_string(),
                t.pair.locus2.to_string(),
                t.focal.window1.to_string(),
                t.focal.window2.to_string(),
                t.groups.sterile.len().to_string(),
                t.groups.fertile.len().to_string(),
            ];
            record.extend(t.empirical_cells.0.iter().map(|c| c.to_string()));
            record.extend([
                t.empirical.status().to_string(),
                t.empirical.p_value().map(format_p_value).unwrap_or_default(),
                style.format(minimum.outcome()),
                if minimum.is_genuine() { "genuine" } else { "all_sentinel" }.to_string(),
                counts.total().to_string(),
                counts.genuine.to_string(),
                counts.not_eligible.to_string(),
                counts.failed.to_string(),
                seed.to_string(),
            ]);
            wtr.write_record(&record)?;
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Write every null-scan outcome, one row per scanned pair.
pub fn write_null_pvalues(reports: &[ModeReport], path: &Path) -> Result<()> {
    let mut wtr = Writer::from_path(path)
        .with_context(|| format!("Failed to create null p-value file: {}", path.display()))?;

    wtr.write_record(["target", "orientation", "locus1", "locus2", "status", "p_value"])?;

    for report in reports {
        for t in &report.targets {
            for (orientation, pair, outcome) in t.null.entries() {
                let locus1 = pair.locus1.to_string();
                let locus2 = pair.locus2.to_string();
                let p_value = outcome.p_value().map(format_p_value).unwrap_or_default();
                wtr.write_record([
                    t.design.label,
                    orientation.label(),
                    locus1.as_str(),
                    locus2.as_str(),
                    outcome.status(),
                    p_value.as_str(),
                ])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}
