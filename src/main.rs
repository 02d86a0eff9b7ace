use anyhow::{Context, Result};
use bdmi_power::classifier::{BackgroundScope, DEFAULT_PENETRANCE};
use bdmi_power::genotypes::load_matrix;
use bdmi_power::output::{self, SentinelStyle};
use bdmi_power::power::{self, ModeReport, PowerSettings};
use bdmi_power::statistics::BreslowDay;
use bdmi_power::types::{ChromosomeLayout, FocalGenotype, ScanMode};
use bdmi_power::{logging, progress};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackgroundScopeArg {
    /// Only double-focal individuals that escaped penetrance
    DoubleFocal,
    /// Every individual
    All,
}

impl From<BackgroundScopeArg> for BackgroundScope {
    fn from(arg: BackgroundScopeArg) -> Self {
        match arg {
            BackgroundScopeArg::DoubleFocal => BackgroundScope::DoubleFocalOnly,
            BackgroundScopeArg::All => BackgroundScope::AllIndividuals,
        }
    }
}

#[derive(Parser)]
#[command(name = "bdmi-power")]
#[command(version)]
#[command(about = "Power analysis for two-locus recessive incompatibilities", long_about = None)]
struct Args {
    /// Genotype matrix, individuals as rows and windows as columns (can be gzipped)
    #[arg(short, long)]
    input: String,

    /// Output file prefix
    #[arg(short, long)]
    output: String,

    /// Number of sterile individuals
    #[arg(short, long)]
    sterile: usize,

    /// Number of fertile individuals
    #[arg(short, long)]
    fertile: usize,

    /// Background sterility as an integer percentage
    #[arg(long, visible_alias = "bs", value_parser = clap::value_parser!(u32).range(0..=100))]
    background_sterility: u32,

    /// Run the X-autosome bidirectional scan
    #[arg(long)]
    xa: bool,

    /// Run the autosome-autosome bidirectional scan
    #[arg(long)]
    aa: bool,

    /// Run the uniparental-by-X and uniparental-by-autosome scans
    #[arg(long)]
    uniparental: bool,

    /// Reverse the bidirectional focal genotype (window 1 = 2, window 2 = 0)
    #[arg(long)]
    rev: bool,

    /// Focal genotype of the uniparental marker (required with --uniparental)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=2))]
    uni_focal: Option<u8>,

    /// Focal genotype of the X/autosome window (required with --uniparental)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=2))]
    window2_focal: Option<u8>,

    /// Probability that a double-focal individual is sterile
    #[arg(long, default_value_t = DEFAULT_PENETRANCE)]
    penetrance: f64,

    /// Which individuals get a background-sterility draw (default depends on the scan)
    #[arg(long, value_enum)]
    background_scope: Option<BackgroundScopeArg>,

    /// End (exclusive) of the X chromosome windows
    #[arg(long, default_value_t = 545)]
    x_end: usize,

    /// End (exclusive) of the chromosome 2 windows
    #[arg(long, default_value_t = 1524)]
    chr2_end: usize,

    /// End (exclusive) of the chromosome 3 windows
    #[arg(long, default_value_t = 2579)]
    chr3_end: usize,

    /// Random seed (drawn from OS entropy when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Number of threads for the null scan
    #[arg(long, default_value_t = num_cpus())]
    threads: usize,

    /// Apply Tarone's adjustment to the Breslow-Day statistic
    #[arg(long)]
    tarone: bool,

    /// Write a per-target summary CSV
    #[arg(long)]
    summary: Option<String>,

    /// Write every null-scan outcome to a CSV
    #[arg(long)]
    null_pvalues: Option<String>,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,

    /// Log per-pair diagnostics
    #[arg(short, long)]
    verbose: bool,
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn make_progress_bar(quiet: bool, len: u64) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template("  [{elapsed_precise}/{eta_precise}] {bar:40} {pos}/{len} {msg}") {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

fn make_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("  {spinner} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb
}

fn selected_modes(args: &Args) -> Vec<ScanMode> {
    let mut modes = Vec::new();
    if args.xa {
        modes.push(ScanMode::XAutosome);
    }
    if args.aa {
        modes.push(ScanMode::AutosomeAutosome);
    }
    if args.uniparental {
        modes.push(ScanMode::Uniparental);
    }
    modes
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logger(args.verbose);

    rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global()
        .context("Failed to configure thread pool")?;

    let modes = selected_modes(&args);
    if modes.is_empty() {
        anyhow::bail!("No scan selected: pass at least one of --xa, --aa or --uniparental");
    }
    if !(0.0..=1.0).contains(&args.penetrance) {
        anyhow::bail!("--penetrance must be in [0, 1], got {}", args.penetrance);
    }
    let uniparental_focal = match (args.uni_focal, args.window2_focal) {
        (Some(g1), Some(g2)) => Some(FocalGenotype::new(g1, g2)),
        (None, None) => None,
        _ => anyhow::bail!("--uni-focal and --window2-focal must be given together"),
    };
    if args.uniparental && uniparental_focal.is_none() {
        anyhow::bail!("--uniparental requires --uni-focal and --window2-focal");
    }
    if !Path::new(&args.input).exists() {
        anyhow::bail!("Input file not found: {}", args.input);
    }

    if let Some(parent) = Path::new(&args.output).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
        }
    }

    let seed = args.seed.unwrap_or_else(|| rand::thread_rng().gen::<u64>());
    let mut rng = StdRng::seed_from_u64(seed);

    let layout = ChromosomeLayout {
        x_end: args.x_end,
        chr2_end: args.chr2_end,
        chr3_end: args.chr3_end,
    };
    let settings = PowerSettings {
        sterile: args.sterile,
        fertile: args.fertile,
        penetrance: args.penetrance,
        background_percent: args.background_sterility,
        background_scope: args.background_scope.map(BackgroundScope::from),
        reverse_focal: args.rev,
        uniparental_focal,
    };
    let test = BreslowDay::new(args.tarone);

    progress!(args.quiet, "BDMI Power Analysis");
    progress!(args.quiet, "=========================================");
    progress!(args.quiet, "Input matrix: {}", args.input);
    progress!(args.quiet, "Output prefix: {}", args.output);
    progress!(args.quiet, "Sterile / fertile: {} / {}", args.sterile, args.fertile);
    progress!(args.quiet, "Penetrance: {}", args.penetrance);
    progress!(args.quiet, "Background sterility: {}%", args.background_sterility);
    progress!(args.quiet, "Windows: X [0, {}), chr2 [{}, {}), chr3 [{}, {})",
        layout.x_end, layout.x_end, layout.chr2_end, layout.chr2_end, layout.chr3_end);
    progress!(args.quiet, "Scans: {}", modes.iter().map(|m| m.label()).collect::<Vec<_>>().join(", "));
    progress!(args.quiet, "Tarone adjustment: {}", args.tarone);
    progress!(args.quiet, "Seed: {}", seed);
    progress!(args.quiet, "Threads: {}", args.threads);
    progress!(args.quiet);

    // Step 1: Load genotypes
    progress!(args.quiet, "Step 1: Loading genotype matrix...");
    let pb_load = make_spinner(args.quiet);
    pb_load.set_message("reading");
    let matrix = load_matrix(Path::new(&args.input))?;
    pb_load.finish_and_clear();
    progress!(args.quiet, "  {} individuals x {} windows", matrix.n_individuals(), matrix.n_windows());

    layout.validate(matrix.n_windows())?;
    if matrix.n_windows() > layout.chr3_end {
        log::warn!(
            "Ignoring {} windows past chr3_end = {}",
            matrix.n_windows() - layout.chr3_end,
            layout.chr3_end
        );
    }

    let mut reports: Vec<ModeReport> = Vec::with_capacity(modes.len());
    for (i, &mode) in modes.iter().enumerate() {
        progress!(args.quiet);
        progress!(args.quiet, "Step {}: {} scan...", i + 2, mode.label());

        let pb = make_progress_bar(args.quiet, power::null_scan_size(mode, &layout) as u64);
        let report = power::run_mode(&matrix, mode, &layout, &settings, &test, &mut rng, Some(&pb))
            .with_context(|| format!("{} scan failed", mode.label()))?;
        pb.finish_and_clear();

        report_mode(args.quiet, &report);

        let path = output::legacy_path(&args.output, mode);
        output::write_legacy(&report, &path)?;
        progress!(args.quiet, "  Written to: {}", path.display());

        reports.push(report);
    }

    if let Some(ref summary_path) = args.summary {
        output::write_summary(&reports, seed, Path::new(summary_path))?;
        progress!(args.quiet, "Summary written to: {}", summary_path);
    }
    if let Some(ref null_path) = args.null_pvalues {
        output::write_null_pvalues(&reports, Path::new(null_path))?;
        progress!(args.quiet, "Null p-values written to: {}", null_path);
    }

    progress!(args.quiet);
    progress!(args.quiet, "Done!");

    Ok(())
}

fn report_mode(quiet: bool, report: &ModeReport) {
    let style = SentinelStyle::for_mode(report.mode);
    for t in &report.targets {
        let minimum = t.null_minimum();
        let counts = t.null.counts();
        progress!(quiet, "  [{}] incompatibility pair: {} x {}", t.design.label, t.pair.locus1, t.pair.locus2);
        progress!(quiet, "  [{}] empirical p-value: {} ({})",
            t.design.label, style.format(t.empirical), t.empirical.status());
        progress!(quiet, "  [{}] null minimum: {}{}",
            t.design.label,
            style.format(minimum.outcome()),
            if minimum.is_genuine() { "" } else { " (no genuine null p-value)" });
        progress!(quiet, "  [{}] null pairs: {} tested, {} not eligible, {} failed",
            t.design.label, counts.genuine, counts.not_eligible, counts.failed);
    }
}
