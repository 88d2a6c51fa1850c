use crate::util::chain_types::{AxisRange, Limit, PairStyle, RangeMode, Truth};
use crate::util::iteration_select::IterationSelection;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

/// Split `arg` of the form `name=rest` into its two (non-empty) halves.
fn split_named<'a>(arg: &'a str, what: &str) -> anyhow::Result<(&'a str, &'a str)> {
    match arg.split_once('=') {
        Some((name, rest)) if !name.trim().is_empty() && !rest.trim().is_empty() => {
            Ok((name.trim(), rest.trim()))
        }
        _ => anyhow::bail!("Cannot parse {:?} as a {}", arg, what),
    }
}

/// Parse an axis limit given as `name=lo:hi`.
fn parse_limit(arg: &str) -> anyhow::Result<Limit> {
    let (name, bounds) = split_named(arg, "limit of the form name=lo:hi")?;
    let Some((lo, hi)) = bounds.split_once(':') else {
        anyhow::bail!("Cannot parse {:?} as a limit of the form name=lo:hi", arg);
    };
    let lo = lo.trim().parse::<f64>()?;
    let hi = hi.trim().parse::<f64>()?;
    if !(lo.is_finite() && hi.is_finite() && lo < hi) {
        anyhow::bail!(
            "The limits for {} must be finite with lo < hi, but got {}:{}",
            name,
            lo,
            hi
        );
    }
    Ok(Limit {
        name: name.to_string(),
        range: AxisRange { lo, hi },
    })
}

/// Parse a reference value given as `name=value`.
fn parse_truth(arg: &str) -> anyhow::Result<Truth> {
    let (name, value) = split_named(arg, "reference value of the form name=value")?;
    let value = value.parse::<f64>()?;
    Ok(Truth {
        name: name.to_string(),
        value,
    })
}

fn parse_quantile(arg: &str) -> anyhow::Result<f64> {
    let q = arg.parse::<f64>()?;
    if !(0.0..0.5).contains(&q) {
        anyhow::bail!("The range quantile must be in [0, 0.5), but got {}", q);
    }
    Ok(q)
}

/// render the evolution of an MCMC run as a sequence of corner plots,
/// and optionally stitch them into a movie
#[derive(Parser, Debug, Serialize)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// be quiet (i.e. don't output log messages that aren't at least warnings)
    #[arg(long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// be verbose (i.e. output all non-developer logging messages)
    #[arg(long)]
    pub verbose: bool,

    /// path to the results store holding the chain; delimited text
    /// (CSV, or TSV if the name contains `.tsv`, possibly compressed) or parquet
    #[arg(short, long)]
    pub input: PathBuf,

    /// comma separated list of the parameters to plot; by default every
    /// column not used with --color-by or --trace is plotted
    #[arg(short, long, value_delimiter = ',')]
    pub params: Option<Vec<String>>,

    /// first sample index to consider
    #[arg(long, help_heading = "iteration selection", default_value_t = 0)]
    pub start: usize,

    /// last sample index to consider (inclusive); defaults to the last
    /// stored iteration
    #[arg(long, help_heading = "iteration selection")]
    pub end: Option<usize>,

    /// number of frames to render
    #[arg(
        short = 'n',
        long,
        help_heading = "iteration selection",
        default_value_t = 100,
        conflicts_with = "step"
    )]
    pub nframes: usize,

    /// space the frames logarithmically, so early iterations are sampled
    /// more densely than late ones
    #[arg(long, help_heading = "iteration selection", conflicts_with = "step")]
    pub log_spacing: bool,

    /// render every `step`-th sample index instead of a fixed number of frames
    #[arg(long, help_heading = "iteration selection")]
    pub step: Option<usize>,

    /// prefix of the rendered frames; frame `k` is written to `{prefix}_{k:05}.png`
    #[arg(short, long, default_value = "frames/frame")]
    pub output_prefix: String,

    /// stitch the frames into a movie at this path
    #[arg(short, long, help_heading = "movie")]
    pub movie: Option<PathBuf>,

    /// frame rate of the movie
    #[arg(long, help_heading = "movie", default_value_t = 10)]
    pub fps: u32,

    /// the ffmpeg executable used for encoding
    #[arg(long, help_heading = "movie", default_value = "ffmpeg")]
    pub ffmpeg: String,

    /// remove the rendered frames after the movie has been written
    #[arg(long, help_heading = "movie", requires = "movie")]
    pub cleanup: bool,

    /// color the markers by this column (e.g. the log-likelihood)
    #[arg(long, help_heading = "appearance")]
    pub color_by: Option<String>,

    /// show the across-chain mean of this column as an inset trace
    #[arg(long, help_heading = "appearance")]
    pub trace: Option<String>,

    /// how to draw the pairwise panels
    #[arg(long, help_heading = "appearance", value_enum, default_value_t = PairStyle::Scatter)]
    pub pair_style: PairStyle,

    /// number of histogram bins per axis
    #[arg(long, help_heading = "appearance", default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..))]
    pub bins: u32,

    /// share axis ranges between frames, or recompute them for each frame
    #[arg(long, help_heading = "appearance", value_enum, default_value_t = RangeMode::Fixed)]
    pub range_mode: RangeMode,

    /// trim this quantile from both tails when computing axis ranges
    #[arg(long, help_heading = "appearance", default_value_t = 0.0, value_parser = parse_quantile)]
    pub range_quantile: f64,

    /// explicit axis limits, given as name=lo:hi (may be repeated)
    #[arg(long, help_heading = "appearance", value_parser = parse_limit)]
    pub limits: Vec<Limit>,

    /// reference values drawn over the panels, given as name=value (may be repeated)
    #[arg(long, help_heading = "appearance", value_parser = parse_truth)]
    pub truth: Vec<Truth>,

    /// width of each frame in pixels
    #[arg(long, help_heading = "appearance", default_value_t = 1000)]
    pub width: u32,

    /// height of each frame in pixels
    #[arg(long, help_heading = "appearance", default_value_t = 1000)]
    pub height: u32,

    /// number of frames to render concurrently
    #[arg(short = 'j', long, default_value_t = 4)]
    pub threads: usize,
}

impl Args {
    /// How the frames are to be drawn from the iteration range.
    pub fn selection(&self) -> IterationSelection {
        match self.step {
            Some(step) => IterationSelection::Step { step },
            None if self.log_spacing => IterationSelection::Log { num: self.nframes },
            None => IterationSelection::Linear { num: self.nframes },
        }
    }
}
