use anyhow::bail;
use ndarray::{Array3, ArrayView1, s};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tabled::builder::Builder;
use tabled::settings::Style;
use typed_builder::TypedBuilder;

/// The dense contents of a results store. Each stored iteration holds
/// one draw per chain (or ensemble walker) for every data column.
#[derive(Debug, Clone)]
pub struct ChainStore {
    /// names of the data columns, in file order
    pub columns: Vec<String>,
    /// distinct iteration labels, ascending; the position of a label
    /// in this vector is its sample index
    pub iterations: Vec<u64>,
    /// distinct chain labels, ascending
    pub chains: Vec<u64>,
    /// iterations x chains x columns
    pub values: Array3<f64>,
}

fn sorted_distinct(labels: &[u64]) -> Vec<u64> {
    let mut v = labels.to_vec();
    v.sort_unstable();
    v.dedup();
    v
}

impl ChainStore {
    /// Build a [ChainStore] from a long-format table, where row `r` holds
    /// iteration `iteration_col[r]` of chain `chain_col[r]`, and
    /// `data[k][r]` is the value of column `k`. Rows may come in any
    /// order, but every (iteration, chain) cell must appear exactly once.
    pub fn from_long_columns(
        iteration_col: &[u64],
        chain_col: &[u64],
        columns: Vec<String>,
        data: Vec<Vec<f64>>,
    ) -> anyhow::Result<Self> {
        let nrows = iteration_col.len();
        if chain_col.len() != nrows || data.iter().any(|d| d.len() != nrows) {
            bail!("all columns of the results store must have the same number of rows");
        }
        if columns.len() != data.len() {
            bail!(
                "found {} column names but {} data columns",
                columns.len(),
                data.len()
            );
        }
        if nrows == 0 {
            bail!("the results store contains no samples");
        }
        if columns.is_empty() {
            bail!("the results store contains no data columns");
        }

        let iterations = sorted_distinct(iteration_col);
        let chains = sorted_distinct(chain_col);
        let iter_pos: FxHashMap<u64, usize> =
            iterations.iter().enumerate().map(|(i, &l)| (l, i)).collect();
        let chain_pos: FxHashMap<u64, usize> =
            chains.iter().enumerate().map(|(i, &l)| (l, i)).collect();

        let ncols = columns.len();
        let mut values = Array3::<f64>::zeros((iterations.len(), chains.len(), ncols));
        let mut seen = vec![false; iterations.len() * chains.len()];

        for r in 0..nrows {
            let i = iter_pos[&iteration_col[r]];
            let c = chain_pos[&chain_col[r]];
            let cell = i * chains.len() + c;
            if seen[cell] {
                bail!(
                    "iteration {} of chain {} appears more than once in the results store",
                    iteration_col[r],
                    chain_col[r]
                );
            }
            seen[cell] = true;
            for (k, col) in data.iter().enumerate() {
                values[[i, c, k]] = col[r];
            }
        }

        if let Some(missing) = seen.iter().position(|x| !x) {
            bail!(
                "the results store is incomplete: iteration {} of chain {} is missing",
                iterations[missing / chains.len()],
                chains[missing % chains.len()]
            );
        }

        Ok(Self {
            columns,
            iterations,
            chains,
            values,
        })
    }

    pub fn num_iterations(&self) -> usize {
        self.iterations.len()
    }

    pub fn num_chains(&self) -> usize {
        self.chains.len()
    }

    /// Index of the data column called `name`.
    pub fn column_index(&self, name: &str) -> anyhow::Result<usize> {
        match self.columns.iter().position(|c| c == name) {
            Some(i) => Ok(i),
            None => bail!(
                "no column named {:?} in the results store; available columns are [{}]",
                name,
                self.columns.join(", ")
            ),
        }
    }

    /// The draws of every chain for column `col` at sample index `position`.
    pub fn draws(&self, position: usize, col: usize) -> ArrayView1<'_, f64> {
        self.values.slice(s![position, .., col])
    }

    /// The stored iteration label for a sample index.
    pub fn label(&self, position: usize) -> u64 {
        self.iterations[position]
    }
}

/// Plotting limits along one parameter axis; always `lo < hi`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisRange {
    pub lo: f64,
    pub hi: f64,
}

impl AxisRange {
    /// A range spanning `[lo, hi]`, widened if it is empty or degenerate.
    pub fn new(lo: f64, hi: f64) -> Self {
        if hi > lo {
            return Self { lo, hi };
        }
        let half = if lo == 0.0 { 0.5 } else { 0.05 * lo.abs() };
        Self {
            lo: lo - half,
            hi: lo + half,
        }
    }

    /// Grow the range by `frac` of its width on either side.
    pub fn padded(&self, frac: f64) -> Self {
        let pad = (self.hi - self.lo) * frac;
        Self {
            lo: self.lo - pad,
            hi: self.hi + pad,
        }
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.lo && v <= self.hi
    }

    pub fn width(&self) -> f64 {
        self.hi - self.lo
    }
}

impl fmt::Display for AxisRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{:.4}, {:.4}]", self.lo, self.hi)
    }
}

/// Color limits shared by every frame (and the colorbar) when
/// coloring markers by an auxiliary column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorScale {
    pub column: String,
    pub index: usize,
    pub range: AxisRange,
}

impl ColorScale {
    /// Position of `v` within the scale, clamped to [0, 1].
    pub fn normalize(&self, v: f64) -> f64 {
        ((v - self.range.lo) / self.range.width()).clamp(0.0, 1.0)
    }
}

/// Across-chain mean of one auxiliary column at every stored iteration
/// of the rendered range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    pub column: String,
    pub points: Vec<(u64, f64)>,
    pub range: AxisRange,
}

/// A reference value for a parameter, drawn over its panels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Truth {
    pub name: String,
    pub value: f64,
}

/// A user provided axis range for a parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Limit {
    pub name: String,
    pub range: AxisRange,
}

/// How the off-diagonal (pair) panels are drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum, Serialize)]
pub enum PairStyle {
    /// one marker per chain
    Scatter,
    /// a shaded 2D histogram
    Density,
}

/// Whether axis ranges are shared by all frames or recomputed per frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum, Serialize)]
pub enum RangeMode {
    Fixed,
    PerFrame,
}

/// The parameters controlling how each frame is drawn.
#[derive(TypedBuilder, Debug, Clone, Serialize)]
pub struct FrameStyle {
    /// image width in pixels
    #[builder(default = 1000)]
    pub width: u32,
    /// image height in pixels
    #[builder(default = 1000)]
    pub height: u32,
    #[builder(default = PairStyle::Scatter)]
    pub pair_style: PairStyle,
    /// number of bins for marginal histograms (and, squared,
    /// for density panels)
    #[builder(default = 30)]
    pub bins: usize,
    /// marker radius, in pixels, for scatter panels
    #[builder(default = 2)]
    pub marker_size: u32,
}

/// One frame to render: the sample index to draw and where to write it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameJob {
    pub frame: usize,
    pub position: usize,
    pub iteration: u64,
    pub path: PathBuf,
}

/// Summarizes which iterations were selected, for logging.
#[derive(Debug, Serialize)]
pub struct SelectionSummary {
    pub mode: &'static str,
    pub first: u64,
    pub last: u64,
    pub num_frames: usize,
    pub num_chains: usize,
    pub num_params: usize,
}

impl SelectionSummary {
    pub fn to_table(&self) -> tabled::tables::Table {
        let first = format!("{}", self.first);
        let last = format!("{}", self.last);
        let nframes = format!("{}", self.num_frames);
        let nchains = format!("{}", self.num_chains);
        let nparams = format!("{}", self.num_params);

        let data = vec![
            ["selection", self.mode],
            ["first iteration", &first],
            ["last iteration", &last],
            ["frames", &nframes],
            ["chains per frame", &nchains],
            ["parameters", &nparams],
        ];
        let mut binding = Builder::from_iter(data).build();
        let table = binding.with(Style::rounded());
        table.clone()
    }
}
