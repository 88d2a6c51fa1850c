use crate::util::binning::{bin_edges, histogram, histogram2d};
use crate::util::chain_types::{
    AxisRange, ChainStore, ColorScale, FrameJob, FrameStyle, PairStyle, Trace,
};
use crate::util::colormap::viridis;
use crate::util::ranges::FrameRanges;
use plotters::coord::{Shift, cartesian::Cartesian2d, types::RangedCoordf64};
use plotters::prelude::*;

const FONT: &str = "sans-serif";
const TITLE_SIZE: i32 = 24;
const TICK_SIZE: i32 = 11;
const LABEL_SIZE: i32 = 14;

const PANEL_MARGIN: u32 = 4;
const LABEL_AREA: u32 = 36;
const COLORBAR_WIDTH: u32 = 110;
const COLORBAR_STEPS: usize = 128;

const SAMPLE_COLOR: RGBColor = RGBColor(70, 130, 180);
const TRUTH_COLOR: RGBColor = RGBColor(220, 80, 40);

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;
type Chart<'a, 'b> = ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// Everything that is shared by all frames of a run. Each frame only
/// differs in the sample index it draws from.
pub struct FrameContext<'a> {
    pub store: &'a ChainStore,
    /// data column indices of the plotted parameters
    pub params: Vec<usize>,
    /// names of the plotted parameters
    pub names: Vec<String>,
    /// reference values, aligned with `params`
    pub truths: Vec<Option<f64>>,
    pub ranges: FrameRanges,
    pub color: Option<ColorScale>,
    pub trace: Option<Trace>,
    pub style: FrameStyle,
}

/// Which axes of a panel carry tick labels and a description.
struct PanelAxes<'a> {
    x_desc: Option<&'a str>,
    y_desc: Option<&'a str>,
    show_y: bool,
}

fn configure_axes(chart: &mut Chart<'_, '_>, axes: &PanelAxes) -> anyhow::Result<()> {
    let mut mesh = chart.configure_mesh();
    mesh.disable_mesh()
        .x_labels(4)
        .y_labels(4)
        .label_style((FONT, TICK_SIZE).into_font())
        .axis_desc_style((FONT, LABEL_SIZE).into_font());
    match axes.x_desc {
        Some(d) => {
            mesh.x_desc(d);
        }
        None => {
            mesh.disable_x_axis();
        }
    }
    if let Some(d) = axes.y_desc {
        mesh.y_desc(d);
    }
    if !axes.show_y {
        mesh.disable_y_axis();
    }
    mesh.draw()?;
    Ok(())
}

fn vertical_line(x: f64, range: &AxisRange) -> PathElement<(f64, f64)> {
    PathElement::new(vec![(x, range.lo), (x, range.hi)], TRUTH_COLOR.stroke_width(2))
}

fn horizontal_line(y: f64, range: &AxisRange) -> PathElement<(f64, f64)> {
    PathElement::new(vec![(range.lo, y), (range.hi, y)], TRUTH_COLOR.stroke_width(2))
}

/// Marginal histogram of one parameter, on a diagonal panel.
fn draw_marginal(
    area: &Area,
    values: &[f64],
    range: &AxisRange,
    truth: Option<f64>,
    style: &FrameStyle,
    x_desc: Option<&str>,
) -> anyhow::Result<()> {
    let counts = histogram(values, range, style.bins);
    let peak = counts.iter().copied().max().unwrap_or(0).max(1) as f64 * 1.1;
    let y_range = AxisRange::new(0.0, peak);

    let mut chart = ChartBuilder::on(area)
        .margin(PANEL_MARGIN)
        .x_label_area_size(LABEL_AREA)
        .y_label_area_size(LABEL_AREA)
        .build_cartesian_2d(range.lo..range.hi, y_range.lo..y_range.hi)?;
    configure_axes(
        &mut chart,
        &PanelAxes {
            x_desc,
            y_desc: None,
            show_y: false,
        },
    )?;

    chart.draw_series(counts.iter().enumerate().filter(|(_, c)| **c > 0).map(
        |(b, &c)| {
            let (x0, x1) = bin_edges(b, range, style.bins);
            Rectangle::new([(x0, 0.0), (x1, c as f64)], SAMPLE_COLOR.mix(0.6).filled())
        },
    ))?;
    if let Some(t) = truth {
        chart.draw_series(std::iter::once(vertical_line(t, &y_range)))?;
    }
    Ok(())
}

/// The pair `(xs, ys)` on an off-diagonal panel, as a scatter of the
/// individual chains or as a shaded 2D histogram.
fn draw_pair(
    area: &Area,
    (xs, ys): (&[f64], &[f64]),
    (x_range, y_range): (&AxisRange, &AxisRange),
    (x_truth, y_truth): (Option<f64>, Option<f64>),
    colors: Option<&[f64]>,
    style: &FrameStyle,
    axes: &PanelAxes,
) -> anyhow::Result<()> {
    let mut chart = ChartBuilder::on(area)
        .margin(PANEL_MARGIN)
        .x_label_area_size(LABEL_AREA)
        .y_label_area_size(LABEL_AREA)
        .build_cartesian_2d(x_range.lo..x_range.hi, y_range.lo..y_range.hi)?;
    configure_axes(&mut chart, axes)?;

    match style.pair_style {
        PairStyle::Scatter => {
            // points outside of the (possibly user-limited) axes are dropped
            let points: Vec<(f64, f64, RGBAColor)> = xs
                .iter()
                .zip(ys.iter())
                .enumerate()
                .filter(|(_, (x, y))| x_range.contains(**x) && y_range.contains(**y))
                .map(|(i, (&x, &y))| {
                    let color = match colors {
                        Some(c) => viridis(c[i]).mix(0.85),
                        None => SAMPLE_COLOR.mix(0.6),
                    };
                    (x, y, color)
                })
                .collect();
            chart.draw_series(
                points
                    .into_iter()
                    .map(|(x, y, c)| Circle::new((x, y), style.marker_size, c.filled())),
            )?;
        }
        PairStyle::Density => {
            let counts = histogram2d(xs, ys, x_range, y_range, style.bins);
            let peak = counts.iter().flatten().copied().max().unwrap_or(0).max(1) as f64;
            chart.draw_series(counts.iter().enumerate().flat_map(|(bx, col)| {
                col.iter()
                    .enumerate()
                    .filter(|(_, c)| **c > 0)
                    .map(move |(by, &c)| {
                        let (x0, x1) = bin_edges(bx, x_range, style.bins);
                        let (y0, y1) = bin_edges(by, y_range, style.bins);
                        Rectangle::new([(x0, y0), (x1, y1)], viridis(c as f64 / peak).filled())
                    })
            }))?;
        }
    }

    if let Some(t) = x_truth {
        chart.draw_series(std::iter::once(vertical_line(t, y_range)))?;
    }
    if let Some(t) = y_truth {
        chart.draw_series(std::iter::once(horizontal_line(t, x_range)))?;
    }
    Ok(())
}

/// The per-iteration trace of an auxiliary column, with the iteration
/// of the current frame marked.
fn draw_trace(area: &Area, trace: &Trace, iteration: u64) -> anyhow::Result<()> {
    let first = trace.points.first().map_or(0.0, |p| p.0 as f64);
    let last = trace.points.last().map_or(1.0, |p| p.0 as f64);
    let t_range = AxisRange::new(first, last);

    let mut chart = ChartBuilder::on(area)
        .margin(PANEL_MARGIN * 3)
        .x_label_area_size(LABEL_AREA)
        .y_label_area_size(LABEL_AREA + 12)
        .build_cartesian_2d(t_range.lo..t_range.hi, trace.range.lo..trace.range.hi)?;
    configure_axes(
        &mut chart,
        &PanelAxes {
            x_desc: Some("iteration"),
            y_desc: Some(trace.column.as_str()),
            show_y: true,
        },
    )?;

    chart.draw_series(LineSeries::new(
        trace.points.iter().map(|&(it, m)| (it as f64, m)),
        SAMPLE_COLOR.stroke_width(1),
    ))?;
    chart.draw_series(std::iter::once(vertical_line(
        iteration as f64,
        &trace.range,
    )))?;
    if let Some(&(it, m)) = trace.points.iter().find(|(it, _)| *it == iteration) {
        chart.draw_series(std::iter::once(Circle::new(
            (it as f64, m),
            4,
            TRUTH_COLOR.filled(),
        )))?;
    }
    Ok(())
}

fn draw_colorbar(area: &Area, scale: &ColorScale) -> anyhow::Result<()> {
    let r = scale.range;
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .margin_top(40)
        .margin_bottom(40)
        .y_label_area_size(LABEL_AREA + 24)
        .build_cartesian_2d(0.0..1.0, r.lo..r.hi)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_labels(6)
        .y_desc(scale.column.as_str())
        .label_style((FONT, TICK_SIZE).into_font())
        .axis_desc_style((FONT, LABEL_SIZE).into_font())
        .draw()?;

    let dy = r.width() / COLORBAR_STEPS as f64;
    chart.draw_series((0..COLORBAR_STEPS).map(|i| {
        let y0 = r.lo + dy * i as f64;
        let t = (i as f64 + 0.5) / COLORBAR_STEPS as f64;
        Rectangle::new([(0.0, y0), (1.0, y0 + dy)], viridis(t).filled())
    }))?;
    Ok(())
}

/// Draw the corner plot for `job` and write it to `job.path`.
pub fn render_frame(ctx: &FrameContext, job: &FrameJob) -> anyhow::Result<()> {
    let ranges = ctx
        .ranges
        .resolve(ctx.store, &ctx.params, &ctx.names, job.position)?;

    let root = BitMapBackend::new(&job.path, (ctx.style.width, ctx.style.height))
        .into_drawing_area();
    root.fill(&WHITE)?;
    let titled = root.titled(
        &format!("iteration {}", job.iteration),
        (FONT, TITLE_SIZE).into_font(),
    )?;

    let (grid, colorbar) = match &ctx.color {
        Some(scale) => {
            let (w, _) = titled.dim_in_pixel();
            let (g, b) = titled.split_horizontally(w.saturating_sub(COLORBAR_WIDTH) as i32);
            (g, Some((b, scale)))
        }
        None => (titled, None),
    };

    let n = ctx.params.len();
    let cells = grid.split_evenly((n, n));

    let draws: Vec<Vec<f64>> = ctx
        .params
        .iter()
        .map(|&c| ctx.store.draws(job.position, c).to_vec())
        .collect();
    let colors: Option<Vec<f64>> = ctx.color.as_ref().map(|s| {
        ctx.store
            .draws(job.position, s.index)
            .iter()
            .map(|&v| s.normalize(v))
            .collect()
    });

    for row in 0..n {
        for col in 0..n {
            let cell = &cells[row * n + col];
            let x_desc = (row == n - 1).then(|| ctx.names[col].as_str());
            if row == col {
                draw_marginal(
                    cell,
                    &draws[col],
                    &ranges[col],
                    ctx.truths[col],
                    &ctx.style,
                    x_desc,
                )?;
            } else if row > col {
                let axes = PanelAxes {
                    x_desc,
                    y_desc: (col == 0).then(|| ctx.names[row].as_str()),
                    show_y: col == 0,
                };
                draw_pair(
                    cell,
                    (&draws[col], &draws[row]),
                    (&ranges[col], &ranges[row]),
                    (ctx.truths[col], ctx.truths[row]),
                    colors.as_deref(),
                    &ctx.style,
                    &axes,
                )?;
            } else if row == 0 && col == n - 1 {
                if let Some(trace) = &ctx.trace {
                    draw_trace(cell, trace, job.iteration)?;
                }
            }
        }
    }

    if let Some((area, scale)) = colorbar {
        draw_colorbar(&area, scale)?;
    }

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::ranges::{color_scale, parameter_ranges, trace};
    use std::path::Path;

    // 6 iterations x 8 chains; columns a, b, lnl
    fn toy_store() -> ChainStore {
        let mut iters = vec![];
        let mut chains = vec![];
        let (mut a, mut b, mut lnl) = (vec![], vec![], vec![]);
        for i in 0..6_u64 {
            for c in 0..8_u64 {
                iters.push(i * 10);
                chains.push(c);
                a.push(i as f64 + 0.1 * c as f64);
                b.push(0.5 * c as f64 - 0.2 * i as f64);
                lnl.push(-((i + c) as f64));
            }
        }
        ChainStore::from_long_columns(
            &iters,
            &chains,
            vec!["a".to_string(), "b".to_string(), "lnl".to_string()],
            vec![a, b, lnl],
        )
        .unwrap()
    }

    fn context(store: &ChainStore, params: Vec<usize>, style: FrameStyle) -> FrameContext<'_> {
        let positions: Vec<usize> = (0..store.num_iterations()).collect();
        let names = params.iter().map(|&c| store.columns[c].clone()).collect();
        let ranges = FrameRanges::Fixed(parameter_ranges(store, &params, &positions, 0.0));
        FrameContext {
            store,
            truths: vec![None; params.len()],
            params,
            names,
            ranges,
            color: None,
            trace: None,
            style,
        }
    }

    fn render(ctx: &FrameContext, dir: &Path, name: &str) -> u64 {
        let job = FrameJob {
            frame: 0,
            position: 3,
            iteration: ctx.store.label(3),
            path: dir.join(name),
        };
        render_frame(ctx, &job).unwrap();
        std::fs::metadata(&job.path).unwrap().len()
    }

    fn style(pair_style: PairStyle) -> FrameStyle {
        FrameStyle::builder()
            .width(600)
            .height(600)
            .pair_style(pair_style)
            .bins(10)
            .build()
    }

    #[test]
    fn scatter_frame_with_colorbar_and_trace() {
        let dir = tempfile::tempdir().unwrap();
        let store = toy_store();
        let mut ctx = context(&store, vec![0, 1], style(PairStyle::Scatter));
        ctx.color = Some(color_scale(&store, 2, &[0, 1, 2, 3, 4, 5]).unwrap());
        ctx.trace = Some(trace(&store, 2, 0, 5).unwrap());
        ctx.truths = vec![Some(2.5), Some(0.0)];
        assert!(render(&ctx, dir.path(), "scatter.png") > 0);
    }

    #[test]
    fn density_frame() {
        let dir = tempfile::tempdir().unwrap();
        let store = toy_store();
        let ctx = context(&store, vec![0, 1, 2], style(PairStyle::Density));
        assert!(render(&ctx, dir.path(), "density.png") > 0);
    }

    #[test]
    fn single_parameter_frame() {
        let dir = tempfile::tempdir().unwrap();
        let store = toy_store();
        let mut ctx = context(&store, vec![1], style(PairStyle::Scatter));
        // with one parameter there is no panel for the trace; it is skipped
        ctx.trace = Some(trace(&store, 2, 0, 5).unwrap());
        assert!(render(&ctx, dir.path(), "single.png") > 0);
    }

    #[test]
    fn per_frame_ranges_with_limits() {
        let dir = tempfile::tempdir().unwrap();
        let store = toy_store();
        let mut ctx = context(&store, vec![0, 1], style(PairStyle::Scatter));
        ctx.ranges = FrameRanges::PerFrame {
            quantile: 0.1,
            limits: vec![crate::util::chain_types::Limit {
                name: "b".to_string(),
                range: AxisRange::new(-1.0, 1.0),
            }],
        };
        assert!(render(&ctx, dir.path(), "per_frame.png") > 0);
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = toy_store();
        let ctx = context(&store, vec![0, 1], style(PairStyle::Scatter));
        let job = FrameJob {
            frame: 0,
            position: 0,
            iteration: 0,
            path: dir.path().join("missing/dir/frame.png"),
        };
        assert!(render_frame(&ctx, &job).is_err());
    }
}
