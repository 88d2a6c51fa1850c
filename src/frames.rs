use crate::corner::{FrameContext, render_frame};
use crate::prog_opts::Args;
use crate::util::chain_types::{
    ChainStore, FrameJob, FrameStyle, RangeMode, SelectionSummary, Truth,
};
use crate::util::file_utils::{
    check_encoder, create_frame_dir, encode_movie, frame_path, frame_pattern, remove_frames,
};
use crate::util::iteration_select::{IterationSelection, select_iterations};
use crate::util::ranges::{FrameRanges, apply_limits, color_scale, parameter_ranges, trace};
use crate::util::read_function::read_chain_store;
use crate::util::write_function::{side_file, write_frame_table, write_meta_info};
use anyhow::{Context, bail};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use num_format::{Locale, ToFormattedString};
use rayon::prelude::*;
use serde_json::json;
use std::time::Instant;
use tracing::{error, info, info_span, warn};

/// The data columns to plot, along with their names. If the user didn't
/// ask for specific parameters, every column not listed in `exclude` is used.
fn resolve_params(
    store: &ChainStore,
    requested: Option<&[String]>,
    exclude: &[usize],
) -> anyhow::Result<(Vec<usize>, Vec<String>)> {
    let params: Vec<usize> = match requested {
        Some(names) => names
            .iter()
            .map(|n| store.column_index(n))
            .collect::<anyhow::Result<_>>()?,
        None => (0..store.columns.len())
            .filter(|c| !exclude.contains(c))
            .collect(),
    };
    if params.is_empty() {
        bail!("there are no parameters left to plot; pass them explicitly with --params");
    }
    let names = params.iter().map(|&c| store.columns[c].clone()).collect();
    Ok((params, names))
}

/// Line up the user provided reference values with the plotted parameters.
fn resolve_truths(names: &[String], truths: &[Truth]) -> anyhow::Result<Vec<Option<f64>>> {
    let mut out = vec![None; names.len()];
    for t in truths {
        match names.iter().position(|n| *n == t.name) {
            Some(i) => out[i] = Some(t.value),
            None => bail!(
                "a reference value was given for {:?}, which is not one of the plotted parameters [{}]",
                t.name,
                names.join(", ")
            ),
        }
    }
    Ok(out)
}

/// Reduce the number of requested frames to the number of stored
/// iterations in `[start, end]` if more were asked for.
fn clamp_frames(selection: IterationSelection, start: usize, end: usize) -> IterationSelection {
    let available = end.saturating_sub(start).saturating_add(1);
    match selection.count() {
        Some(num) if num > available => {
            warn!(
                "{} frames were requested, but only {} iterations are available; rendering {}",
                num, available, available
            );
            selection.with_count(available)
        }
        _ => selection,
    }
}

fn selection_name(selection: &IterationSelection) -> &'static str {
    match selection {
        IterationSelection::Linear { .. } => "linear",
        IterationSelection::Log { .. } => "log",
        IterationSelection::Step { .. } => "step",
    }
}

/// One job per selected sample index, numbered consecutively from 0.
fn build_jobs(store: &ChainStore, positions: &[usize], prefix: &str) -> Vec<FrameJob> {
    positions
        .iter()
        .enumerate()
        .map(|(frame, &position)| FrameJob {
            frame,
            position,
            iteration: store.label(position),
            path: frame_path(prefix, frame),
        })
        .collect()
}

/// Render every job on a pool of `threads` workers. Every frame is
/// attempted; if any of them fail, each failure is logged and an error
/// summarizing them is returned once all frames are done.
pub fn render_all<F>(jobs: &[FrameJob], threads: usize, quiet: bool, render: F) -> anyhow::Result<()>
where
    F: Fn(&FrameJob) -> anyhow::Result<()> + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("could not build the rendering thread pool")?;

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(jobs.len() as u64).with_message("frames rendered");
        pb.set_draw_target(ProgressDrawTarget::stderr_with_hz(4));
        pb
    };
    pb.set_style(ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:20.green/blue} {msg} {human_pos:>12}",
    )?);

    let failures: Vec<(&FrameJob, anyhow::Error)> = pool.install(|| {
        jobs.par_iter()
            .filter_map(|job| {
                let res = render(job);
                pb.inc(1);
                res.err().map(|e| (job, e))
            })
            .collect()
    });
    pb.finish_with_message("frames rendered");

    if !failures.is_empty() {
        for (job, e) in &failures {
            error!(
                "failed to render frame {} (iteration {}): {:#}",
                job.frame, job.iteration, e
            );
        }
        bail!(
            "{} of {} frames failed to render; see the errors above",
            failures.len(),
            jobs.len()
        );
    }
    Ok(())
}

/// Render the frames (and optionally the movie) requested by `args`.
pub fn run(args: &Args) -> anyhow::Result<()> {
    let start_time = Instant::now();
    if let Some(movie) = &args.movie {
        info!("frames will be encoded into {}", movie.display());
        check_encoder(&args.ffmpeg)?;
    }

    let store = read_chain_store(&args.input)?;

    let color_col = args
        .color_by
        .as_deref()
        .map(|c| store.column_index(c))
        .transpose()?;
    let trace_col = args
        .trace
        .as_deref()
        .map(|c| store.column_index(c))
        .transpose()?;
    let exclude: Vec<usize> = color_col.iter().chain(trace_col.iter()).copied().collect();
    let (params, names) = resolve_params(&store, args.params.as_deref(), &exclude)?;
    let truths = resolve_truths(&names, &args.truth)?;
    if trace_col.is_some() && params.len() < 2 {
        warn!("the trace inset needs at least two plotted parameters; it will not be drawn");
    }

    // sample indices of the range to render
    let last = store.num_iterations() - 1;
    let end = args.end.unwrap_or(last);
    if end > last {
        bail!(
            "--end {} is past the last sample index ({}) of the results store",
            end,
            last
        );
    }
    let selection = clamp_frames(args.selection(), args.start, end);
    let positions = if args.start == end {
        info!("the range holds a single iteration; rendering one frame");
        vec![end]
    } else {
        select_iterations(selection, args.start, end)?
    };

    let summary = SelectionSummary {
        mode: selection_name(&selection),
        first: store.label(positions[0]),
        last: store.label(positions[positions.len() - 1]),
        num_frames: positions.len(),
        num_chains: store.num_chains(),
        num_params: params.len(),
    };
    info!("\nframe selection: \n{}\n", summary.to_table());

    let ranges = match args.range_mode {
        RangeMode::Fixed => {
            let mut r = parameter_ranges(&store, &params, &positions, args.range_quantile);
            apply_limits(&mut r, &names, &args.limits)?;
            for (n, r) in names.iter().zip(r.iter()) {
                info!("axis range for {}: {}", n, r);
            }
            FrameRanges::Fixed(r)
        }
        RangeMode::PerFrame => {
            // checks the limits up front rather than on every frame
            let mut probe = parameter_ranges(&store, &params, &positions[..1], 0.0);
            apply_limits(&mut probe, &names, &args.limits)?;
            FrameRanges::PerFrame {
                quantile: args.range_quantile,
                limits: args.limits.clone(),
            }
        }
    };

    let color = color_col
        .map(|c| color_scale(&store, c, &positions))
        .transpose()?;
    let trace_inset = trace_col
        .map(|c| trace(&store, c, args.start, end))
        .transpose()?;

    let style = FrameStyle::builder()
        .width(args.width)
        .height(args.height)
        .pair_style(args.pair_style)
        .bins(args.bins as usize)
        .build();

    let jobs = build_jobs(&store, &positions, &args.output_prefix);
    create_frame_dir(&args.output_prefix)?;

    let ctx = FrameContext {
        store: &store,
        params,
        names,
        truths,
        ranges,
        color,
        trace: trace_inset,
        style,
    };

    let render_start = Instant::now();
    {
        let _span = info_span!("render", frames = jobs.len()).entered();
        render_all(&jobs, args.threads, args.quiet, |job| render_frame(&ctx, job))?;
    }
    let render_time = render_start.elapsed();
    info!(
        "rendered {} frames in {}",
        jobs.len().to_formatted_string(&Locale::en),
        humantime::format_duration(render_time)
    );

    let table_path = side_file(&args.output_prefix, "frames.tsv");
    write_frame_table(&table_path, &jobs)
        .with_context(|| format!("could not write {}", table_path.display()))?;

    if let Some(movie) = &args.movie {
        let pattern = frame_pattern(&args.output_prefix);
        encode_movie(&args.ffmpeg, &pattern, args.fps, movie)?;
        info!("wrote movie to {}", movie.display());
        if args.cleanup {
            let removed = remove_frames(&jobs);
            info!("removed {} rendered frames", removed);
        }
    }

    let fixed_ranges = match &ctx.ranges {
        FrameRanges::Fixed(r) => Some(r),
        FrameRanges::PerFrame { .. } => None,
    };
    let meta_info = json!({
        "args": args,
        "selection": selection,
        "start": args.start,
        "end": end,
        "positions": positions,
        "iterations": jobs.iter().map(|j| j.iteration).collect::<Vec<u64>>(),
        "params": &ctx.names,
        "axis_ranges": fixed_ranges,
        "color_scale": &ctx.color,
        "trace_column": ctx.trace.as_ref().map(|t| &t.column),
        "style": &ctx.style,
        "render_time": humantime::format_duration(render_time).to_string(),
        "total_time": humantime::format_duration(start_time.elapsed()).to_string(),
    });
    let meta_path = side_file(&args.output_prefix, "meta_info.json");
    write_meta_info(&meta_path, &meta_info)
        .with_context(|| format!("could not write {}", meta_path.display()))?;

    Ok(())
}
