// src/plot/mod.rs
use crate::stats::{self, LinearFit};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};
use plotters::prelude::*;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use tracing::{debug, warn};

pub mod font;

/// Returned instead of an image when no (x, y) pair survives filtering.
pub const NO_POINTS: &str = "Error: No valid data points for plot";
pub const DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Figure size in inches; pixel size is this times the DPI.
const FIGURE_INCHES: (f64, f64) = (10.0, 6.0);
/// Markers used to draw the dotted regression line.
const REGRESSION_DOTS: usize = 60;
/// Colours of the compact re-render, in palette order: background, ink, markers, line.
const COMPACT_PALETTE: [RGBColor; 4] = [WHITE, BLACK, BLUE, RED];

/// How a render is drawn and encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    /// Blended markers, 24-bit RGB.
    Rgb,
    /// Opaque markers quantised to [`COMPACT_PALETTE`], 2 bits per pixel.
    Palette,
}

/// Two paired sequences plus the text that goes around them.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSpec {
    pub x: Vec<Option<f64>>,
    pub y: Vec<Option<f64>>,
    pub x_label: String,
    pub y_label: String,
    pub title: String,
}

impl PlotSpec {
    pub fn new(x: Vec<Option<f64>>, y: Vec<Option<f64>>) -> Self {
        Self {
            x,
            y,
            x_label: String::new(),
            y_label: String::new(),
            title: String::new(),
        }
    }

    pub fn labels(mut self, x_label: &str, y_label: &str, title: &str) -> Self {
        self.x_label = x_label.to_string();
        self.y_label = y_label.to_string();
        self.title = title.to_string();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlotOptions {
    /// Size budget for the encoded PNG.
    pub max_bytes: usize,
    pub dpi: u32,
    /// Used for the single re-render when the first PNG is over budget.
    pub fallback_dpi: u32,
    /// TrueType font tried before the system locations.
    pub font_path: Option<PathBuf>,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            max_bytes: 100_000,
            dpi: 100,
            fallback_dpi: 75,
            font_path: None,
        }
    }
}

/// Render with [`PlotOptions::default`].
pub fn render_scatterplot(spec: &PlotSpec) -> String {
    render_scatterplot_with(spec, &PlotOptions::default())
}

/// Scatter `spec.y` against `spec.x` with a dotted OLS line and return a PNG data URI.
///
/// Never fails: no valid pairs gives [`NO_POINTS`], any drawing or encoding failure gives
/// `"Error creating plot: <message>"`.
#[tracing::instrument(level = "debug", skip_all, fields(points = spec.x.len()))]
pub fn render_scatterplot_with(spec: &PlotSpec, opts: &PlotOptions) -> String {
    let points = stats::paired(&spec.x, &spec.y);
    if points.is_empty() {
        return NO_POINTS.to_string();
    }

    // A failed fit only loses the line.
    let fit = stats::linear_regression(&points);
    if fit.is_none() && points.len() > 1 {
        debug!("regression undefined, drawing scatter only");
    }

    match encode_within_budget(spec, &points, fit, opts) {
        Ok(png) => format!("{}{}", DATA_URI_PREFIX, STANDARD.encode(png)),
        Err(e) => {
            warn!("plot failed: {:#}", e);
            format!("Error creating plot: {}", e)
        }
    }
}

fn encode_within_budget(
    spec: &PlotSpec,
    points: &[(f64, f64)],
    fit: Option<LinearFit>,
    opts: &PlotOptions,
) -> Result<Vec<u8>> {
    let png = render_png(spec, points, fit, opts.dpi, Encoding::Rgb, opts)?;
    if png.len() <= opts.max_bytes {
        return Ok(png);
    }
    debug!(
        bytes = png.len(),
        budget = opts.max_bytes,
        dpi = opts.fallback_dpi,
        "png over budget, re-rendering once"
    );
    // 2 bits per pixel caps the raw image at 750x450 to about 85 kB
    render_png(spec, points, fit, opts.fallback_dpi, Encoding::Palette, opts)
}

pub fn figure_size(dpi: u32) -> (u32, u32) {
    (
        (FIGURE_INCHES.0 * dpi as f64).round() as u32,
        (FIGURE_INCHES.1 * dpi as f64).round() as u32,
    )
}

/// One render on a fresh pixel buffer, dropped on every exit path.
fn render_png(
    spec: &PlotSpec,
    points: &[(f64, f64)],
    fit: Option<LinearFit>,
    dpi: u32,
    encoding: Encoding,
    opts: &PlotOptions,
) -> Result<Vec<u8>> {
    let (w, h) = figure_size(dpi);
    let mut pixels = vec![0u8; w as usize * h as usize * 3];
    let with_text = font::ensure_registered(opts.font_path.as_deref());

    panic::catch_unwind(AssertUnwindSafe(|| {
        draw(&mut pixels, (w, h), spec, points, fit, dpi, encoding, with_text)
    }))
    .map_err(|payload| anyhow!("drawing panicked: {}", panic_message(payload.as_ref())))??;

    match encoding {
        Encoding::Rgb => encode_rgb(&pixels, w, h),
        Encoding::Palette => encode_palette(&pixels, w, h),
    }
}

fn encode_rgb(pixels: &[u8], w: u32, h: u32) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive)
        .write_image(pixels, w, h, ExtendedColorType::Rgb8)
        .context("encoding png")?;
    Ok(out)
}

/// Indexed PNG over [`COMPACT_PALETTE`]; every pixel maps to its nearest palette colour.
fn encode_palette(pixels: &[u8], w: u32, h: u32) -> Result<Vec<u8>> {
    let width = w as usize;
    let stride = (width + 3) / 4;
    let mut packed = vec![0u8; stride * h as usize];
    for (i, rgb) in pixels.chunks_exact(3).enumerate() {
        let (row, col) = (i / width, i % width);
        packed[row * stride + col / 4] |= nearest_palette_index(rgb) << (6 - 2 * (col % 4));
    }

    let palette: Vec<u8> = COMPACT_PALETTE
        .iter()
        .flat_map(|c| [c.0, c.1, c.2])
        .collect();

    let mut out = Vec::new();
    let mut encoder = png::Encoder::new(&mut out, w, h);
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(png::BitDepth::Two);
    encoder.set_palette(palette);
    encoder.set_compression(png::Compression::Best);
    let mut writer = encoder.write_header().context("writing png header")?;
    writer
        .write_image_data(&packed)
        .context("encoding indexed png")?;
    writer.finish().context("finishing png")?;
    Ok(out)
}

fn nearest_palette_index(rgb: &[u8]) -> u8 {
    let distance = |c: &RGBColor| {
        [(rgb[0], c.0), (rgb[1], c.1), (rgb[2], c.2)]
            .iter()
            .map(|&(a, b)| (a as i32 - b as i32).pow(2))
            .sum::<i32>()
    };
    COMPACT_PALETTE
        .iter()
        .enumerate()
        .min_by_key(|(_, c)| distance(c))
        .map_or(0, |(i, _)| i as u8)
}

fn draw(
    pixels: &mut [u8],
    size: (u32, u32),
    spec: &PlotSpec,
    points: &[(f64, f64)],
    fit: Option<LinearFit>,
    dpi: u32,
    encoding: Encoding,
    with_text: bool,
) -> Result<()> {
    let scale = dpi as f64 / 100.0;
    let px = |v: f64| (v * scale).round().max(1.0) as u32;

    let root = BitMapBackend::with_buffer(pixels, size).into_drawing_area();
    root.fill(&WHITE)?;

    let (x_range, y_range) = axis_ranges(points, fit);
    let mut builder = ChartBuilder::on(&root);
    builder.margin(px(20.0));
    if with_text {
        builder
            .caption(spec.title.as_str(), (font::FAMILY, 24.0 * scale).into_font())
            .x_label_area_size(px(45.0))
            .y_label_area_size(px(60.0));
    }
    let mut chart = builder.build_cartesian_2d(x_range, y_range)?;

    if with_text {
        chart
            .configure_mesh()
            .x_desc(spec.x_label.as_str())
            .y_desc(spec.y_label.as_str())
            .label_style((font::FAMILY, 14.0 * scale).into_font())
            .draw()?;
    }

    let marker = px(5.0);
    let marker_style = match encoding {
        Encoding::Rgb => BLUE.mix(0.6).filled(),
        Encoding::Palette => BLUE.filled(),
    };
    chart.draw_series(
        points
            .iter()
            .map(move |&(x, y)| Circle::new((x, y), marker, marker_style)),
    )?;

    if let Some(fit) = fit {
        let (lo, hi) = extent(points.iter().map(|p| p.0));
        let dot = px(2.0);
        let series = chart.draw_series(
            dotted_line(fit, lo, hi)
                .into_iter()
                .map(move |(x, y)| Circle::new((x, y), dot, RED.filled())),
        )?;

        if with_text {
            series
                .label(fit.equation())
                .legend(move |(x, y)| Circle::new((x + 10, y), dot + 1, RED.filled()));
            chart
                .configure_series_labels()
                .label_font((font::FAMILY, 14.0 * scale).into_font())
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()?;
        }
    }

    root.present()?;
    Ok(())
}

fn dotted_line(fit: LinearFit, lo: f64, hi: f64) -> Vec<(f64, f64)> {
    let step = (hi - lo) / (REGRESSION_DOTS - 1) as f64;
    (0..REGRESSION_DOTS)
        .map(|i| {
            let x = lo + step * i as f64;
            (x, fit.at(x))
        })
        .collect()
}

fn extent(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Data extent plus 5% padding on each side (1.0 when the extent is a single value).
fn axis_ranges(points: &[(f64, f64)], fit: Option<LinearFit>) -> (Range<f64>, Range<f64>) {
    let (x_lo, x_hi) = extent(points.iter().map(|p| p.0));
    let line_ends = fit.map(|f| [f.at(x_lo), f.at(x_hi)]).unwrap_or([f64::NAN; 2]);
    let (y_lo, y_hi) = extent(
        points
            .iter()
            .map(|p| p.1)
            .chain(line_ends.into_iter().filter(|v| v.is_finite())),
    );
    (pad(x_lo, x_hi), pad(y_lo, y_hi))
}

fn pad(lo: f64, hi: f64) -> Range<f64> {
    let margin = if hi > lo { (hi - lo) * 0.05 } else { 1.0 };
    (lo - margin)..(hi + margin)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
