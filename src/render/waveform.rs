//! Waveform chart rendering
//!
//! Renders a sample buffer as a dark-themed PNG chart: waveform line over a
//! filled positive/negative envelope, zero line, grid, a time axis in
//! seconds and a sample-rate/duration annotation.
//!
//! Long buffers are decimated by strided subsampling before drawing. The
//! style is passed per call, so concurrent renders never share state.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::engine::SampleBuffer;
use crate::error::{MasteringError, Result};
use crate::render::canvas::{Canvas, Color};
use crate::render::font::GLYPH_HEIGHT;

// ============================================================================
// Quality
// ============================================================================

/// Point budget for the plotted series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum QualityMode {
    /// Up to 50 000 points
    #[default]
    High,
    /// Up to 30 000 points
    Fast,
}

impl QualityMode {
    /// Maximum number of plotted points
    pub fn max_points(self) -> usize {
        match self {
            QualityMode::High => 50_000,
            QualityMode::Fast => 30_000,
        }
    }
}

// ============================================================================
// Style
// ============================================================================

/// Visual configuration for one render call
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformStyle {
    pub width: u32,
    pub height: u32,
    pub margin_left: u32,
    pub margin_right: u32,
    pub margin_top: u32,
    pub margin_bottom: u32,
    pub background: Color,
    pub line: Color,
    pub line_alpha: f32,
    pub positive_fill: Color,
    pub negative_fill: Color,
    pub fill_alpha: f32,
    pub grid: Color,
    pub grid_alpha: f32,
    pub axis: Color,
    pub zero_line_alpha: f32,
    pub text: Color,
    pub title_scale: u32,
}

impl Default for WaveformStyle {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 400,
            margin_left: 60,
            margin_right: 20,
            margin_top: 40,
            margin_bottom: 50,
            background: [0x1a, 0x1a, 0x1a],
            line: [0x00, 0xff, 0x88],
            line_alpha: 0.8,
            positive_fill: [0x00, 0xff, 0x88],
            negative_fill: [0xff, 0x44, 0x44],
            fill_alpha: 0.3,
            grid: [0x66, 0x66, 0x66],
            grid_alpha: 0.3,
            axis: [0xff, 0xff, 0xff],
            zero_line_alpha: 0.5,
            text: [0xff, 0xff, 0xff],
            title_scale: 2,
        }
    }
}

/// Smallest plot area accepted in either direction
const MIN_PLOT_SIZE: u32 = 16;

impl WaveformStyle {
    /// Check the style leaves a usable plot area
    ///
    /// # Errors
    /// * `Render` - If margins swallow the canvas
    pub fn validate(&self) -> Result<()> {
        let horizontal = self.margin_left.saturating_add(self.margin_right);
        let vertical = self.margin_top.saturating_add(self.margin_bottom);
        if self.width < horizontal.saturating_add(MIN_PLOT_SIZE)
            || self.height < vertical.saturating_add(MIN_PLOT_SIZE)
        {
            return Err(MasteringError::Render {
                reason: format!(
                    "degenerate style: {}x{} canvas with {}px/{}px margins",
                    self.width, self.height, horizontal, vertical
                ),
            });
        }
        Ok(())
    }

    fn plot_area(&self) -> PlotArea {
        PlotArea {
            left: self.margin_left as i64,
            top: self.margin_top as i64,
            width: (self.width - self.margin_left - self.margin_right) as i64,
            height: (self.height - self.margin_top - self.margin_bottom) as i64,
        }
    }
}

/// Plot rectangle in pixels
#[derive(Debug, Clone, Copy)]
struct PlotArea {
    left: i64,
    top: i64,
    width: i64,
    height: i64,
}

impl PlotArea {
    fn right(&self) -> i64 {
        self.left + self.width - 1
    }

    fn bottom(&self) -> i64 {
        self.top + self.height - 1
    }

    /// Row for an amplitude in [-1, 1]
    fn y_for(&self, amplitude: f32) -> i64 {
        let half = (self.height - 1) as f64 / 2.0;
        let center = self.top as f64 + half;
        (center - amplitude.clamp(-1.0, 1.0) as f64 * half).round() as i64
    }

    /// Column for a fraction of the time axis in [0, 1]
    fn x_for(&self, fraction: f64) -> i64 {
        self.left + (fraction.clamp(0.0, 1.0) * (self.width - 1) as f64).round() as i64
    }
}

// ============================================================================
// Decimation
// ============================================================================

/// Strided subsampling for display
///
/// When `samples.len()` exceeds `max_points`, every Nth sample is kept with
/// `N = floor(len / max_points)`, giving `ceil(len / N)` points. Otherwise
/// every sample is kept. Each point carries its original sample index, so
/// the series stays in time order. A zero budget is treated as one.
pub fn decimate(samples: &[f32], max_points: usize) -> Vec<(usize, f32)> {
    let max_points = max_points.max(1);
    let step = if samples.len() > max_points {
        samples.len() / max_points
    } else {
        1
    };

    samples
        .iter()
        .copied()
        .enumerate()
        .step_by(step)
        .collect()
}

// ============================================================================
// Renderer
// ============================================================================

/// Waveform renderer bound to one style
#[derive(Debug, Clone, Default)]
pub struct WaveformRenderer {
    style: WaveformStyle,
}

impl WaveformRenderer {
    /// Create a renderer for a validated style
    pub fn new(style: WaveformStyle) -> Result<Self> {
        style.validate()?;
        Ok(Self { style })
    }

    pub fn style(&self) -> &WaveformStyle {
        &self.style
    }

    /// Render with a quality preset's point budget
    pub fn render_quality(
        &self,
        buffer: &SampleBuffer,
        title: &str,
        quality: QualityMode,
    ) -> Result<Vec<u8>> {
        self.render(buffer, title, quality.max_points())
    }

    /// Render a buffer to PNG bytes
    ///
    /// An empty buffer renders a placeholder chart with axes and a
    /// "NO AUDIO" label.
    ///
    /// # Errors
    /// * `Render` - If `max_points` is zero, a sample is NaN or infinite, or
    ///   encoding fails
    pub fn render(&self, buffer: &SampleBuffer, title: &str, max_points: usize) -> Result<Vec<u8>> {
        if max_points == 0 {
            return Err(MasteringError::Render {
                reason: "point budget must be at least 1".to_string(),
            });
        }
        if let Some(index) = buffer.samples().iter().position(|s| !s.is_finite()) {
            return Err(MasteringError::Render {
                reason: format!("sample {} is not finite", index),
            });
        }

        let style = &self.style;
        let area = style.plot_area();
        let duration = buffer.duration_secs();
        let mut canvas = Canvas::new(style.width, style.height, style.background);

        self.draw_grid(&mut canvas, area, duration);

        if buffer.is_empty() {
            canvas.text_centered(
                area.left + area.width / 2,
                area.top + area.height / 4,
                "NO AUDIO",
                style.text,
                style.title_scale,
            );
        } else {
            let points = decimate(buffer.samples(), max_points);
            debug!(
                samples = buffer.len(),
                points = points.len(),
                max_points,
                "Rendering waveform"
            );
            self.draw_series(&mut canvas, area, &points, buffer.len(), buffer.peak());
        }

        // Zero line and the two visible spines
        canvas.hspan(area.y_for(0.0), area.left, area.right(), style.axis, style.zero_line_alpha);
        canvas.vspan(area.left - 1, area.top, area.bottom() + 1, style.axis, 1.0);
        canvas.hspan(area.bottom() + 1, area.left - 1, area.right(), style.axis, 1.0);

        self.draw_labels(&mut canvas, area, buffer, title);

        canvas.into_png()
    }

    fn draw_grid(&self, canvas: &mut Canvas, area: PlotArea, duration: f64) {
        let style = &self.style;

        for amplitude in [-1.0_f32, -0.5, 0.0, 0.5, 1.0] {
            let y = area.y_for(amplitude);
            canvas.hspan(y, area.left, area.right(), style.grid, style.grid_alpha);
            canvas.text_right(
                area.left - 6,
                y - GLYPH_HEIGHT as i64 / 2,
                &format!("{:.1}", amplitude),
                style.text,
                1,
            );
        }

        for (seconds, label) in time_ticks(duration) {
            let fraction = if duration > 0.0 { seconds / duration } else { 0.0 };
            let x = area.x_for(fraction);
            canvas.vspan(x, area.top, area.bottom(), style.grid, style.grid_alpha);
            canvas.text_centered(x, area.bottom() + 8, &label, style.text, 1);
        }
    }

    fn draw_series(
        &self,
        canvas: &mut Canvas,
        area: PlotArea,
        points: &[(usize, f32)],
        total_samples: usize,
        peak: f32,
    ) {
        let style = &self.style;
        let scale = if peak > 0.0 { 1.0 / peak } else { 1.0 };
        let last_index = total_samples.saturating_sub(1).max(1) as f64;
        let zero_y = area.y_for(0.0);

        // Per column envelope: (highest positive, lowest negative)
        let mut envelope = vec![(0.0_f32, 0.0_f32); area.width as usize];
        let mut coords = Vec::with_capacity(points.len());

        for &(index, value) in points {
            let normalized = value * scale;
            let x = area.x_for(index as f64 / last_index);
            let column = &mut envelope[(x - area.left) as usize];
            column.0 = column.0.max(normalized);
            column.1 = column.1.min(normalized);
            coords.push((x, area.y_for(normalized)));
        }

        for (offset, &(high, low)) in envelope.iter().enumerate() {
            let x = area.left + offset as i64;
            if high > 0.0 {
                canvas.vspan(x, zero_y, area.y_for(high), style.positive_fill, style.fill_alpha);
            }
            if low < 0.0 {
                let y = area.y_for(low);
                canvas.vspan(x, zero_y, y, style.positive_fill, style.fill_alpha);
                canvas.vspan(x, zero_y, y, style.negative_fill, style.fill_alpha);
            }
        }

        match coords.as_slice() {
            [(x, y)] => canvas.blend(*x, *y, style.line, style.line_alpha),
            _ => {
                for pair in coords.windows(2) {
                    let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
                    canvas.line(x0, y0, x1, y1, style.line, style.line_alpha);
                }
            }
        }
    }

    fn draw_labels(&self, canvas: &mut Canvas, area: PlotArea, buffer: &SampleBuffer, title: &str) {
        let style = &self.style;
        let title_height = GLYPH_HEIGHT * style.title_scale;
        let title_y = (area.top - title_height as i64) / 2;

        canvas.text_centered(
            area.left + area.width / 2,
            title_y,
            title,
            style.text,
            style.title_scale,
        );

        let annotation = format!(
            "{} HZ  {:.2} S",
            buffer.sample_rate(),
            buffer.duration_secs()
        );
        let caption_y = title_y + title_height as i64 - GLYPH_HEIGHT as i64;
        canvas.text_right(area.right(), caption_y, &annotation, style.text, 1);

        canvas.text_centered(
            area.left + area.width / 2,
            area.bottom() + 26,
            "TIME (SECONDS)",
            style.text,
            1,
        );
        canvas.text(area.left - 1, caption_y, "AMPLITUDE", style.text, 1);
    }
}

/// Tick positions and labels for a time axis of `duration` seconds
///
/// Steps are 1, 2 or 5 times a power of ten, aiming for about eight ticks.
fn time_ticks(duration: f64) -> Vec<(f64, String)> {
    if duration.is_nan() || duration <= 0.0 {
        return vec![(0.0, "0".to_string())];
    }

    let raw = duration / 8.0;
    let magnitude = 10.0_f64.powf(raw.log10().floor());
    let step = match raw / magnitude {
        f if f <= 1.0 => magnitude,
        f if f <= 2.0 => 2.0 * magnitude,
        f if f <= 5.0 => 5.0 * magnitude,
        _ => 10.0 * magnitude,
    };
    let decimals = if step >= 1.0 {
        0
    } else {
        // Epsilon keeps log10(0.1) from rounding up to two decimals
        (-step.log10() - 1e-9).ceil() as usize
    };

    let count = (duration / step + 1e-9).floor() as usize;
    (0..=count)
        .map(|k| {
            let t = k as f64 * step;
            (t, format!("{:.*}", decimals, t))
        })
        .collect()
}

/// Render with the default style
///
/// # Errors
/// * `Render` - If a sample is NaN or infinite, or encoding fails
pub fn render(buffer: &SampleBuffer, title: &str, quality: QualityMode) -> Result<Vec<u8>> {
    WaveformRenderer::default().render_quality(buffer, title, quality)
}

// ============================================================================
// Session images
// ============================================================================

/// Which side of the mastering pass an image shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveformVersion {
    Original,
    Mastered,
}

impl WaveformVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            WaveformVersion::Original => "original",
            WaveformVersion::Mastered => "mastered",
        }
    }
}

impl std::fmt::Display for WaveformVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendered chart keyed by session and version
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformImage {
    pub session_id: Uuid,
    pub version: WaveformVersion,
    pub png: Vec<u8>,
}

impl WaveformImage {
    /// PNG bytes as standard base64
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.png)
    }
}
