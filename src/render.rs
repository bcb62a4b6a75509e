use crate::density::DensitySummary;
use crate::error::{CrashDataError, Result};
use crate::pivot::{CellKind, PivotTable};
use image::{ImageBuffer, Rgba, RgbaImage};
use std::f64::consts::PI;
use std::path::Path;
use tracing::info;

// Constants for Web Mercator
const TILE_SIZE: u32 = 256;
const MAX_LATITUDE: f64 = 85.051_128_78;

// Warm ramp for data cells, cool ramp for margins
const DATA_RAMP: &[&str] = &["#edb081", "#e47b53", "#c8404f", "#8f2163", "#4a1d52"];
const MARGIN_RAMP: &[&str] = &["#b5d7a6", "#62ad8f", "#33848a", "#2a5a7f", "#2b2f66"];
const HEAT_RAMP: &[&str] = &["#0000ff", "#00ffff", "#00ff00", "#ffff00", "#ff0000"];

const GRID_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const EMPTY_COLOR: Rgba<u8> = Rgba([245, 245, 245, 255]);
const HEAT_RADIUS: i64 = 12;

/// Draw the pivot as a grid of squares, data cells and margins on separate color scales.
pub fn render_pivot_heatmap(pivot: &PivotTable, path: &Path, cell_size: u32) -> Result<()> {
    let (rows, cols) = pivot.shape();
    if rows == 0 || cols == 0 || cell_size == 0 {
        return Err(CrashDataError::EmptyPivot);
    }
    info!(rows, cols, path = ?path, "rendering pivot heatmap");

    let data_max = pivot.max_data_count();
    let margin_max = pivot.max_margin_count();
    let side = |cells: usize| u32::try_from(cells).ok().and_then(|n| n.checked_mul(cell_size));
    let (Some(width), Some(height)) = (side(cols), side(rows)) else {
        return Err(CrashDataError::ImageTooLarge { rows, cols, cell_size });
    };
    let mut img: RgbaImage = ImageBuffer::from_pixel(width, height, GRID_COLOR);

    for r in 0..rows {
        for c in 0..cols {
            let Some(cell) = pivot.cell_at(r, c) else { continue };
            let color = match cell.kind {
                CellKind::Data if cell.count == 0 => EMPTY_COLOR,
                CellKind::Data => ramp_color(DATA_RAMP, fraction(cell.count, data_max)),
                CellKind::Margin => ramp_color(MARGIN_RAMP, fraction(cell.count, margin_max)),
            };
            fill_cell(&mut img, r as u32, c as u32, cell_size, color);
        }
    }

    img.save(path)?;
    Ok(())
}

/// Draw crash points as a heat layer on a transparent square centred on the centroid.
pub fn render_density_map(summary: &DensitySummary, path: &Path, zoom: u8, size: u32) -> Result<()> {
    info!(points = summary.points.len(), zoom, size, path = ?path, "rendering density map");

    let (cx, cy) = lat_lon_to_world_pixel(summary.centroid.y(), summary.centroid.x(), zoom);
    let origin_x = cx - f64::from(size) / 2.0;
    let origin_y = cy - f64::from(size) / 2.0;

    let side = size as usize;
    let mut weights = vec![0f32; side * side];
    for point in &summary.points {
        let (wx, wy) = lat_lon_to_world_pixel(point.y(), point.x(), zoom);
        splat(&mut weights, side, (wx - origin_x) as i64, (wy - origin_y) as i64);
    }

    let peak = weights.iter().copied().fold(0f32, f32::max);
    let mut img: RgbaImage = ImageBuffer::new(size, size);
    if peak > 0.0 {
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            let w = weights[y as usize * side + x as usize] / peak;
            if w > 0.0 {
                let mut color = ramp_color(HEAT_RAMP, f64::from(w));
                color.0[3] = (w.sqrt() * 255.0).round() as u8;
                *pixel = color;
            }
        }
    }

    img.save(path)?;
    Ok(())
}

// Add a radial kernel centred on (px, py)
fn splat(weights: &mut [f32], side: usize, px: i64, py: i64) {
    let r2 = (HEAT_RADIUS * HEAT_RADIUS) as f32;
    for dy in -HEAT_RADIUS..=HEAT_RADIUS {
        for dx in -HEAT_RADIUS..=HEAT_RADIUS {
            let (x, y) = (px + dx, py + dy);
            if x < 0 || y < 0 || x >= side as i64 || y >= side as i64 {
                continue;
            }
            let d2 = (dx * dx + dy * dy) as f32;
            if d2 <= r2 {
                let falloff = 1.0 - d2 / r2;
                weights[y as usize * side + x as usize] += falloff * falloff;
            }
        }
    }
}

fn fill_cell(img: &mut RgbaImage, r: u32, c: u32, cell_size: u32, color: Rgba<u8>) {
    // Leave a one pixel grid line on the right and bottom edges
    let inner = cell_size.saturating_sub(1).max(1);
    for y in 0..inner {
        for x in 0..inner {
            img.put_pixel(c * cell_size + x, r * cell_size + y, color);
        }
    }
}

fn fraction(count: u64, max: u64) -> f64 {
    if max == 0 {
        0.0
    } else {
        count as f64 / max as f64
    }
}

/// Interpolate along evenly spaced hex color stops, `t` in `[0, 1]`.
fn ramp_color(stops: &[&str], t: f64) -> Rgba<u8> {
    let t = t.clamp(0.0, 1.0);
    let scaled = t * (stops.len() - 1) as f64;
    let lo = scaled.floor() as usize;
    let hi = (lo + 1).min(stops.len() - 1);
    let frac = scaled - lo as f64;

    let a = hex_to_rgba(stops[lo]);
    let b = hex_to_rgba(stops[hi]);
    let mix = |i: usize| (f64::from(a.0[i]) + (f64::from(b.0[i]) - f64::from(a.0[i])) * frac).round() as u8;
    Rgba([mix(0), mix(1), mix(2), 255])
}

fn hex_to_rgba(hex: &str) -> Rgba<u8> {
    let hex = hex.trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        hex.get(range)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .unwrap_or(0)
    };
    Rgba([channel(0..2), channel(2..4), channel(4..6), 255])
}

/// Web Mercator world pixel coordinates of a position at `zoom`.
fn lat_lon_to_world_pixel(lat: f64, lon: f64, zoom: u8) -> (f64, f64) {
    let n = 2.0_f64.powi(i32::from(zoom));
    let lat_rad = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x_t = (lon + 180.0) / 360.0 * n;
    let y_t = (1.0 - (lat_rad.tan() + (1.0 / lat_rad.cos())).ln() / PI) / 2.0 * n;
    (x_t * f64::from(TILE_SIZE), y_t * f64::from(TILE_SIZE))
}
