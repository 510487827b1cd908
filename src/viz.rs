// src/viz.rs

use image::{ImageBuffer, Rgb};
use std::error::Error;

use crate::band::ForecastBand;
use crate::data::PriceBar;

const CHART_HEIGHT: u32 = 400;
const HISTORY_WINDOW: usize = 360;

const COLOR_BG: Rgb<u8> = Rgb([12, 12, 20]);
const COLOR_HISTORY: Rgb<u8> = Rgb([70, 130, 235]);
const COLOR_MEDIAN: Rgb<u8> = Rgb([255, 165, 40]);
const COLOR_BAND: Rgb<u8> = Rgb([90, 90, 100]);

/// Print the forecast table: one row per forecast day.
pub fn print_band_table(band: &ForecastBand) {
    if band.is_empty() {
        eprintln!("print_band_table: empty band");
        return;
    }

    println!("\n========= PRICE FORECAST =========");
    println!("{:>12} {:>14} {:>14} {:>14}", "date", "lower", "median", "upper");
    for t in 0..band.len() {
        println!(
            "{:>12} {:>14.4} {:>14.4} {:>14.4}",
            band.dates[t], band.lower[t], band.median[t], band.upper[t]
        );
    }
    println!("==================================\n");
}

/// Map a price to a pixel row on the [min, max] grid. Row 0 is the top
/// of the image, so higher prices map to smaller rows.
fn price_to_row(price: f64, min: f64, max: f64, height: u32) -> u32 {
    if max <= min {
        return height / 2;
    }
    let r = ((price - min) / (max - min)).clamp(0.0, 1.0);
    let row = ((1.0 - r) * (height - 1) as f64).round() as i64;
    row.clamp(0, height as i64 - 1) as u32
}

/// Vertical segment between two rows in one column.
fn draw_vline(
    img: &mut ImageBuffer<Rgb<u8>, Vec<u8>>,
    x: u32,
    y0: u32,
    y1: u32,
    color: Rgb<u8>,
) {
    let (lo, hi) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
    for y in lo..=hi {
        img.put_pixel(x, y, color);
    }
}

/// Save a PNG chart: recent close history, the forecast median, and the
/// confidence band as a filled region. One column per day.
pub fn save_chart_png(
    bars: &[PriceBar],
    band: &ForecastBand,
    path: &str,
) -> Result<(), Box<dyn Error>> {
    if bars.is_empty() || band.is_empty() {
        return Err("save_chart_png: empty history or band".into());
    }

    let hist_start = bars.len().saturating_sub(HISTORY_WINDOW);
    let history: Vec<f64> = bars[hist_start..].iter().map(|b| b.close).collect();

    let width = (history.len() + band.len()) as u32;
    let height = CHART_HEIGHT;

    // Price grid covers everything we draw.
    let mut min_p = f64::INFINITY;
    let mut max_p = f64::NEG_INFINITY;
    for &v in history
        .iter()
        .chain(band.lower.iter())
        .chain(band.upper.iter())
        .chain(band.median.iter())
    {
        if v.is_finite() {
            min_p = min_p.min(v);
            max_p = max_p.max(v);
        }
    }
    if !min_p.is_finite() || !max_p.is_finite() {
        return Err("save_chart_png: no finite values to plot".into());
    }
    // Pad a bit so lines are not glued to the frame.
    let pad = (max_p - min_p).max(1e-9) * 0.05;
    min_p -= pad;
    max_p += pad;

    let mut img = ImageBuffer::from_pixel(width, height, COLOR_BG);

    // History line, connecting consecutive closes.
    let mut prev_row = price_to_row(history[0], min_p, max_p, height);
    for (i, &c) in history.iter().enumerate() {
        let row = price_to_row(c, min_p, max_p, height);
        draw_vline(&mut img, i as u32, prev_row, row, COLOR_HISTORY);
        prev_row = row;
    }

    // Forecast columns: band fill first, median on top.
    let x0 = history.len() as u32;
    let mut prev_med = prev_row;
    for t in 0..band.len() {
        let x = x0 + t as u32;
        let lo = price_to_row(band.lower[t], min_p, max_p, height);
        let hi = price_to_row(band.upper[t], min_p, max_p, height);
        draw_vline(&mut img, x, lo, hi, COLOR_BAND);

        let med = price_to_row(band.median[t], min_p, max_p, height);
        draw_vline(&mut img, x, prev_med, med, COLOR_MEDIAN);
        prev_med = med;
    }

    img.save(path)?;
    Ok(())
}
