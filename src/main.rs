use std::error::Error;

use price_forecast::viz::{print_band_table, save_chart_png};
use price_forecast::{read_bars, run_forecast, ForecastConfig};

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <history.csv> <output.png>", args[0]);
        std::process::exit(1);
    }
    let input_csv = &args[1];
    let output_png = &args[2];

    // ------------------------------------------------------
    // 1) Load the daily price history
    // ------------------------------------------------------
    let bars = read_bars(input_csv)?;
    println!("Loaded {} daily bars from {}", bars.len(), input_csv);
    if let (Some(first), Some(last)) = (bars.first(), bars.last()) {
        println!("  range: {} → {}", first.date, last.date);
        println!("  last close: {:.4}", last.close);
    }

    // ------------------------------------------------------
    // 2) Fit, simulate, aggregate
    // ------------------------------------------------------
    let cfg = ForecastConfig::default();
    let outcome = run_forecast(&bars, &cfg)?;

    println!("\n{}", outcome.mean_model.summary());
    println!("\n{}", outcome.vol_model.summary());

    // ------------------------------------------------------
    // 3) Report
    // ------------------------------------------------------
    print_band_table(&outcome.band);

    save_chart_png(&bars, &outcome.band, output_png)?;
    println!("Saved chart to {}", output_png);

    Ok(())
}
