use anyhow::Result;
use weatherpal_core::{AppError, ForecastReport};
use weatherpal_weather::RequestOutcome;

fn main() -> Result<()> {
    weatherpal_core::init()?;

    run().map_err(|err| {
        let err = AppError::classify(err);
        tracing::error!("WeatherPal failed: {}", err);
        eprintln!("{}", err.user_message());
        err.into()
    })
}

fn run() -> Result<()> {
    // Everything after the program name is one place query ("Los Angeles")
    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let query = (!query.trim().is_empty()).then_some(query);

    let mut app = weatherpal_core::App::new()?;
    app.initialize()?;

    tracing::info!("WeatherPal started");

    let report = app.run_forecast(query.as_deref())?;
    print_report(&report);

    app.shutdown()?;

    Ok(())
}

fn print_report(report: &ForecastReport) {
    let snap = &report.snapshot;

    println!("WeatherPal - {}", snap.location.name);
    if let Some(updated) = snap.last_updated {
        println!("Updated {}", updated.format("%Y-%m-%d %H:%M UTC"));
    }

    println!("\nNext hours:");
    for hour in &snap.hourly {
        println!(
            "  {:02}:00  {:>4}°C  {:>3}%  {}",
            hour.hour_of_day,
            hour.temperature_celsius,
            hour.humidity_percent,
            hour.condition_symbol.description()
        );
    }
    if snap.hourly.is_empty() {
        println!("  (no more samples today)");
    }

    println!("\nNext days:");
    for day in &snap.daily {
        println!(
            "  {:<4} {:>4}°C  {:<14} {}",
            day.label, day.temperature_celsius, day.description, day.condition_symbol
        );
    }

    let cached = report.icons.iter().filter(|i| i.path.is_some()).count();
    if !report.icons.is_empty() {
        println!("\nIcons: {}/{} cached", cached, report.icons.len());
    }

    if report.outcome == RequestOutcome::Placeholder {
        if let Some(message) = &snap.error_message {
            eprintln!("\n{}", message);
        }
    }
}
