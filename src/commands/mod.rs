pub mod path;
pub mod scan;
pub mod show;
pub mod tags;

use colored::Colorize;

pub(crate) fn print_field(label: &str, value: &str) {
    if !value.is_empty() {
        println!("{:>12}: {}", label.cyan(), value);
    }
}

/// Format seconds as HH:MM:SS
pub(crate) fn format_duration(seconds: f64) -> String {
    let total = seconds as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Series name with its position, e.g. "Mistborn #1"
pub(crate) fn format_series(series: &str, sequence: Option<f64>) -> String {
    match (series.is_empty(), sequence) {
        (false, Some(p)) => format!("{} #{}", series, p),
        (false, None) => series.to_string(),
        (true, Some(p)) => format!("#{}", p),
        (true, None) => String::new(),
    }
}
