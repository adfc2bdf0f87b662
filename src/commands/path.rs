use super::{format_series, print_field};
use anyhow::Result;
use audiobookscan::config::Config;
use audiobookscan::directory::DirectoryRecord;
use colored::Colorize;

pub fn run(path: &str, split_subtitles: bool, json: bool) -> Result<()> {
    let config = Config::load()?;
    let record = config.directory_parser(split_subtitles).parse(path);

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_pretty(&record);
    }

    Ok(())
}

fn print_pretty(record: &DirectoryRecord) {
    println!("{}", record.path.bold());
    println!("{}", "─".repeat(40));

    print_field("Title", &record.title);
    print_field("Subtitle", &record.subtitle);
    let authors: Vec<String> = record.authors.iter().map(|a| a.full_name()).collect();
    print_field("Author", &authors.join(", "));
    print_field("Narrator", &record.narrator);
    let sequence = record.has_series_info.then_some(record.series_index);
    print_field("Series", &format_series(&record.series, sequence));
    if record.publish_year > 0 {
        print_field("Year", &record.publish_year.to_string());
    }
}
