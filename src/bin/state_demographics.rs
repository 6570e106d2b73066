//! CLI tool for extracting per-state demographics from a survey report PDF

use state_demographics::output::{error_json, RunSummary, DEFAULT_OUTPUT_DIR};
use state_demographics::{process_report, write_outputs, ReportConfig};
use std::env;
use std::path::PathBuf;
use std::process;

fn format_opt(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "-".to_string())
}

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <pdf_file> [output_dir]", args[0]);
        eprintln!("       {} <pdf_file> [output_dir] --json", args[0]);
        eprintln!();
        eprintln!("Extracts per-state group shares and baseline margins.");
        eprintln!("Outputs are written to {} by default.", DEFAULT_OUTPUT_DIR);
        process::exit(1);
    }

    let pdf_path = &args[1];
    let json_output = args.iter().skip(2).any(|a| a == "--json");
    let output_dir = args
        .iter()
        .skip(2)
        .find(|a| *a != "--json")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    let config = ReportConfig::default();

    let result = process_report(pdf_path, &config)
        .and_then(|analysis| write_outputs(&analysis, &output_dir, &config).map(|_| analysis));

    match result {
        Ok(analysis) => {
            if json_output {
                match RunSummary::new(&analysis, &output_dir).to_json() {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        println!("{}", error_json(&e));
                        process::exit(1);
                    }
                }
            } else {
                println!("State Demographics Extraction");
                println!("=============================");
                println!("File: {}", pdf_path);
                println!();
                println!("Pages: {}", analysis.page_count);
                println!("States found: {}", analysis.blocks.len());
                println!("Group rows retained: {}", analysis.rows.len());
                println!();
                println!("Saved outputs to {}", output_dir.display());
                println!();
                println!("Preview baselines:");
                println!(
                    "{:<16} {:>8} {:>10} {:>10}",
                    "state", "sample", "dem_share", "margin"
                );
                for b in analysis.baselines.iter().take(10) {
                    println!(
                        "{:<16} {:>8} {:>10} {:>10}",
                        b.state,
                        b.sample_size,
                        format_opt(b.baseline_dem_share),
                        format_opt(b.baseline_margin)
                    );
                }
            }
        }
        Err(e) => {
            if json_output {
                println!("{}", error_json(&e));
            } else {
                eprintln!("Error: {}", e);
            }
            process::exit(1);
        }
    }
}
