use state_demographics::states::canonical_state;
use state_demographics::{
    extract_page_texts, parse_state_block, segment_pages, segmenter::block_text, ReportConfig,
};
use std::env;

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: debug_segments <pdf_path> [state]");
        std::process::exit(1);
    }

    let only = match args.get(2) {
        Some(name) => match canonical_state(name) {
            Some(state) => Some(state),
            None => {
                eprintln!("Unknown state: {}", name);
                std::process::exit(1);
            }
        },
        None => None,
    };

    let pages = match extract_page_texts(&args[1]) {
        Ok(pages) => pages,
        Err(e) => {
            eprintln!("Failed to extract: {}", e);
            std::process::exit(1);
        }
    };

    let config = ReportConfig::default();
    let blocks = segment_pages(&pages, &config);
    println!("=== {} pages, {} state blocks ===", pages.len(), blocks.len());

    for block in &blocks {
        if only.is_some_and(|s| s != block.state) {
            continue;
        }
        let end = block
            .end_page()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "(empty)".to_string());
        let parsed = parse_state_block(block.state, &block_text(&pages, block), &config);
        println!(
            "{:<16} pages {:>4} - {:>7}  sample={:?}",
            block.state,
            block.start_page(),
            end,
            parsed.sample_size
        );
        for (group, entries) in &parsed.groups {
            println!("    {:<10} {:>4} lines", group.as_str(), entries.len());
        }
        if only.is_some() {
            println!();
            println!("{}", block_text(&pages, block));
        }
    }
}
