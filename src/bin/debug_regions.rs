use clap::Parser;
use facesheet_splitter::{classify_page, LayoutEngine, LopdfLayout};
use lopdf::Document;
use std::path::PathBuf;
use std::process;

/// Dump the text regions and classification of a range of pages
#[derive(Parser, Debug)]
struct Args {
    pdf_path: PathBuf,

    /// Page range, `max` or `min-max`
    #[clap(default_value = "1-3")]
    range: String,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    let args = Args::parse();
    let (min_page, max_page): (u32, u32) = match args.range.split_once('-') {
        Some((a, b)) => (a.parse().unwrap_or(1), b.parse().unwrap_or(3)),
        None => (1, args.range.parse().unwrap_or(3)),
    };

    let doc = match Document::load(&args.pdf_path) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    let layout = LopdfLayout::new(&doc);

    for page in min_page..=max_page.min(layout.page_count()) {
        let regions = match layout.ordered_text_regions(page) {
            Ok(regions) => regions,
            Err(e) => {
                println!("=== PAGE {} (layout failed: {}) ===", page, e);
                continue;
            }
        };

        let class = classify_page(page, &regions);
        println!(
            "=== PAGE {} ({} regions) facility={} name={:?} dob={:?} sex={:?} ===",
            page,
            regions.len(),
            class.facility,
            class.name,
            class.date_of_birth,
            class.sex
        );
        for region in &regions {
            let b = region.bbox;
            println!(
                "  l={:7.1} r={:7.1} t={:7.1} b={:7.1} text={:?}",
                b.left, b.right, b.top, b.bottom, region.text
            );
        }
        println!();
    }
}
