use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use env_logger::Env;
use log::info;

use std::{
    io::{self, Write},
    path::PathBuf,
};

use sales_report::{Report, Sources};

#[derive(Parser)]
#[command(version, about)]
/// Reconciles marketplace sales, returns, inventory and vendor cost exports
/// into a spreadsheet report.
struct Args {
    /// Directory containing the exported .csv and .txt files.
    #[arg(default_value = ".", env = "SALES_REPORT_DIR")]
    dir: PathBuf,

    /// Only report products whose names contain this brand or keyword.
    /// If omitted, you'll be asked for one.
    #[arg(short, long)]
    keyword: Option<String>,

    /// Where to save the report [default: DIR]
    #[arg(short, long, env = "SALES_REPORT_OUTPUT")]
    output: Option<PathBuf>,

    /// Treat this date (YYYY-MM-DD) as today when trimming the last day.
    #[arg(long, value_name = "DATE")]
    as_of: Option<NaiveDate>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let sources = Sources::load_dir(&args.dir)
        .with_context(|| format!("reading exports from {}", args.dir.display()))?;
    let keyword = match args.keyword {
        Some(keyword) => keyword,
        None => prompt_keyword()?,
    };
    let today = args.as_of.unwrap_or_else(|| Local::now().date_naive());
    let report = Report::build(sources, &keyword, today)?;

    let path = args.output.unwrap_or(args.dir).join(report.file_name());
    report
        .write_xlsx(&path)
        .with_context(|| format!("writing {}", path.display()))?;
    info!("keyword {:?}, {} to {}", report.keyword(), report.start, report.end);
    print!("{report}");
    println!("Report saved to {}", path.display());
    Ok(())
}

fn prompt_keyword() -> Result<String> {
    println!(
        "Please enter the name of the brand/keyword you wish to run this report for.\n\
         To report all sales regardless of brand/keyword, just press Enter:"
    );
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
