use colored::Colorize;
use log::LevelFilter;
use std::error::Error;

use spike_conditioning::config::{load_config, save_config, Config};
use spike_conditioning::local::{process_file, simulate};
use spike_conditioning::utils::log::{parse_level, Logger};

const DEFAULT_SIM_BLOCKS: u64 = 250;

fn usage() {
    println!("{}", "usage:".bold());
    println!("  main process <config.yaml> <input.csv> <output.csv>");
    println!("  main simulate <config.yaml> [blocks]");
    println!("  main default-config <path>");
}

fn init_logging(config: &Config) -> Result<(), Box<dyn Error>> {
    let level = if config.processor.verbose {
        LevelFilter::Debug.max(parse_level(&config.processor.log_level))
    } else {
        parse_level(&config.processor.log_level)
    };
    let mut logger = Logger::new(level);
    if let Some(file) = &config.processor.log_file {
        logger = logger.with_file(file)?;
    }
    logger.install()?;
    Ok(())
}

fn run(args: &[String]) -> Result<(), Box<dyn Error>> {
    match args.get(1).map(String::as_str) {
        Some("process") if args.len() == 5 => {
            let config = load_config(&args[2])?;
            init_logging(&config)?;
            let summary = process_file::run(&config, &args[3], &args[4])?;
            println!(
                "{} {} timepoints in {} blocks -> {}",
                "done:".green(),
                summary.timepoints,
                summary.blocks,
                args[4]
            );
        }
        Some("simulate") if args.len() == 3 || args.len() == 4 => {
            let config = load_config(&args[2])?;
            init_logging(&config)?;
            let blocks = match args.get(3) {
                Some(n) => n.parse()?,
                None => DEFAULT_SIM_BLOCKS,
            };
            simulate::run(&config, blocks)?;
        }
        Some("default-config") if args.len() == 3 => {
            save_config(&Config::default(), &args[2])?;
            println!("{} {}", "wrote".green(), args[2]);
        }
        _ => usage(),
    }
    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if let Err(e) = run(&args) {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
