use std::path;
use std::process;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use spillsort::{Comparator, ExternalSorterBuilder, Framing};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let key: KeyMode = arg_parser.value_of_t_or_exit("key");
    let framing: FramingMode = arg_parser.value_of_t_or_exit("framing");
    let separator = arg_parser.value_of("separator").expect("value has a default");
    let tmp_dir: Option<&str> = arg_parser.value_of("tmp_dir");
    let block_size: Option<&str> = arg_parser.value_of("block_size");

    let input = arg_parser.value_of("input").expect("value is required");
    let output = arg_parser.value_of("output").expect("value is required");

    let mut sorter_builder = ExternalSorterBuilder::new()
        .with_comparator(match key {
            KeyMode::Text => Comparator::Text,
            KeyMode::Numeric => Comparator::Numeric,
        })
        .with_framing(match framing {
            FramingMode::Lines => Framing::Lines,
            FramingMode::Delimited => Framing::Delimited(separator.to_string()),
        });

    if let Some(tmp_dir) = tmp_dir {
        sorter_builder = sorter_builder.with_tmp_dir(path::Path::new(tmp_dir));
    }

    if let Some(block_size) = block_size {
        sorter_builder = sorter_builder.with_block_size(
            block_size.parse::<ByteSize>().expect("value is pre-validated").as_u64(),
        );
    }

    let sorter = match sorter_builder.build() {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    match sorter.sort_file(path::Path::new(input), path::Path::new(output)) {
        Ok(summary) => {
            log::info!(
                "sorted {} record(s) in {} block(s) (block budget: {} bytes)",
                summary.records,
                summary.blocks,
                summary.block_size
            );
        }
        Err(err) => {
            log::error!("data sorting error: {}", err);
            process::exit(1);
        }
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum KeyMode {
    Text,
    Numeric,
}

impl KeyMode {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for KeyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <KeyMode as clap::ArgEnum>::from_str(s, false)
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum FramingMode {
    Lines,
    Delimited,
}

impl FramingMode {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for FramingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <FramingMode as clap::ArgEnum>::from_str(s, false)
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("spillsort")
        .about("external merge sort for flat text data")
        .arg(
            clap::Arg::new("input")
                .short('i')
                .long("input")
                .help("file to be sorted")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .help("result file")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("key")
                .short('k')
                .long("key")
                .help("record ordering")
                .takes_value(true)
                .default_value("text")
                .possible_values(KeyMode::possible_values()),
        )
        .arg(
            clap::Arg::new("framing")
                .short('f')
                .long("framing")
                .help("record framing of the input and output")
                .takes_value(true)
                .default_value("lines")
                .possible_values(FramingMode::possible_values()),
        )
        .arg(
            clap::Arg::new("separator")
                .short('s')
                .long("separator")
                .help("token separator for delimited framing")
                .takes_value(true)
                .default_value(", ")
                .validator(|v| {
                    if v.is_empty() {
                        Err("Separator must not be empty".to_string())
                    } else {
                        Ok(())
                    }
                }),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .arg(
            clap::Arg::new("tmp_dir")
                .short('d')
                .long("tmp-dir")
                .help("directory to be used to store temporary data")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("block_size")
                .short('b')
                .long("block-size")
                .help("in-memory block size, e.g. 100MB (estimated from the input when omitted)")
                .takes_value(true)
                .validator(|v| match v.parse::<ByteSize>() {
                    Ok(_) => Ok(()),
                    Err(err) => Err(format!("Block size format incorrect: {}", err)),
                }),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
