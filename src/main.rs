use std::fs;
use std::path;
use std::process;
use std::time::Instant;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use ext_int_sort::{count_persisted_runs, ExternalSorterBuilder, LogProgress};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let input = path::Path::new(arg_parser.value_of("input").expect("value is required"));
    let output = path::Path::new(arg_parser.value_of("output").expect("value is required"));
    let chunk_size: usize = arg_parser.value_of_t_or_exit("chunk_size");
    let tmp_dir = arg_parser.value_of("tmp_dir").map(path::Path::new);
    let keep_runs = arg_parser.is_present("keep_runs");
    let buf_size: Option<ByteSize> = arg_parser
        .is_present("buf_size")
        .then(|| arg_parser.value_of_t_or_exit("buf_size"));

    let mut sorter_builder = ExternalSorterBuilder::new()
        .with_chunk_capacity(chunk_size)
        .with_keep_runs(keep_runs)
        .with_progress(LogProgress::default());

    if let Some(tmp_dir) = tmp_dir {
        sorter_builder = sorter_builder.with_tmp_dir(tmp_dir);
    }

    if let Some(buf_size) = buf_size {
        sorter_builder = sorter_builder.with_rw_buf_size(buf_size.as_u64() as usize);
    }

    let sorter = match sorter_builder.build() {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    let started = Instant::now();
    let report = match sorter.sort_file(input, output) {
        Ok(report) => report,
        Err(err) => {
            log::error!("data sorting error: {}", err);
            process::exit(1);
        }
    };
    let elapsed = started.elapsed();

    let output_size = fs::metadata(output).map(|meta| ByteSize(meta.len()));
    log::info!("total integers: {}", report.elements);
    log::info!("chunk size: {}", chunk_size);
    log::info!("total runs: {}", report.runs);
    log::info!("execution time: {:.3} seconds", elapsed.as_secs_f64());
    match output_size {
        Ok(size) => log::info!("output file: {} ({})", output.display(), size),
        Err(err) => log::warn!("output file {} can't be inspected: {}", output.display(), err),
    }

    if keep_runs {
        if let Some(tmp_dir) = tmp_dir {
            match count_persisted_runs(tmp_dir) {
                Ok(count) => log::info!("{} runs kept in {}", count, tmp_dir.display()),
                Err(err) => log::warn!("run directory {} can't be inspected: {}", tmp_dir.display(), err),
            }
        }
    }

    if report.sorted {
        log::info!("output is correctly sorted");
    } else {
        log::error!("output is NOT sorted correctly");
        process::exit(2);
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

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("ext-int-sort")
        .about("external merge sort for whitespace-separated integers")
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
            clap::Arg::new("chunk_size")
                .short('c')
                .long("chunk-size")
                .help("number of integers held in memory at once")
                .takes_value(true)
                .default_value("10000")
                .validator(|v| match v.parse::<usize>() {
                    Ok(0) => Err("Chunk size must be greater than zero".to_string()),
                    Ok(_) => Ok(()),
                    Err(err) => Err(format!("Chunk size format incorrect: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("tmp_dir")
                .short('d')
                .long("tmp-dir")
                .help("directory to be used to store sorted runs")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("keep_runs")
                .short('k')
                .long("keep-runs")
                .help("keep sorted runs after merging"),
        )
        .arg(
            clap::Arg::new("buf_size")
                .short('b')
                .long("buf-size")
                .help("run file read/write buffer size")
                .takes_value(true)
                .validator(|v| match v.parse::<ByteSize>() {
                    Ok(size) if size.as_u64() > 0 => Ok(()),
                    Ok(_) => Err("Buffer size must be greater than zero".to_string()),
                    Err(err) => Err(format!("Buffer size format incorrect: {}", err)),
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
