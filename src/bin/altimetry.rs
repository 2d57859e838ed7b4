//! altimetry - Query the DHI altimetry data shop.

use anyhow::{anyhow, Error};
use clap::{Arg, ArgMatches, SubCommand};
use tracing_subscriber::EnvFilter;
use watobs::{
    altimetry::API_KEY_VAR, AltimetryQuery, CommonCmdLineArgs, DhiAltimetryRepository,
    QualityFlag, TablePrinter,
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(ref e) = run() {
        println!("error: {}", e);

        for cause in e.chain().skip(1) {
            println!("caused by: {}", cause);
        }

        ::std::process::exit(1);
    }
}

fn run() -> Result<(), Error> {
    let area_arg = || {
        Arg::with_name("area")
            .index(1)
            .required(true)
            .takes_value(true)
            .help("Area, e.g. 'lon=10.9&lat=55.9&radius=10.0' or 'bbox=115,28,150,52'.")
    };
    let satellites_arg = || {
        Arg::with_name("satellites")
            .long("satellites")
            .multiple(true)
            .takes_value(true)
            .help("Satellites to include, short (3a) or long (Sentinel-3A) names.")
    };

    let app = CommonCmdLineArgs::new_app("altimetry", "Get satellite altimetry observations.")
        .subcommand(SubCommand::with_name("satellites").about("List the available satellites."))
        .subcommand(
            SubCommand::with_name("quality-filters").about("List the available quality filters."),
        )
        .subcommand(
            SubCommand::with_name("stats").about("Summarize the data available per satellite."),
        )
        .subcommand(
            SubCommand::with_name("daily-count")
                .about("Count observations per day in an area.")
                .arg(area_arg())
                .arg(satellites_arg()),
        )
        .subcommand(
            SubCommand::with_name("data")
                .about("Download observations in an area to a csv file.")
                .arg(area_arg())
                .arg(satellites_arg())
                .arg(
                    Arg::with_name("quality")
                        .short("q")
                        .long("quality")
                        .multiple(true)
                        .takes_value(true)
                        .help("Accepted quality flags, 0 (good), 1 (acceptable) or 2 (bad)."),
                )
                .arg(
                    Arg::with_name("output")
                        .short("o")
                        .long("output")
                        .required(true)
                        .takes_value(true)
                        .help("File to write."),
                ),
        );

    let (common_args, matches) = CommonCmdLineArgs::matches(app)?;

    let mut repo = DhiAltimetryRepository::new(&common_args.api_key(API_KEY_VAR)?);
    if let Some(url) = common_args.base_url() {
        repo = repo.with_base_url(url);
    }

    match matches.subcommand() {
        ("satellites", Some(_)) => satellites(&repo),
        ("quality-filters", Some(_)) => quality_filters(&repo),
        ("stats", Some(_)) => stats(&repo),
        ("daily-count", Some(sub_args)) => daily_count(&repo, &common_args, sub_args),
        ("data", Some(sub_args)) => data(&repo, &common_args, sub_args),
        _ => Err(anyhow!("no command given, try --help")),
    }
}

fn build_query(
    common_args: &CommonCmdLineArgs,
    sub_args: &ArgMatches,
) -> Result<AltimetryQuery, Error> {
    let area = sub_args
        .value_of("area")
        .ok_or_else(|| anyhow!("missing area"))?;

    let mut query = AltimetryQuery::new(area)?;
    if let Some(start) = common_args.start() {
        query = query.starting(&start)?;
    }
    if let Some(end) = common_args.end() {
        query = query.ending(&end)?;
    }

    let satellites: Vec<&str> = sub_args
        .values_of("satellites")
        .into_iter()
        .flatten()
        .collect();

    let flags = sub_args
        .values_of("quality")
        .into_iter()
        .flatten()
        .map(QualityFlag::parse)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(query.satellites(&satellites).quality_filters(&flags))
}

fn satellites(repo: &DhiAltimetryRepository) -> Result<(), Error> {
    let sats = repo.get_satellites()?;
    let short: Vec<&str> = sats.iter().map(|s| s.short_name.as_str()).collect();
    let long: Vec<&str> = sats.iter().map(|s| s.long_name.as_str()).collect();

    TablePrinter::new()
        .with_title("Satellites")
        .with_column("Short name", &short)
        .with_column("Long name", &long)
        .print();

    Ok(())
}

fn quality_filters(repo: &DhiAltimetryRepository) -> Result<(), Error> {
    let filters = repo.get_quality_filters()?;
    let names: Vec<&str> = filters.iter().map(|f| f.short_name.as_str()).collect();
    let details: Vec<String> = filters
        .iter()
        .map(|f| {
            f.details
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect();

    TablePrinter::new()
        .with_title("Quality filters")
        .with_column("Name", &names)
        .with_column("Details", &details)
        .print();

    Ok(())
}

fn stats(repo: &DhiAltimetryRepository) -> Result<(), Error> {
    let stats = repo.get_observation_stats()?;
    let names: Vec<&str> = stats.iter().map(|s| s.short_name.as_str()).collect();
    let first: Vec<String> = stats.iter().map(|s| s.min_date.to_string()).collect();
    let last: Vec<String> = stats.iter().map(|s| s.max_date.to_string()).collect();
    let counts: Vec<String> = stats
        .iter()
        .map(|s| {
            s.details
                .get("count")
                .map(|c| c.to_string())
                .unwrap_or_default()
        })
        .collect();

    TablePrinter::new()
        .with_title("Observations per satellite")
        .with_column("Satellite", &names)
        .with_column("First", &first)
        .with_column("Last", &last)
        .with_column("Count", &counts)
        .print();

    Ok(())
}

fn daily_count(
    repo: &DhiAltimetryRepository,
    common_args: &CommonCmdLineArgs,
    sub_args: &ArgMatches,
) -> Result<(), Error> {
    let query = build_query(common_args, sub_args)?;
    let counts = repo.get_daily_count(&query)?;

    let dates: Vec<String> = counts
        .iter()
        .map(|c| c.date.format("%Y-%m-%d").to_string())
        .collect();
    let values: Vec<u64> = counts.iter().map(|c| c.count).collect();

    TablePrinter::new()
        .with_title(format!("Daily count {}", query.area()))
        .with_column("Date", &dates)
        .with_column("Count", &values)
        .print();

    Ok(())
}

fn data(
    repo: &DhiAltimetryRepository,
    common_args: &CommonCmdLineArgs,
    sub_args: &ArgMatches,
) -> Result<(), Error> {
    let query = build_query(common_args, sub_args)?;
    let output = sub_args
        .value_of("output")
        .ok_or_else(|| anyhow!("missing output file"))?;

    let data = repo.get_altimetry_data(&query)?;
    if data.is_empty() {
        println!("No data retrieved!");
        return Ok(());
    }
    data.to_csv(output, None, None)?;

    let summary = data.records_per_satellite();
    let names: Vec<&str> = summary.iter().map(|s| s.satellite.as_str()).collect();
    let counts: Vec<usize> = summary.iter().map(|s| s.count).collect();
    let first: Vec<String> = summary.iter().map(|s| s.start_time.to_string()).collect();
    let last: Vec<String> = summary.iter().map(|s| s.end_time.to_string()).collect();

    TablePrinter::new()
        .with_title(format!("Records per satellite, written to {}", output))
        .with_column("Satellite", &names)
        .with_column("Records", &counts)
        .with_column("First", &first)
        .with_column("Last", &last)
        .print();

    Ok(())
}
