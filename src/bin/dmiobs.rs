//! dmiobs - Get ocean observations from the DMI open data API.

use std::fs::File;

use anyhow::{anyhow, Error};
use clap::{Arg, ArgMatches, SubCommand};
use tracing_subscriber::EnvFilter;
use watobs::{
    dmi::API_KEY_VAR, CommonCmdLineArgs, DmiOceanObsRepository, ObservationQuery, TablePrinter,
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
    let app = CommonCmdLineArgs::new_app("dmiobs", "Get ocean observations from DMI.")
        .subcommand(
            SubCommand::with_name("stations")
                .about("List the stations.")
                .arg(
                    Arg::with_name("parameter")
                        .short("p")
                        .long("parameter")
                        .takes_value(true)
                        .help("Only stations measuring this parameter, e.g. sealev_dvr or tw."),
                )
                .arg(
                    Arg::with_name("active")
                        .long("active")
                        .help("Only active stations."),
                ),
        )
        .subcommand(
            SubCommand::with_name("data")
                .about("Get the observations of one station.")
                .arg(
                    Arg::with_name("station")
                        .index(1)
                        .required(true)
                        .takes_value(true)
                        .help("The station id, e.g. 30336."),
                )
                .arg(
                    Arg::with_name("parameter")
                        .short("p")
                        .long("parameter")
                        .takes_value(true)
                        .default_value("sealev_dvr")
                        .help("The parameter, sealev_dvr, sealev_ln or tw."),
                )
                .arg(
                    Arg::with_name("limit")
                        .long("limit")
                        .takes_value(true)
                        .default_value("10000")
                        .help("Rows per request."),
                )
                .arg(
                    Arg::with_name("output")
                        .short("o")
                        .long("output")
                        .takes_value(true)
                        .help("Write a csv file instead of printing a table."),
                ),
        );

    let (common_args, matches) = CommonCmdLineArgs::matches(app)?;

    let mut repo = DmiOceanObsRepository::new(&common_args.api_key(API_KEY_VAR)?);
    if let Some(url) = common_args.base_url() {
        repo = repo.with_base_url(url);
    }

    match matches.subcommand() {
        ("stations", Some(sub_args)) => stations(&repo, sub_args),
        ("data", Some(sub_args)) => data(&repo, &common_args, sub_args),
        _ => Err(anyhow!("no command given, try --help")),
    }
}

fn stations(repo: &DmiOceanObsRepository, sub_args: &ArgMatches) -> Result<(), Error> {
    let parameter = sub_args.value_of("parameter");
    let active_only = sub_args.is_present("active");

    let stations: Vec<_> = repo
        .get_stations()?
        .into_iter()
        .filter(|st| !active_only || st.is_active())
        .filter(|st| parameter.map(|p| st.measures(p)).unwrap_or(true))
        .collect();

    let ids: Vec<&str> = stations.iter().map(|st| st.id.as_str()).collect();
    let names: Vec<&str> = stations
        .iter()
        .map(|st| st.name.as_deref().unwrap_or(""))
        .collect();
    let lats: Vec<String> = stations
        .iter()
        .map(|st| st.coords.map(|c| format!("{:.4}", c.lat)).unwrap_or_default())
        .collect();
    let lons: Vec<String> = stations
        .iter()
        .map(|st| st.coords.map(|c| format!("{:.4}", c.lon)).unwrap_or_default())
        .collect();
    let status: Vec<&str> = stations
        .iter()
        .map(|st| st.status.as_deref().unwrap_or(""))
        .collect();

    TablePrinter::new()
        .with_title(format!("{} stations", stations.len()))
        .with_column("Id", &ids)
        .with_column("Name", &names)
        .with_column("Lat", &lats)
        .with_column("Lon", &lons)
        .with_column("Status", &status)
        .print();

    Ok(())
}

fn data(
    repo: &DmiOceanObsRepository,
    common_args: &CommonCmdLineArgs,
    sub_args: &ArgMatches,
) -> Result<(), Error> {
    let station = sub_args
        .value_of("station")
        .ok_or_else(|| anyhow!("missing station"))?;
    let parameter = sub_args.value_of("parameter").unwrap_or("sealev_dvr");
    let limit: usize = sub_args.value_of("limit").unwrap_or("10000").parse()?;

    let mut query = ObservationQuery::new(station)
        .parameter(parameter)
        .limit(limit);
    if let Some(start) = common_args.start() {
        query = query.starting(&start)?;
    }
    if let Some(end) = common_args.end() {
        query = query.ending(&end)?;
    }

    let table = repo.get_observed_data(&query)?;

    let times: Vec<String> = table.times().iter().map(|t| t.to_string()).collect();
    let values: Vec<String> = table
        .values()
        .iter()
        .map(|v| v.map(|v| v.to_string()).unwrap_or_default())
        .collect();

    match sub_args.value_of("output") {
        Some(path) => {
            let mut wtr = csv::Writer::from_writer(File::create(path)?);
            wtr.write_record(&["observed", parameter])?;
            for (time, value) in times.iter().zip(&values) {
                wtr.write_record(&[time, value])?;
            }
            wtr.flush()?;
            println!("Wrote {} observations to {}", table.len(), path);
        }
        None => TablePrinter::new()
            .with_title(format!("Station {} {}", station, parameter))
            .with_column("Observed", &times)
            .with_column(parameter, &values)
            .print(),
    }

    Ok(())
}
