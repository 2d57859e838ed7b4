//! Command line options that are used across applications.

use chrono::NaiveDateTime;
use clap::{crate_version, App, Arg, ArgMatches};

use crate::{errors::WatObsErr, time::parse_datetime};

/// Struct to package up command line arguments.
#[derive(Clone, Debug)]
pub struct CommonCmdLineArgs {
    // API key given on the command line.
    api_key: Option<String>,
    // Alternative url of the service.
    base_url: Option<String>,
    // Start of the time interval.
    start: Option<NaiveDateTime>,
    // End of the time interval.
    end: Option<NaiveDateTime>,
}

impl<'a, 'b> CommonCmdLineArgs {
    /// Create a new set of args.
    pub fn new_app(app_name: &'static str, about: &'static str) -> App<'a, 'b> {
        App::new(app_name)
            .about(about)
            .version(crate_version!())
            .arg(
                Arg::with_name("api-key")
                    .short("k")
                    .long("api-key")
                    .takes_value(true)
                    .help("API key for the service.")
                    .long_help(concat!(
                        "API key for the service. If not given, it is read from the environment ",
                        "variable named for the service."
                    )),
            )
            .arg(
                Arg::with_name("base-url")
                    .long("base-url")
                    .takes_value(true)
                    .help("Url of the service, if not the production one."),
            )
            .arg(
                Arg::with_name("start")
                    .short("s")
                    .long("start")
                    .takes_value(true)
                    .help("Start of the time interval, e.g. 2021, 2019-10-1 or 20200101."),
            )
            .arg(
                Arg::with_name("end")
                    .short("e")
                    .long("end")
                    .takes_value(true)
                    .help("End of the time interval.")
                    .long_help("End of the time interval. Defaults to now."),
            )
            .after_help("Set RUST_LOG (e.g. RUST_LOG=debug) to see what is sent to the service.")
    }

    /// Process an `App` to get the parsed values out of it and the matches object so an application
    /// can continue with further argument parsing.
    pub fn matches(app: App<'a, 'b>) -> Result<(Self, ArgMatches<'a>), WatObsErr> {
        let matches = app.get_matches();
        let cmd_line_opts = Self::from_matches(&matches)?;

        let usage = matches.usage().to_owned();
        let print_usage_message = |msg: &str| -> ! {
            println!("\n{}\n\n{}\n", msg, usage);
            println!("Try the -h or --help option for more instructions.");
            ::std::process::exit(1);
        };

        if let (Some(start), Some(end)) = (cmd_line_opts.start, cmd_line_opts.end) {
            if start > end {
                print_usage_message("Invalid time range, start must be before end!");
            }
        }

        Ok((cmd_line_opts, matches))
    }

    fn from_matches(matches: &ArgMatches) -> Result<Self, WatObsErr> {
        let parse_time = |name: &str| -> Result<Option<NaiveDateTime>, WatObsErr> {
            matches.value_of(name).map(parse_datetime).transpose()
        };

        Ok(CommonCmdLineArgs {
            api_key: matches.value_of("api-key").map(ToOwned::to_owned),
            base_url: matches.value_of("base-url").map(ToOwned::to_owned),
            start: parse_time("start")?,
            end: parse_time("end")?,
        })
    }

    /// Get the API key from the command line, or else from the environment variable `var`.
    pub fn api_key(&self, var: &'static str) -> Result<String, WatObsErr> {
        match self.api_key {
            Some(ref key) => Ok(key.clone()),
            None => std::env::var(var).map_err(|_| WatObsErr::MissingApiKey(var)),
        }
    }

    /// Get the alternative url of the service, if given.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Get the start of the time interval.
    pub fn start(&self) -> Option<NaiveDateTime> {
        self.start
    }

    /// Get the end of the time interval.
    pub fn end(&self) -> Option<NaiveDateTime> {
        self.end
    }
}
