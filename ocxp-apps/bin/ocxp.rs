#[macro_use]
extern crate log;

use chrono::Utc;
use clap::{crate_version, App, Arg, ArgMatches};
use log::LevelFilter;

use ocxp::sender::{ExecSpawner, SenderClient};
use ocxp::server::Daemon;
use ocxp_common::configs::{Agent as AgentConfig, YamlAgentConfig};
use ocxp_common::error::Error;
use ocxp_common::record::{assemble, CheckSubmission};

const HOST_ARG: &str = "host";
const SERVICE_ARG: &str = "service";
const STATE_ARG: &str = "state";
const OUTPUT_ARG: &str = "output";
const PERFDATA_ARG: &str = "perfdata";
const VAR_ARG: &str = "var";
const AMQP_URL_ARG: &str = "amqp-url";
const DAEMONIZE_ARG: &str = "daemonize";
const CONFIG_ARG: &str = "config";
const VERBOSE_ARG: &str = "verbose";

const CONFIG_ENV_VAR: &str = "OCXP_CONFIGFILE";

#[tokio::main]
async fn main() {
    let matches = get_matches();
    init_logger(&matches);

    let config = match load_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    let result = if matches.is_present(DAEMONIZE_ARG) {
        Daemon::new(config).run().await
    } else {
        run_sender(&matches, &config).await
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run_sender(matches: &ArgMatches<'_>, config: &AgentConfig) -> Result<(), Error> {
    let submission = submission_from_matches(matches)?;
    let payload = assemble(&submission)?;
    let spawner = ExecSpawner::new(
        config.amqp_url().to_string(),
        matches.value_of(CONFIG_ARG).map(str::to_string),
    );
    let sender = SenderClient::new(
        config.listen_address().to_string(),
        Box::new(spawner),
        config.spawn_wait(),
    );
    sender.send(&payload).await
}

fn submission_from_matches(matches: &ArgMatches<'_>) -> Result<CheckSubmission, Error> {
    let state = required(matches, STATE_ARG)?;
    let state = state
        .parse()
        .map_err(|_| Error::malformed_input(format!("state '{}' is not an integer", state)))?;
    let variables = matches
        .values_of(VAR_ARG)
        .map(|values| values.map(str::to_string).collect())
        .unwrap_or_default();
    Ok(CheckSubmission {
        host: required(matches, HOST_ARG)?.to_string(),
        service: required(matches, SERVICE_ARG)?.to_string(),
        state,
        output: matches.value_of(OUTPUT_ARG).unwrap_or("").to_string(),
        variables,
        perfdata: required(matches, PERFDATA_ARG)?.to_string(),
        timestamp: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
    })
}

fn required<'a>(matches: &'a ArgMatches<'_>, name: &str) -> Result<&'a str, Error> {
    matches
        .value_of(name)
        .ok_or_else(|| Error::malformed_input(format!("missing required argument '--{}'", name)))
}

fn load_config(matches: &ArgMatches<'_>) -> Result<AgentConfig, Error> {
    let path = matches
        .value_of(CONFIG_ARG)
        .map(str::to_string)
        .or_else(|| std::env::var(CONFIG_ENV_VAR).ok());
    let mut config = match path {
        Some(path) => {
            debug!("loading config from {}", path);
            YamlAgentConfig::get::<AgentConfig>(&path).map_err(Error::config)?
        }
        None => AgentConfig::default(),
    };
    if let Some(url) = matches.value_of(AMQP_URL_ARG) {
        config.set_amqp_url(url.to_string());
    }
    Ok(config)
}

fn init_logger(matches: &ArgMatches<'_>) {
    let level = if matches.is_present(VERBOSE_ARG) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::builder().filter_level(level).init();
}

fn get_matches<'a>() -> ArgMatches<'a> {
    App::new("ocxp")
        .version(crate_version!())
        .about("forwards check results and perfdata to an AMQP exchange")
        .arg(
            Arg::with_name(HOST_ARG)
                .help("host name of the check")
                .takes_value(true)
                .short("h")
                .long("host"),
        )
        .arg(
            Arg::with_name(SERVICE_ARG)
                .help("service description of the check")
                .takes_value(true)
                .short("s")
                .long("service"),
        )
        .arg(
            Arg::with_name(STATE_ARG)
                .help("numeric check state (0 OK, 1 WARNING, 2 CRITICAL, 3 UNKNOWN)")
                .takes_value(true)
                .short("t")
                .long("state"),
        )
        .arg(
            Arg::with_name(OUTPUT_ARG)
                .help("plugin output text")
                .takes_value(true)
                .short("o")
                .long("output"),
        )
        .arg(
            Arg::with_name(PERFDATA_ARG)
                .help("plugin perfdata string")
                .takes_value(true)
                .short("p")
                .long("perfdata"),
        )
        .arg(
            Arg::with_name(VAR_ARG)
                .help("additional tag as name=value, may be given multiple times")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .short("v")
                .long("var"),
        )
        .arg(
            Arg::with_name(AMQP_URL_ARG)
                .help("broker url [default: amqp://localhost:5672]")
                .takes_value(true)
                .short("u")
                .long("amqp-url"),
        )
        .arg(
            Arg::with_name(DAEMONIZE_ARG)
                .help("run as the forwarding daemon instead of sending")
                .short("d")
                .long("daemonize")
                .takes_value(false),
        )
        .arg(
            Arg::with_name(CONFIG_ARG)
                .help("yaml config file [env: OCXP_CONFIGFILE]")
                .takes_value(true)
                .short("c")
                .long("config"),
        )
        .arg(
            Arg::with_name(VERBOSE_ARG)
                .help("enable debug logging")
                .short("V")
                .long("verbose")
                .takes_value(false),
        )
        .get_matches()
}
