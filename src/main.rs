use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use std::path::PathBuf;
use std::time::Instant;

use weather_hmm::hmm::{weather, Model, StateId};
use weather_hmm::utils::{error_rate, Config, Method, OutputFormat, Report};
use weather_hmm::{Decoder, ExhaustiveSearch, SequenceGenerator, Viterbi};

fn names(model: &Model, states: &[StateId]) -> Result<Vec<String>> {
    Ok(states.iter()
        .map(|s| model.state_name(*s).map(String::from))
        .collect::<weather_hmm::Result<Vec<String>>>()?)
}

fn decoder<'a>(model: &'a Model, config: &Config) -> Box<dyn Decoder + 'a> {
    match config.method {
        Method::Viterbi => Box::new(Viterbi::new(model, config.domain)),
        Method::Exhaustive => Box::new(ExhaustiveSearch::new(model, config.domain)),
    }
}

fn run(config: &Config) -> Result<Report> {
    let model = weather::model()?;
    let observations = model.parse_symbols(&config.observations)?;
    let mut decoder = decoder(&model, config);

    let start = Instant::now();
    let result = decoder.decode(&observations)?;
    info!(method = %decoder.name(), elapsed_us = start.elapsed().as_micros() as u64, "decoded observations");

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let generator = SequenceGenerator::new(&model);
    let start_state = model.state_id(&config.start)?;
    let generated_states = generator.sample_states(config.length, start_state, &mut rng)?;
    let generated_observations = generator.sample_observations(&generated_states, &mut rng)?;

    // Generated sequences may be longer than the exhaustive search allows.
    let mut viterbi = Viterbi::new(&model, config.domain);
    let decoded_generated = viterbi.decode(&generated_observations)?;
    let error_rate = error_rate(decoded_generated.path(), &generated_states)?;

    let generated_observations = generated_observations.iter()
        .map(|o| model.symbol_name(*o).map(String::from))
        .collect::<weather_hmm::Result<Vec<String>>>()?;

    Ok(Report {
        method: config.method,
        domain: config.domain,
        observations: config.observations.clone(),
        most_likely: names(&model, result.path())?,
        probability: result.probability(),
        log_probability: result.log_probability(),
        degraded_at: result.degraded_at(),
        generated_states: names(&model, &generated_states)?,
        generated_observations,
        decoded_generated: names(&model, decoded_generated.path())?,
        error_rate,
    })
}

fn apply_overrides(config: &mut Config, matches: &ArgMatches) -> Result<()> {
    for option in ["method", "length", "start", "seed", "domain", "format"] {
        if let Some(value) = matches.get_one::<String>(option) {
            config.set(option, value)?;
        }
    }
    if let Some(values) = matches.get_many::<String>("observations") {
        let joined = values.cloned().collect::<Vec<String>>().join(" ");
        config.set("observations", &joined)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let matches = Command::new("Weather HMM")
        .version("0.1")
        .author("Alexandre Dubray <alexandre.dubray@uclouvain.be>")
        .about("Most likely weather sequence from ground observations")
        .arg(Arg::new("config")
            .short('c')
            .long("config")
            .value_name("FILE")
            .help("configuration file with option=value lines"))
        .arg(Arg::new("observations")
            .short('o')
            .long("observations")
            .value_name("SYMBOL")
            .num_args(1..)
            .help("observation sequence to decode, e.g. Dry Damp Wet"))
        .arg(Arg::new("method")
            .short('m')
            .long("method")
            .value_parser(["viterbi", "exhaustive"])
            .help("decoder to use"))
        .arg(Arg::new("length")
            .short('n')
            .long("length")
            .help("length of the generated weather sequence"))
        .arg(Arg::new("start")
            .short('s')
            .long("start")
            .value_name("STATE")
            .help("first state of the generated weather sequence"))
        .arg(Arg::new("seed")
            .long("seed")
            .help("seed for the random generator"))
        .arg(Arg::new("domain")
            .short('d')
            .long("domain")
            .value_parser(["linear", "log"])
            .help("probability representation used while decoding"))
        .arg(Arg::new("format")
            .short('f')
            .long("format")
            .value_parser(["text", "json"])
            .help("output format"))
        .arg(Arg::new("verbose")
            .short('v')
            .long("verbose")
            .action(ArgAction::SetTrue)
            .help("enable debug logging"))
        .arg(Arg::new("quiet")
            .short('q')
            .long("quiet")
            .action(ArgAction::SetTrue)
            .help("only log errors"))
        .get_matches();

    let level = if matches.get_flag("verbose") {
        "debug"
    } else if matches.get_flag("quiet") {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match matches.get_one::<String>("config") {
        Some(f) => {
            let path = PathBuf::from(f);
            Config::from_config_file(&path).with_context(|| format!("reading {}", path.display()))?
        }
        None => Config::default(),
    };
    apply_overrides(&mut config, &matches)?;

    let report = run(&config)?;
    match config.format {
        OutputFormat::Text => print!("{}", report.to_text()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }
    Ok(())
}
