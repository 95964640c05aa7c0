mod run;
mod setup;
mod signal;

use ostinato_core::midi::{list_inputs, list_outputs};

const USAGE: &str = "\
usage: ostinato [mode] [options]

modes (default: looper):
  --sustain       hold-pedal passthrough, no looping
  --monitor       print incoming events per source
  --proxy         forward all inputs to the output untouched
  --setup         provision mod-host from the config, then exit
  --list-ports    list MIDI ports, then exit

options:
  -v, --verbose   debug logging
  -h, --help      this text
";

fn init_logging(verbose: bool) {
    use simplelog::*;

    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .expect("Failed to initialize logger");
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print!("{}", USAGE);
        return;
    }
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    init_logging(verbose);

    if args.iter().any(|a| a == "--list-ports") {
        if let Err(e) = list_ports() {
            eprintln!("ostinato: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let config = ostinato_core::config::Config::load();
    signal::install();

    let result = if args.iter().any(|a| a == "--setup") {
        setup::run(&config)
    } else if args.iter().any(|a| a == "--sustain") {
        run::sustain(&config)
    } else if args.iter().any(|a| a == "--monitor") {
        run::monitor(&config)
    } else if args.iter().any(|a| a == "--proxy") {
        run::proxy(&config)
    } else {
        run::repeater(&config)
    };

    if let Err(e) = result {
        eprintln!("ostinato: {}", e);
        std::process::exit(1);
    }
}

fn list_ports() -> Result<(), ostinato_core::midi::MidiPortError> {
    println!("inputs:");
    for name in list_inputs()? {
        println!("  {}", name);
    }
    println!("outputs:");
    for name in list_outputs()? {
        println!("  {}", name);
    }
    Ok(())
}
