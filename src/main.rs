use anyhow::Result;
use clap::Parser;
use cnfprobe::cli::{Cli, OutputFormat};
use cnfprobe::trigger::ConnectorTrigger;
use cnfprobe::{output, probe, subordinate};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let trigger = ConnectorTrigger::new(&args.library)?;

    if args.tracee_only {
        println!("{}", output::HEADER);
        subordinate::enter(&trigger, false);
    }

    let config = args.probe_config();
    let report = probe::run(&trigger, &config);

    match args.format {
        OutputFormat::Text => print!("{}", output::render_text(&report)),
        OutputFormat::Json => println!("{}", output::render_json(&report)?),
    }
    std::io::Write::flush(&mut std::io::stdout()).ok();

    std::process::exit(report.exit_code());
}
