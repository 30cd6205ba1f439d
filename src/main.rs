/*!
 * subprocess - Command Runner
 *
 * Runs `argv[1..]` as a child with PATH search and inherited stdio, waits
 * for it and exits with its status. Base options may be supplied as JSON
 * in SUBPROCESS_OPTIONS; arguments on the command line replace its `args`.
 */

use miette::{IntoDiagnostic, Result};
use subprocess_core::{init_tracing, spawn, SpawnOptions};
use tracing::{debug, info};

const OPTIONS_VAR: &str = "SUBPROCESS_OPTIONS";

fn base_options() -> Result<SpawnOptions> {
    match std::env::var(OPTIONS_VAR) {
        Ok(json) => {
            debug!(var = OPTIONS_VAR, "Loading base spawn options");
            Ok(SpawnOptions::from_json(&json)?)
        }
        Err(std::env::VarError::NotPresent) => Ok(SpawnOptions::default()),
        Err(e) => Err(e).into_diagnostic(),
    }
}

fn main() -> Result<()> {
    init_tracing();

    let mut options = base_options()?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        options.args = args;
    }
    if options.args.is_empty() {
        return Err(miette::miette!(
            help = "pass the program and its arguments, or set SUBPROCESS_OPTIONS",
            "usage: subprocess <program> [args...]"
        ));
    }
    options.search_path = true;

    let spawned = spawn(options)?;
    let status = spawned.process.wait()?;
    info!(pid = spawned.process.id(), "Child finished with {}", status);

    std::process::exit(status.code_or_signal());
}
