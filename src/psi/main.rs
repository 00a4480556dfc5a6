use anyhow::{Context, Result};
use banded_okvs_psi::cli_utils::Args;
use banded_okvs_psi::psi::run;
use clap::Parser;

fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = Args::parse();

    println!("{:?}", args);

    run(args).with_context(|| "Failed to run the protocol.")?;

    Ok(())
}
