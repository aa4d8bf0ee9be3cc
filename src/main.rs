use clap::Parser;

use tibet_core::cli::{dispatch, Cli};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    dispatch(cli)
}
