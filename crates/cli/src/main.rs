use clap::Parser;

fn main() -> anyhow::Result<()> {
    demandflow_observability::init();

    let cli = demandflow_cli::Cli::parse();
    demandflow_cli::run(cli)
}
