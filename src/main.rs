use clap::Parser;
use env_logger::Env;

use vton_factory::Opts;
use vton_factory::cli::SubCommandExtend;
use vton_factory::config::SubCommand;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();

    match &opts.subcmd {
        SubCommand::Run(config) => config.run(&opts),
        SubCommand::Tryon(config) => config.run(&opts),
        SubCommand::Generate(config) => config.run(&opts),
        SubCommand::Composite(config) => config.run(&opts),
        SubCommand::Colors(config) => config.run(&opts),
    }
}
