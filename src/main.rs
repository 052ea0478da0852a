mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志系统
    ruscenario::logger::init_logger(cli.verbose);

    let passed = match cli.command {
        Commands::Run(args) => cli::run(args, cli.verbose).await?,
        Commands::Check(args) => cli::check(args)?,
    };

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}
