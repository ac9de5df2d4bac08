use clap::Parser;
use hostfix_cli::Cli;
use hostfix_core::report;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if !hostfix_elevation::is_elevated() {
        eprintln!("hostfix needs administrator rights; relaunching elevated");
        if let Err(e) = hostfix_elevation::relaunch_elevated() {
            eprintln!("could not relaunch elevated: {e}");
        }
        std::process::exit(hostfix_elevation::ELEVATION_REQUIRED_EXIT_CODE);
    }

    run_main(cli)
}

#[tokio::main]
async fn run_main(cli: Cli) -> anyhow::Result<()> {
    let summary = hostfix_cli::run(cli).await?;
    println!("{}", report::render_summary(&summary));
    Ok(())
}
