use clap::Parser;
use leafscan_lib::Cli;

#[tokio::main]
async fn main() {
    leafscan_lib::init_logging();

    if let Err(e) = leafscan_lib::run(Cli::parse()).await {
        log::error!("{}", e);
        std::process::exit(leafscan_lib::exit_code(&e));
    }
}
