use clap::Parser;

use sleeptrack_lib::cli::Args;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(err) = sleeptrack_lib::run(args).await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
