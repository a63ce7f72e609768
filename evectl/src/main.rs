
use std::process::ExitCode;

use clap::Parser;
use log::error;

use evectl::Args;

#[tokio::main]
async fn main() -> ExitCode {
	let args: Args = Args::parse();

	env_logger::Builder::new()
		.filter_level(args.log_level())
		.parse_default_env()
		.init();

	match args.run().await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			error!("{}", e);
			eprintln!("error: {}", e);
			ExitCode::FAILURE
		},
	}
}
