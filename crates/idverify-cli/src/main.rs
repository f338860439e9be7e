use clap::Parser;

mod cli;
mod cmd;
mod error;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let parsed = cli::Cli::parse();
    if let Err(err) = cmd::run(parsed.command) {
        eprintln!("error: {err}");
        std::process::exit(err.exit_code());
    }
}
