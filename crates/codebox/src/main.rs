use anyhow::Context;
use clap::Parser;

fn main() -> anyhow::Result<()> {
    let cli = codebox::Cli::parse();
    codebox::init_logging(&cli.log);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    let result = runtime.block_on(codebox::run(cli));
    if let Err(err) = &result {
        tracing::error!(error = ?err, "service exited with error");
    }
    result
}
