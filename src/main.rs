use anyhow::Result;
use clap::Parser;
use shipguard::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let code = cli.run().await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
