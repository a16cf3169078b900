use lib_hearth::{cli::CliArgs, Application};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let app = Application::new(args).await?;

    if let Err(err) = app.run().await {
        tracing::error!(error = %err, "hearth server exited with an error");
        std::process::exit(1);
    }
    Ok(())
}
