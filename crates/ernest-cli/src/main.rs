//! Binary entrypoint for the `ernest` command.

#[tokio::main]
async fn main() {
    let code = ernest_cli::run().await;
    std::process::exit(code);
}
