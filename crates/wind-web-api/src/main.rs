use wind_web_api::{
    Config,
    server::{init_tracing, start_server},
};

#[cfg(feature = "use_mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let config = Config::from_env();
    init_tracing(&config);
    start_server(config).await
}
