use clap::Parser;

use bing_daily_wallpaper::Opt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(opt.log_level()))
        .format_timestamp(None)
        .init();

    bing_daily_wallpaper::run(opt).await
}
