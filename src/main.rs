use clap::Parser;
use log::info;

use gascloud::{AppError, Args, CloudApp};

fn main() -> Result<(), AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("gascloud=info,wgpu=warn"))
        .init();

    let args = Args::parse();
    let config = args.resolve()?;

    if let Some(path) = &args.snapshot {
        info!("Rendering snapshot without a window");
        return gascloud::snapshot::write_snapshot(&config, path, args.snapshot_width, args.snapshot_height);
    }

    CloudApp::run(config)
}
