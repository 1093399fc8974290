//! Preflight check for worker containers: output directory, media tools and
//! required environment.

use std::path::Path;

use vidiox_media::{check_ffmpeg, check_ffprobe, ToolPaths};
use vidiox_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "worker-selfcheck: starting with processed_dir={}",
        config.processed_dir.display()
    );
    ensure_dir(&config.processed_dir).await?;
    ensure_tools(&ToolPaths::from_env())?;
    ensure_env_present(&["REDIS_URL"])?;

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {}: {}", path.display(), e))
}

fn ensure_tools(tools: &ToolPaths) -> anyhow::Result<()> {
    let ffmpeg = check_ffmpeg(&tools.ffmpeg)?;
    let ffprobe = check_ffprobe(&tools.ffprobe)?;
    println!(
        "worker-selfcheck: ffmpeg={} ffprobe={}",
        ffmpeg.display(),
        ffprobe.display()
    );
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
