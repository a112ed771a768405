// `autobuild serve`: run the upload proxy until Ctrl-C

use std::sync::Arc;

use autobuild_lib::services::{build_router, ProxyServerManager, ReleasePublisher};
use autobuild_lib::AutobuildResult;

use super::Context;

pub async fn execute(ctx: &Context) -> AutobuildResult<()> {
    let publisher = Arc::new(ReleasePublisher::new(ctx.github()?));
    let options = ctx.config.proxy_options();
    let router = build_router(publisher, &options);

    let manager = ProxyServerManager::new();
    let addr = manager.start(router, ctx.config.listen_addr()?).await?;
    println!(
        "Upload proxy listening on http://{}{}/upload (Ctrl-C to stop)",
        addr, options.base_path
    );

    tokio::signal::ctrl_c().await?;
    manager.stop().await;
    Ok(())
}
