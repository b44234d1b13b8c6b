use std::path::Path;
use std::sync::Arc;

use hyper::StatusCode;
use serde_json::json;
use tracing::info;
use waymark::config::Config;
use waymark::dispatch::{
    AccessRegistry, Dispatcher, HandlerRegistry, Json, LoginCheck, NoBody, TagKind,
};
use waymark::routing::{RouteTable, Router};
use waymark::{logger, server};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::load_from("config")?;
    logger::init(&cfg.logging)?;

    // Requests run on the blocking pool, one thread each
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.max_blocking_threads(workers);
        info!("Using {workers} blocking worker threads");
    }

    let runtime = runtime_builder.build()?;
    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let table = RouteTable::load(
        Path::new(&cfg.framework.routes_file),
        &cfg.framework.context_path,
    )
    .map_err(|e| format!("Cannot read route table '{}': {e}", cfg.framework.routes_file))?;
    let route_count = table.len();

    let mut handlers = HandlerRegistry::new(cfg.framework.controller_mode);
    register_builtin(&mut handlers, route_count);

    let mut access = AccessRegistry::new();
    access.register(TagKind::Login, Arc::new(LoginCheck));

    let dispatcher = Dispatcher::builder(Router::new(table), handlers)
        .settings(cfg.framework.clone())
        .access(access)
        .access_log(cfg.logging.access_log)
        .build()?;

    let listener = server::create_reusable_listener(addr)?;
    logger::log_server_start(&addr, &cfg, route_count);

    server::run(listener, Arc::new(dispatcher), cfg.server.max_body_size).await;
    Ok(())
}

/// Health check controller, bound as `health` (GET answers JSON, HEAD no body)
struct Health {
    routes: usize,
}

fn register_builtin(handlers: &mut HandlerRegistry, routes: usize) {
    let _ = handlers
        .controller("health", move || Health { routes })
        .entry_point(&[], &[], |health: &Health, ctx, _params| {
            if *ctx.method() == hyper::Method::HEAD {
                return Ok(Some(Box::new(NoBody(StatusCode::OK))));
            }
            Ok(Some(Box::new(Json::new(json!({
                "status": "ok",
                "routes": health.routes,
            })))))
        });
}
