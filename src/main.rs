use std::net::SocketAddr;

use eco_relay::config::Config;
use eco_relay::server::{routes, Server};
use eco_relay::tls;
use log::{error, info, warn};
use warp::filters::BoxedFilter;
use warp::Reply;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let server = Server::new(config.max_image_bytes);
    let routes = routes(server, &config);
    let addr = config.socket_addr();

    match &config.tls {
        Some(paths) => match tls::validate(paths) {
            Ok(_) => {
                info!("Starting secure relay (HTTPS/WSS) on {addr}");
                warp::serve(routes)
                    .tls()
                    .cert_path(&paths.cert)
                    .key_path(&paths.key)
                    .run(addr)
                    .await;
            }
            Err(e) => {
                warn!("Failed to load TLS config ({e}), falling back to HTTP/WS");
                serve_plain(routes, addr).await;
            }
        },
        None => serve_plain(routes, addr).await,
    }
}

async fn serve_plain(routes: BoxedFilter<(Box<dyn Reply>,)>, addr: SocketAddr) {
    match warp::serve(routes).try_bind_ephemeral(addr) {
        Ok((bound, server)) => {
            info!("Starting relay (HTTP/WS) on {bound}");
            server.await;
        }
        Err(e) => {
            error!("Failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    }
}
