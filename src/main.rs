mod api;
mod config;
mod datastore;
mod metrics;
mod twoface;

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate prometheus;

use crate::config::Config;
use crate::datastore::{Database, RestoreStatus, SharedStore};
use actix_web::dev::{Service, ServiceResponse};
use actix_web::{middleware, web, App, HttpServer};
use anyhow::{bail, Context};
use futures::future::{try_join, FutureExt};
use tracing::{error, info, warn, Level};

fn main() {
    let args: Vec<_> = std::env::args().collect();
    let [_, config_file_path, ..] = &args[..] else {
        eprintln!("First argument should be path to config file");
        return;
    };

    let config = match Config::from_file(config_file_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(1);
        }
    };

    // Set up logger output
    let subscriber_builder = tracing_subscriber::fmt().with_max_level(Level::DEBUG);
    if config.human_logs {
        subscriber_builder.init();
    } else {
        subscriber_builder.json().init();
    }

    info!("starting blogstore");

    let sys = actix_rt::System::new();
    if let Err(e) = sys.block_on(run(config)) {
        error!("blogstore stopped: {:#}", e);
        std::process::exit(1);
    }
}

/// Open the datastore, serve until shutdown, then write the snapshot one last time.
async fn run(config: Config) -> anyhow::Result<()> {
    let db = Database::open(&config.data_file);
    check_restore(db.restore_status(), config.strict_restore)?;

    let state = api::State {
        ds: SharedStore::new(db),
    };

    // Start the API server
    info!(addr = &config.listen_address[..], "starting blog API server");
    let max_body_size = config.max_body_size;
    let api_state = state.clone();
    let api_server = HttpServer::new(move || {
        App::new()
            // Middleware for Prometheus
            .wrap_fn(|request, srv| srv.call(request).map(increment_response_metrics))
            .app_data(web::Data::new(api_state.clone()))
            // enable logger
            .wrap(middleware::Logger::default())
            // limit size of the payload (global configuration)
            .app_data(api::json_config(max_body_size))
            .app_data(api::query_config())
            .configure(api::configure)
    })
    .bind(&config.listen_address)
    .with_context(|| format!("couldn't bind blog API server to {}", config.listen_address))?
    .run();

    // Start the metrics server
    info!(addr = &config.metrics_address[..], "starting metrics server");
    let metrics_server = HttpServer::new(|| {
        App::new().service(
            web::scope("/metrics")
                .route("/", web::get().to(metrics::endpoint::gather))
                .route("", web::get().to(metrics::endpoint::gather)),
        )
    })
    .bind(&config.metrics_address)
    .with_context(|| format!("couldn't bind metrics server to {}", config.metrics_address))?
    .run();

    try_join(api_server, metrics_server).await?;

    info!("servers stopped, flushing datastore");
    state.ds.flush().await.map_err(|e| e.internal)?;
    Ok(())
}

/// With `strict`, an unreadable snapshot stops startup instead of being replaced by an
/// empty store on the next write.
fn check_restore(status: &RestoreStatus, strict: bool) -> anyhow::Result<()> {
    match status {
        RestoreStatus::StartedEmpty { reason } if strict => {
            bail!("refusing to start with an unreadable snapshot: {}", reason)
        }
        RestoreStatus::StartedEmpty { reason } => {
            warn!(reason = &reason[..], "snapshot unreadable, datastore started empty");
        }
        RestoreStatus::Missing | RestoreStatus::Restored { .. } => {}
    }
    Ok(())
}

/// If response is OK, increment the metrics for HTTP statuses.
fn increment_response_metrics<E, B>(
    response: Result<ServiceResponse<B>, E>,
) -> Result<ServiceResponse<B>, E> {
    match response {
        Ok(response) => {
            metrics::HTTP_RESPONSES
                .with_label_values(&[response.status().as_str()])
                .inc();
            Ok(response)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_restore_refuses_unreadable_snapshot() {
        let broken = RestoreStatus::StartedEmpty {
            reason: "couldn't parse snapshot data.json".to_owned(),
        };
        let err = check_restore(&broken, true).unwrap_err();
        assert!(err.to_string().contains("couldn't parse snapshot data.json"));
        assert!(check_restore(&broken, false).is_ok());

        let fine = [
            RestoreStatus::Missing,
            RestoreStatus::Restored { users: 1, posts: 0 },
        ];
        for status in &fine {
            assert!(check_restore(status, true).is_ok());
            assert!(check_restore(status, false).is_ok());
        }
    }
}
