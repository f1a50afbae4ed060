// ABOUTME: Production server binary for the Classera LTI bridge
// ABOUTME: Loads configuration, bootstraps keys and storage, and serves the HTTP API
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # LTI Bridge Server Binary
//!
//! Starts the LTI 1.3 launch and grade-passback service: environment
//! configuration, signing-key bootstrap, database migration, and the
//! HTTP listener.

use anyhow::Result;
use clap::Parser;
use lti_bridge_server::{
    config::environment::ServerConfig, crypto::KeyManager, database::Database, logging,
    resources::ServerResources, server,
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "lti-bridge-server")]
#[command(about = "Classera LTI 1.3 bridge - launch handling and grade passback")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }

    info!("Starting LTI bridge server");
    info!("{}", config.summary());

    let key_manager = KeyManager::bootstrap(config.signing_key_pem.as_deref())?;
    info!("signing key ready (kid {})", key_manager.kid());

    let database = Database::new(&config.database_url).await?;
    info!("database initialized and migrated");

    let resources = Arc::new(ServerResources::new(config, database, key_manager));

    server::run(resources).await
}
