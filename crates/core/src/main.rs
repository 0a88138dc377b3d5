// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use warden::config::Config;
use warden::controller::ExitReason;
use warden::run;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    run::init_tracing(&config);

    match run::run(config).await {
        Ok(report) => {
            let code = match report.exit_reason {
                ExitReason::Completed => 0,
                _ => 1,
            };
            std::process::exit(code);
        }
        Err(e) => {
            error!("fatal: {e:#}");
            std::process::exit(1);
        }
    }
}
