//! Tour daemon
//!
//! `tour` runs a passive node that waits for the route packet to arrive.
//! `tour host1 host2 ...` runs the source node; the arguments define the
//! visit order, with this node inserted as the first element.

use std::{env, process};

use env_logger::Env;
use log::error;

use arptour::tour::service::TourService;

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let hosts: Vec<String> = env::args().skip(1).collect();

    let mut service = match TourService::new() {
        Ok(service) => service,
        Err(e) => {
            error!(target: "tour", "startup failed: {e}");
            process::exit(1);
        }
    };

    if !hosts.is_empty() {
        if let Err(e) = service.start(&hosts) {
            error!(target: "tour", "{e}");
            process::exit(1);
        }
    }

    if let Err(e) = service.run() {
        error!(target: "tour", "service failed: {e}");
        process::exit(1);
    }
}
