//! ARP service daemon
//!
//! Resolves IPv4 addresses to hardware addresses for local clients by
//! speaking the custom ARP protocol on the broadcast segment. Takes no
//! arguments; requires the privileges to open a packet socket.

use std::process;

use env_logger::Env;
use log::{error, info};

use arptour::arp::service::ArpService;

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!(target: "arp", "module started");

    let mut service = match ArpService::new() {
        Ok(service) => service,
        Err(e) => {
            error!(target: "arp", "startup failed: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = service.run() {
        error!(target: "arp", "service failed: {e}");
        process::exit(1);
    }
}
