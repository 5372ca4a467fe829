use std::error::Error;
use std::process::exit;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use k8047_logger::config::RunConfig;
use k8047_logger::k8047::K8047;
use k8047_logger::sampler;
use k8047_logger::session::Session;
use log::warn;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config = RunConfig::from_args();
    config.echo();

    let driver = K8047::open()?;
    let mut session = Session::acquire(driver)?;

    if !session.check_connected()? {
        if config.debug {
            warn!("no device connected, continuing in debug mode");
        } else {
            eprintln!("No device connected.");
            return Ok(());
        }
    }

    if let Some(scales) = &config.scales {
        session.apply_gains(scales);
    }

    let stop = Arc::new(AtomicBool::new(false));
    let stop_clone = stop.clone();
    ctrlc::set_handler(move || {
        if stop_clone.load(Ordering::Relaxed) {
            eprintln!("Killing...");
            exit(-1);
        }
        stop_clone.store(true, Ordering::Relaxed);
    })?;

    let summary = sampler::run(&mut session, &config, &stop);
    if config.interactive {
        println!("{}", summary.report());
    }

    Ok(())
}
