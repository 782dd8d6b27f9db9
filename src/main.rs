use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::{Duration, SystemTime};

use log::{error, info, warn};
use tokio::runtime::{Builder, Runtime};
use tracing::Subscriber;
use tracing_subscriber::EnvFilter;

use crate::brain::hysteresis;
use crate::brain::setpoint::TemperatureSetpoint;
use crate::brain::BrainFailure;
use crate::config::{Config, HydrometerConfig, OutputConfig, ThermometerConfig};
use crate::fermentation::{FermentationController, Persisters, State};
use crate::io::controls::actuator::TemperatureActuator;
use crate::io::controls::{ActiveHighGpioOutput, DigitalOutput};
use crate::io::gpio::GPIOManager;
use crate::io::sensors::ds18b20::Ds18b20Thermometer;
use crate::io::sensors::file::{LiveFileHydrometer, LiveFileThermometer};
use crate::io::sensors::null::{NullHydrometer, NullThermometer};
use crate::io::sensors::{HydrometerReader, ThermometerReader};
use crate::io::IOBundle;
use crate::logging::{LoggingHandle, LOGGING_ENV_FILE};
use crate::monitor::brewfather::{Brewfather, SnapshotUploader};
use crate::monitor::{run_monitor, FermentationMonitor};
use crate::time_util::mytime::{RealTimeProvider, TimeProvider};

mod brain;
mod config;
mod fermentation;
mod io;
mod logging;
mod monitor;
mod temperature;
mod time_util;

const CONFIG_FILE: &str = "fermbot.toml";

fn main() {
    println!("Preparing...");

    let config = fs::read_to_string(CONFIG_FILE)
        .expect("Unable to read config file. Is it missing?");
    let config: Config = toml::from_str(&config)
        .expect("Error reading config file");

    let logging_handle = logging::init_logging()
        .expect("Failed to initialize logging");

    if let Err(e) = config.validate() {
        error!("Invalid config: {}", e);
        return;
    }

    let time: Arc<dyn TimeProvider> = Arc::new(RealTimeProvider::default());

    let io_bundle = match make_io_bundle(&config, &time) {
        Ok(io_bundle) => io_bundle,
        Err(e) => {
            error!("Failed to set up outputs and hysteresis profile: {}", e);
            return;
        }
    };

    let rt = Builder::new_multi_thread()
        .worker_threads(3)
        .enable_time()
        .enable_io()
        .build()
        .expect("Expected to be able to make runtime");

    let (updates_sender, updates_receiver) = tokio::sync::mpsc::channel(32);
    let mut monitor = FermentationMonitor::new();
    if let Some(snapshot_log) = config.get_persistence().get_snapshot_log() {
        monitor = monitor.with_snapshot_log(snapshot_log);
    }
    let uploader = config.get_brewfather()
        .map(|brewfather| Arc::new(Brewfather::new(brewfather)) as Arc<dyn SnapshotUploader>);
    rt.spawn(run_monitor(Arc::new(Mutex::new(monitor)), updates_receiver,
                         *config.get_schedule().get_snapshot_period(), uploader, time.clone()));

    let persisters = Persisters::in_directory(config.get_persistence().get_directory());
    let mut controller = FermentationController::new(io_bundle, config.get_hysteresis().clone(),
                                                     *config.get_schedule().get_control_period(), persisters, time)
        .with_updates(updates_sender);

    if let Err(e) = controller.restore(&rt) {
        error!("Failed to restore fermentation: {}", e);
        shutdown(rt, controller);
        return;
    }

    if let Some(profile_file) = std::env::args().nth(1) {
        if let Err(e) = start_profile(&mut controller, Path::new(&profile_file), &rt) {
            error!("Failed to start profile from {}: {}", profile_file, e);
            shutdown(rt, controller);
            return;
        }
    }

    main_loop(controller, rt, logging_handle);
}

fn start_profile(controller: &mut FermentationController, profile_file: &Path, rt: &Runtime) -> Result<(), String> {
    if controller.state() != State::PendingProfile {
        warn!("Ignoring {}, already have a profile ({:?})", profile_file.display(), controller.state());
        return Ok(());
    }
    let profile = fs::read_to_string(profile_file)
        .map_err(|e| format!("Failed to read: {}", e))?;
    let setpoints: Vec<TemperatureSetpoint> = serde_json::from_str(&profile)
        .map_err(|e| format!("Invalid profile: {}", e))?;
    controller.set_profile(setpoints).map_err(|e| e.to_string())?;
    controller.start(rt).map_err(|e| e.to_string())
}

fn make_io_bundle(config: &Config, time: &Arc<dyn TimeProvider>) -> Result<IOBundle, BrainFailure> {
    let heater = make_output(config.get_heater(), config.is_simulation(), "Heater")?;
    let cooler = make_output(config.get_cooler(), config.is_simulation(), "Cooler")?;
    let actuator = TemperatureActuator::new(heater, cooler, time.as_ref())?
        .with_relay_settle_time(config.get_relay_settle_time());
    // Rebuilt whenever a profile starts. Fail here rather than then.
    hysteresis::from_config(config.get_hysteresis(), actuator.configuration(), time.as_ref())?;

    Ok(IOBundle::new(make_thermometer(config.get_thermometer(), time),
                     make_hydrometer(config.get_hydrometer(), time),
                     actuator))
}

fn make_output(output: &OutputConfig, simulation: bool, name: &'static str) -> Result<Option<Box<dyn DigitalOutput>>, BrainFailure> {
    if !output.is_enabled() {
        return Ok(None);
    }
    let output: Box<dyn DigitalOutput> = Box::new(ActiveHighGpioOutput::create(make_gpio(simulation), output.get_pin(), name)?);
    Ok(Some(output))
}

#[cfg(target_family = "unix")]
fn make_gpio(simulation: bool) -> Box<dyn GPIOManager> {
    if simulation {
        Box::new(io::gpio::dummy::Dummy::new())
    } else {
        Box::new(io::gpio::sysfs_gpio::SysFsGPIO::new())
    }
}

#[cfg(not(target_family = "unix"))]
fn make_gpio(simulation: bool) -> Box<dyn GPIOManager> {
    if !simulation {
        warn!("No GPIO support on this platform, using in-memory GPIO");
    }
    Box::new(io::gpio::dummy::Dummy::new())
}

fn make_thermometer(config: &ThermometerConfig, time: &Arc<dyn TimeProvider>) -> Arc<dyn ThermometerReader> {
    match config {
        ThermometerConfig::None => Arc::new(NullThermometer),
        ThermometerConfig::Ds18b20 { device_id } => Arc::new(Ds18b20Thermometer::new(device_id.clone())),
        ThermometerConfig::LiveFile { file } => Arc::new(LiveFileThermometer::new(file.clone()).with_time_provider(time.clone())),
    }
}

fn make_hydrometer(config: &HydrometerConfig, time: &Arc<dyn TimeProvider>) -> Arc<dyn HydrometerReader> {
    match config {
        HydrometerConfig::None => Arc::new(NullHydrometer),
        HydrometerConfig::LiveFile { file } => Arc::new(LiveFileHydrometer::new(file.clone()).with_time_provider(time.clone())),
    }
}

fn logging_env_modified() -> Option<SystemTime> {
    fs::metadata(LOGGING_ENV_FILE).and_then(|metadata| metadata.modified()).ok()
}

fn main_loop(mut controller: FermentationController, rt: Runtime, logging_handle: LoggingHandle<EnvFilter, impl Subscriber>) {
    let should_exit = Arc::new(AtomicBool::new(false));

    {
        let should_exit = should_exit.clone();
        ctrlc::set_handler(move || {
            println!("Received termination signal.");
            should_exit.store(true, Ordering::Relaxed);
        }).expect("Failed to attach kill handler.");
    }

    let mut logging_env_last_modified = logging_env_modified();
    let mut i = 0;
    info!("Beginning main loop.");
    loop {
        i += 1;
        if i % 60 == 0 {
            info!("Still alive.. {:?}", controller.state());
            if let Some(info) = controller.remaining_setpoint_info() {
                info!("{}", info);
            }
            match controller.statistics() {
                Ok(statistics) => info!("{}", statistics),
                Err(e) => warn!("Failed to get statistics: {}", e.get_description()),
            }

            let modified = logging_env_modified();
            if modified != logging_env_last_modified {
                logging_env_last_modified = modified;
                match logging::reload_log_level(&logging_handle) {
                    Ok(filter) => info!("Reloaded log level: {}", filter),
                    Err(e) => warn!("Failed to reload log level: {:?}", e),
                }
            }
        }

        if should_exit.load(Ordering::Relaxed) {
            info!("Stopping safely...");
            shutdown(rt, controller);
            info!("Stopped safely.");
            return;
        }

        if !controller.is_control_loop_alive() {
            error!("Temperature control stopped unexpectedly. Shutting down.");
            shutdown(rt, controller);
            return;
        }

        sleep(Duration::from_secs(1));
    }
}

fn shutdown(rt: Runtime, mut controller: FermentationController) {
    if let Err(e) = controller.shutdown() {
        error!("FAILED TO TURN OFF HEATER AND COOLER: {}", e);
    }
    rt.shutdown_background();
}
