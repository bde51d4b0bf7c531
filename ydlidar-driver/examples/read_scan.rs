//! Prints revolutions as JSON lines.
//!
//! ```bash
//! RUST_LOG=debug cargo run --example read_scan -- /dev/ttyUSB0 --model g4 --count 10
//! ```

use clap::Parser;
use std::time::Duration;
use ydlidar_data::{model_baud_rate, DriverConfig, YdlidarModel};
use ydlidar_driver::{ascend_scan_data, ErrorKind, YdlidarDriver};

#[derive(Parser, Debug)]
#[command(name = "read_scan")]
#[command(about = "Reads revolutions from a YDLiDAR")]
struct Args {
    /// The device path to a serial port
    port: String,

    /// Device model (x2, x4, s2, s4, s4b, g4, g4pro, g6, tg15, tg30, tg50, tminipro)
    #[arg(long, default_value = "x2", value_parser = parse_model)]
    model: YdlidarModel,

    /// Overrides the model's baud rate
    #[arg(long)]
    baud_rate: Option<u32>,

    /// Number of revolutions to print, 0 for no limit
    #[arg(long, default_value_t = 0)]
    count: usize,

    /// Skips the health and device info check
    #[arg(long)]
    force: bool,

    /// Gives up as soon as the link is lost
    #[arg(long)]
    no_reconnect: bool,

    /// Sorts every revolution by angle
    #[arg(long)]
    ascend: bool,
}

fn parse_model(name: &str) -> Result<YdlidarModel, String> {
    let model = match name.to_ascii_lowercase().as_str() {
        "x2" => YdlidarModel::X2,
        "x4" => YdlidarModel::X4,
        "s2" => YdlidarModel::S2,
        "s4" => YdlidarModel::S4,
        "s4b" => YdlidarModel::S4B,
        "g4" => YdlidarModel::G4,
        "g4pro" => YdlidarModel::G4Pro,
        "g6" => YdlidarModel::G6,
        "tg15" => YdlidarModel::TG15,
        "tg30" => YdlidarModel::TG30,
        "tg50" => YdlidarModel::TG50,
        "tminipro" => YdlidarModel::TMiniPro,
        _ => return Err(format!("unknown model \"{}\"", name)),
    };
    Ok(model)
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = DriverConfig {
        auto_reconnect: !args.no_reconnect,
        ..DriverConfig::for_model(args.model)
    };
    let timeout = config.timeout;
    let driver = YdlidarDriver::serial(config);

    let baud_rate = args.baud_rate.unwrap_or_else(|| model_baud_rate(args.model));
    if let Err(e) = driver.connect(&args.port, baud_rate) {
        log::error!("Failed to open \"{}\": {}", args.port, e);
        std::process::exit(1);
    }
    if let Err(e) = driver.start_scan(args.force, timeout) {
        log::error!("Failed to start scanning: {}", e);
        std::process::exit(1);
    }

    let mut printed = 0;
    while args.count == 0 || printed < args.count {
        let mut scan = match driver.grab_scan_data(Duration::from_secs(2)) {
            Ok(scan) => scan,
            Err(e) if e.kind() == ErrorKind::Timeout => {
                log::warn!("{}", e);
                continue;
            }
            Err(e) => {
                log::error!("{}", e);
                break;
            }
        };
        if args.ascend {
            ascend_scan_data(&mut scan.samples);
        }
        match serde_json::to_string(&scan) {
            Ok(line) => println!("{}", line),
            Err(e) => log::error!("{}", e),
        }
        printed += 1;
    }

    log::info!("{:?}", driver.stats());
    if let Err(e) = driver.stop() {
        log::warn!("{}", e);
    }
}
