use clap::{Arg, ArgAction, ArgMatches, Command};
use ydlidar_sdk::{Calibrator, LidarConfig, TomlCalibrationStore, YDLidarError};

fn command() -> Command {
    let file = Arg::new("file")
        .help("Path to the calibration file")
        .required(true);
    let serial = Arg::new("serial")
        .help("Serial number of the lidar, as printed at connection")
        .required(true);

    Command::new("YDLiDAR calibration tool.")
        .about("Inspects serial ports, configuration and stored angle offsets.")
        .disable_version_flag(true)
        .subcommand_required(true)
        .subcommand(Command::new("ports").about("Lists the serial ports"))
        .subcommand(
            Command::new("config")
                .about("Prints the effective settings of a configuration file")
                .arg(Arg::new("path").help("TOML configuration").required(true))
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Prints the angle offset stored for a lidar")
                .arg(file.clone())
                .arg(serial.clone()),
        )
        .subcommand(
            Command::new("reset")
                .about("Marks a lidar as uncalibrated")
                .arg(file)
                .arg(serial),
        )
}

fn calibrator(matches: &ArgMatches) -> (Calibrator, String) {
    let file: &String = matches.get_one("file").unwrap();
    let serial: &String = matches.get_one("serial").unwrap();
    let store = TomlCalibrationStore::new(file);
    (Calibrator::new(Box::new(store), 0.), serial.to_string())
}

fn main() -> Result<(), YDLidarError> {
    env_logger::init();

    match command().get_matches().subcommand() {
        Some(("ports", _)) => {
            let ports = ydlidar_sdk::available_ports()?;
            if ports.is_empty() {
                println!("No serial port found.");
            }
            for (name, description) in ports {
                println!("{}\t{}", name, description);
            }
        }
        Some(("config", matches)) => {
            let path: &String = matches.get_one("path").unwrap();
            let config = LidarConfig::from_file(path)?;
            if matches.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&config).unwrap());
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
        Some(("show", matches)) => {
            let (mut calibrator, serial) = calibrator(matches);
            let state = calibrator.load(&serial);
            println!(
                "{}: offset {} deg, {}",
                serial,
                state.angle_offset_deg,
                if state.is_corrected { "corrected" } else { "uncorrected" }
            );
        }
        Some(("reset", matches)) => {
            let (mut calibrator, serial) = calibrator(matches);
            calibrator.load(&serial);
            calibrator.reset()?;
            println!("{}: marked as uncalibrated", serial);
        }
        _ => unreachable!(),
    }
    Ok(())
}
