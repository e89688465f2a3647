use std::{fs::File, io::prelude::*, path::PathBuf, time::Duration};

use anyhow::{anyhow, Error};
use structopt::StructOpt;

use tesla_owner_api::{Config, TeslaApi, Validate, Vehicle};

#[derive(Debug, StructOpt)]
struct Opt {
    /// Command
    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Generate a default configuration file.
    GenerateConfig {
        /// Output path for default config file
        #[structopt(short, long, parse(from_os_str))]
        output: PathBuf,
    },
    /// List the vehicles on the account.
    Vehicles {
        /// Config file path
        #[structopt(short, long, parse(from_os_str))]
        config: PathBuf,
    },
    /// Wake a vehicle and wait for it to come online.
    Wake {
        #[structopt(flatten)]
        target: Target,
        /// Seconds to wait for the vehicle
        #[structopt(short, long, default_value = "60")]
        timeout: u64,
    },
    /// Print the full vehicle data.
    Data {
        #[structopt(flatten)]
        target: Target,
    },
    /// Honk the horn.
    Honk {
        #[structopt(flatten)]
        target: Target,
    },
    /// Flash the lights.
    Flash {
        #[structopt(flatten)]
        target: Target,
    },
}

#[derive(Debug, StructOpt)]
struct Target {
    /// Config file path
    #[structopt(short, long, parse(from_os_str))]
    config: PathBuf,
    /// Position of the vehicle in the account listing
    #[structopt(short, long, default_value = "0")]
    index: usize,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let opt = Opt::from_args();
    match opt.cmd {
        Command::GenerateConfig { output } => {
            let config_toml = toml::to_string_pretty(&Config::default())?;
            File::create(output)?.write_all(config_toml.as_bytes())?;
        }
        Command::Vehicles { config } => {
            let api = connect(config).await?;
            for vehicle in api.list_vehicles().await? {
                println!("{}", serde_json::to_string_pretty(&summary_json(&vehicle))?);
            }
        }
        Command::Wake { target, timeout } => {
            let api = connect(target.config.clone()).await?;
            let vehicle = select(&api, target.index).await?;
            tracing::info!(id = vehicle.id, "waking vehicle");
            let state = vehicle
                .wake_up_and_wait(Duration::from_secs(timeout))
                .await?;
            println!("{} is {}", vehicle.id, state.state);
        }
        Command::Data { target } => {
            let api = connect(target.config.clone()).await?;
            let vehicle = select(&api, target.index).await?;
            let data = vehicle.get_vehicle_data().await?;
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Command::Honk { target } => {
            let api = connect(target.config.clone()).await?;
            let vehicle = select(&api, target.index).await?;
            vehicle.honk_horn().await?.into_result("honk_horn")?;
        }
        Command::Flash { target } => {
            let api = connect(target.config.clone()).await?;
            let vehicle = select(&api, target.index).await?;
            vehicle.flash_lights().await?.into_result("flash_lights")?;
        }
    }

    Ok(())
}

async fn connect(config: PathBuf) -> Result<TeslaApi, Error> {
    let config: Config = {
        let mut buf = String::new();
        File::open(config)?.read_to_string(&mut buf)?;
        toml::from_str(&buf)?
    };
    let config = config.apply_env().validate()?;

    let mut api = config.client()?;
    api.initialize(config.tesla_credentials.access_token.as_deref())
        .await?;
    Ok(api)
}

async fn select(api: &TeslaApi, index: usize) -> Result<Vehicle<'_>, Error> {
    let mut vehicles = api.list_vehicles().await?;
    tracing::info!(count = vehicles.len(), "found vehicles");
    if index >= vehicles.len() {
        return Err(anyhow!(
            "vehicle index {} out of range, account has {} vehicles",
            index,
            vehicles.len()
        ));
    }
    Ok(vehicles.swap_remove(index))
}

fn summary_json(vehicle: &Vehicle<'_>) -> serde_json::Value {
    match vehicle.summary() {
        Some(summary) => serde_json::json!({
            "id": summary.id,
            "vin": summary.vin,
            "display_name": summary.display_name,
            "state": summary.state,
            "option_codes": summary.option_codes(),
        }),
        None => serde_json::json!({ "id": vehicle.id }),
    }
}
