mod auth;
mod charge;
mod client;
mod command;
mod error;
mod retry;
mod vehicle;

static BASE_URL: &str = "https://owner-api.teslamotors.com";

pub use auth::{AccessToken, Credentials};
pub use charge::ChargeState;
pub use client::{TeslaApi, TeslaApiBuilder};
pub use command::{
    CommandReply, SunRoofState, TrunkPosition, MAX_SEAT_HEATER, MAX_SEAT_HEATER_LEVEL,
};
pub use error::{Error, Result};
pub use retry::{RetryPolicy, DEFAULT_STATUS_FORCELIST};
pub use vehicle::{Vehicle, VehicleSummary};

/// The production API host.
pub fn default_base_url() -> &'static str {
    BASE_URL
}
