use std::time::Duration;

use reqwest::Method;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use super::{
    command::{check_charge_limit, check_seat_heater},
    ChargeState, CommandReply, Error, Result, SunRoofState, TeslaApi, TrunkPosition,
};

/// One element of the vehicle listing.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct VehicleSummary {
    pub id: u64,
    #[serde(default)]
    pub vehicle_id: u64,
    #[serde(default)]
    pub vin: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub option_codes: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub in_service: bool,
    #[serde(default)]
    pub calendar_enabled: bool,
    #[serde(default)]
    pub api_version: u64,
    #[serde(default)]
    pub id_s: Option<String>,
    #[serde(default)]
    pub access_type: Option<String>,
    #[serde(default)]
    pub tokens: Vec<String>,
}

impl VehicleSummary {
    pub fn is_online(&self) -> bool {
        self.state == "online"
    }

    pub fn option_codes(&self) -> Vec<&str> {
        self.option_codes
            .as_deref()
            .map(|codes| {
                codes
                    .split(',')
                    .map(str::trim)
                    .filter(|code| !code.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Commands and queries scoped to one vehicle.
///
/// The handle computes its own request prefix when it is created and never
/// writes it back into the session it borrows.
#[derive(Debug, Clone)]
pub struct Vehicle<'a> {
    pub id: u64,
    summary: Option<VehicleSummary>,
    // `/api/1/vehicles/<id>`, relative to the API host
    scope: String,
    prefix: String,
    api: &'a TeslaApi,
}

impl<'a> Vehicle<'a> {
    pub fn new(id: u64, api: &'a TeslaApi) -> Self {
        let scope = format!("/api/1/vehicles/{}", id);
        Self {
            id,
            summary: None,
            prefix: api.url(&scope),
            scope,
            api,
        }
    }

    pub(crate) fn with_summary(summary: VehicleSummary, api: &'a TeslaApi) -> Self {
        let mut vehicle = Self::new(summary.id, api);
        vehicle.summary = Some(summary);
        vehicle
    }

    /// The listing entry this handle was created from, if any.
    pub fn summary(&self) -> Option<&VehicleSummary> {
        self.summary.as_ref()
    }

    /// Absolute URL prefix for every request made through this handle.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Perform one request against this vehicle and unwrap the `response` field.
    async fn dispatch<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: Option<Value>,
    ) -> Result<T> {
        #[derive(Deserialize)]
        struct Envelope<T> {
            response: T,
        }

        let full_path = format!("{}{}", self.scope, path);
        let command_error = |source| Error::Command {
            path: full_path.clone(),
            source,
        };

        let body = self
            .api
            .request(method, format!("{}{}", self.prefix, path), payload.as_ref())
            .await
            .and_then(|rsp| rsp.error_for_status())
            .map_err(command_error)?
            .bytes()
            .await
            .map_err(command_error)?;

        let envelope =
            serde_json::from_slice::<Envelope<T>>(&body).map_err(|source| Error::Protocol {
                path: full_path.clone(),
                source,
            })?;
        Ok(envelope.response)
    }

    async fn command(&self, name: &str, payload: Option<Value>) -> Result<CommandReply> {
        let reply: CommandReply = self
            .dispatch(Method::POST, &format!("/command/{}", name), payload)
            .await?;
        tracing::debug!(command = name, ?reply);
        Ok(reply)
    }

    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn get_vehicle_data(&self) -> Result<Value> {
        self.dispatch(Method::GET, "/vehicle_data", None).await
    }

    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn charge_state(&self) -> Result<ChargeState> {
        let state: Option<ChargeState> = self
            .dispatch(Method::GET, "/data_request/charge_state", None)
            .await?;
        state.ok_or_else(|| Error::Protocol {
            path: format!("{}/data_request/charge_state", self.scope),
            source: serde::de::Error::custom("null charge_state response"),
        })
    }

    /// Ask the vehicle to wake, returning its state as reported at that moment.
    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn wake_up(&self) -> Result<VehicleSummary> {
        self.dispatch(Method::POST, "/wake_up", None).await
    }

    /// Wake the vehicle from sleep, returning only when the vehicle reports that it is online.
    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn wake_up_and_wait(&self, timeout: Duration) -> Result<VehicleSummary> {
        let waker = async {
            let mut wait = Duration::from_secs(1);
            loop {
                let state = self.wake_up().await?;
                if state.is_online() {
                    tracing::debug!("vehicle is awake");
                    return Ok::<_, Error>(state);
                }
                tracing::debug!(?wait, "vehicle is asleep, waiting");
                tokio::time::sleep(wait).await;
                // exponential backoff
                wait += wait;
            }
        };

        tokio::time::timeout(timeout, waker).await?
    }

    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn honk_horn(&self) -> Result<CommandReply> {
        self.command("honk_horn", None).await
    }

    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn flash_lights(&self) -> Result<CommandReply> {
        self.command("flash_lights", None).await
    }

    /// Enable keyless driving for two minutes, authorised by the account password.
    #[tracing::instrument(skip(self, password), fields(id = self.id))]
    pub async fn remote_start_drive(&self, password: &str) -> Result<CommandReply> {
        self.command("remote_start_drive", Some(json!({ "password": password })))
            .await
    }

    /// Set the speed limit in mph. The vehicle expects 50 to 90.
    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn speed_limit_set_limit(&self, limit_mph: u32) -> Result<CommandReply> {
        if !(50..=90).contains(&limit_mph) {
            tracing::warn!(limit_mph, "speed limit outside the 50-90 mph the vehicle accepts");
        }
        self.command("speed_limit_set_limit", Some(json!({ "limit_mph": limit_mph })))
            .await
    }

    #[tracing::instrument(skip(self, pin), fields(id = self.id))]
    pub async fn speed_limit_activate(&self, pin: &str) -> Result<CommandReply> {
        self.command("speed_limit_activate", Some(json!({ "pin": pin })))
            .await
    }

    #[tracing::instrument(skip(self, pin), fields(id = self.id))]
    pub async fn speed_limit_deactivate(&self, pin: &str) -> Result<CommandReply> {
        self.command("speed_limit_deactivate", Some(json!({ "pin": pin })))
            .await
    }

    #[tracing::instrument(skip(self, pin), fields(id = self.id))]
    pub async fn speed_limit_clear_pin(&self, pin: &str) -> Result<CommandReply> {
        self.command("speed_limit_clear_pin", Some(json!({ "pin": pin })))
            .await
    }

    #[tracing::instrument(skip(self, pin), fields(id = self.id))]
    pub async fn set_valet_mode(&self, on: bool, pin: &str) -> Result<CommandReply> {
        self.command(
            "set_valet_mode",
            Some(json!({ "on": on, "password": pin })),
        )
        .await
    }

    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn reset_valet_pin(&self) -> Result<CommandReply> {
        self.command("reset_valet_pin", None).await
    }

    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn door_unlock(&self) -> Result<CommandReply> {
        self.command("door_unlock", None).await
    }

    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn door_lock(&self) -> Result<CommandReply> {
        self.command("door_lock", None).await
    }

    /// Open or close a trunk; `position` is `"front"` or `"rear"`.
    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn actuate_trunk(&self, position: &str) -> Result<CommandReply> {
        let position: TrunkPosition = position.parse()?;
        self.command(
            "actuate_trunk",
            Some(json!({ "which_trunk": position.as_str() })),
        )
        .await
    }

    /// `state` is `"vent"` or `"close"`.
    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn sun_roof_control(&self, state: &str) -> Result<CommandReply> {
        let state: SunRoofState = state.parse()?;
        self.command("sun_roof_control", Some(json!({ "state": state.as_str() })))
            .await
    }

    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn charge_port_door_open(&self) -> Result<CommandReply> {
        self.command("charge_port_door_open", None).await
    }

    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn charge_port_door_close(&self) -> Result<CommandReply> {
        self.command("charge_port_door_close", None).await
    }

    /// The API does not guarantee this is idempotent.
    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn charge_start(&self) -> Result<CommandReply> {
        self.command("charge_start", None).await
    }

    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn charge_stop(&self) -> Result<CommandReply> {
        self.command("charge_stop", None).await
    }

    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn charge_standard(&self) -> Result<CommandReply> {
        self.command("charge_standard", None).await
    }

    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn charge_max_range(&self) -> Result<CommandReply> {
        self.command("charge_max_range", None).await
    }

    /// Set the charge limit, which must lie strictly between 10 and 100 percent.
    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn set_charge_limit(&self, percent: u32) -> Result<CommandReply> {
        let percent = check_charge_limit(percent)?;
        self.command("set_charge_limit", Some(json!({ "percent": percent })))
            .await
    }

    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn auto_conditioning_start(&self) -> Result<CommandReply> {
        self.command("auto_conditioning_start", None).await
    }

    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn auto_conditioning_stop(&self) -> Result<CommandReply> {
        self.command("auto_conditioning_stop", None).await
    }

    /// Temperatures are in degrees Celsius.
    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn set_temps(&self, driver_temp: f64, passenger_temp: f64) -> Result<CommandReply> {
        self.command(
            "set_temps",
            Some(json!({
                "driver_temp": driver_temp,
                "passenger_temp": passenger_temp,
            })),
        )
        .await
    }

    /// `heater` selects the seat (0 to 4) and `level` the intensity (0 to 3).
    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn remote_seat_heater_request(&self, heater: u8, level: u8) -> Result<CommandReply> {
        check_seat_heater(heater, level)?;
        self.command(
            "remote_seat_heater_request",
            Some(json!({ "heater": heater, "level": level })),
        )
        .await
    }

    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn media_toggle_playback(&self) -> Result<CommandReply> {
        self.command("media_toggle_playback", None).await
    }

    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn media_next_track(&self) -> Result<CommandReply> {
        self.command("media_next_track", None).await
    }

    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn media_prev_track(&self) -> Result<CommandReply> {
        self.command("media_prev_track", None).await
    }

    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn media_next_fav(&self) -> Result<CommandReply> {
        self.command("media_next_fav", None).await
    }

    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn media_prev_fav(&self) -> Result<CommandReply> {
        self.command("media_prev_fav", None).await
    }

    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn media_volume_up(&self) -> Result<CommandReply> {
        self.command("media_volume_up", None).await
    }

    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn media_volume_down(&self) -> Result<CommandReply> {
        self.command("media_volume_down", None).await
    }

    /// Send a destination to the vehicle's navigation, stamped with the current time.
    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn navigation_request(&self, locale: &str, value: &str) -> Result<CommandReply> {
        let timestamp_ms = chrono::Utc::now().timestamp_millis();
        self.command(
            "navigation_request",
            Some(json!({
                "type": "share_ext_content_raw",
                "value": { "android.intent.extra.TEXT": value },
                "locale": locale,
                "timestamp_ms": timestamp_ms.to_string(),
            })),
        )
        .await
    }

    /// Schedule a pending software update `offset_sec` seconds from now.
    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn schedule_software_update(&self, offset_sec: u64) -> Result<CommandReply> {
        self.command(
            "schedule_software_update",
            Some(json!({ "offset_sec": offset_sec })),
        )
        .await
    }

    #[tracing::instrument(skip(self), fields(id = self.id))]
    pub async fn cancel_software_update(&self) -> Result<CommandReply> {
        self.command("cancel_software_update", None).await
    }
}
