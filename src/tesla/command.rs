use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::{Error, Result};

/// Reply to a command endpoint.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct CommandReply {
    pub result: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

impl CommandReply {
    /// Treat a refused command as an error.
    pub fn into_result(self, command: &str) -> Result<()> {
        if self.result {
            Ok(())
        } else {
            Err(Error::Rejected {
                command: command.to_string(),
                reason: self.reason.unwrap_or_default(),
            })
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TrunkPosition {
    Front,
    Rear,
}

impl TrunkPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrunkPosition::Front => "front",
            TrunkPosition::Rear => "rear",
        }
    }
}

impl FromStr for TrunkPosition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "front" => Ok(TrunkPosition::Front),
            "rear" => Ok(TrunkPosition::Rear),
            _ => Err(Error::validation(format!(
                "trunk position must be `front` or `rear`, got {:?}",
                s
            ))),
        }
    }
}

impl fmt::Display for TrunkPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SunRoofState {
    Vent,
    Close,
}

impl SunRoofState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SunRoofState::Vent => "vent",
            SunRoofState::Close => "close",
        }
    }
}

impl FromStr for SunRoofState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "vent" => Ok(SunRoofState::Vent),
            "close" => Ok(SunRoofState::Close),
            _ => Err(Error::validation(format!(
                "sun roof state must be `vent` or `close`, got {:?}",
                s
            ))),
        }
    }
}

impl fmt::Display for SunRoofState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const MAX_SEAT_HEATER: u8 = 4;
pub const MAX_SEAT_HEATER_LEVEL: u8 = 3;

/// The limit is exclusive on both ends.
pub(crate) fn check_charge_limit(percent: u32) -> Result<u32> {
    if percent > 10 && percent < 100 {
        Ok(percent)
    } else {
        Err(Error::validation(format!(
            "charge limit {} must be strictly between 10 and 100",
            percent
        )))
    }
}

pub(crate) fn check_seat_heater(heater: u8, level: u8) -> Result<()> {
    if heater > MAX_SEAT_HEATER {
        return Err(Error::validation(format!(
            "seat heater {} must be in range [0, {}]",
            heater, MAX_SEAT_HEATER
        )));
    }
    if level > MAX_SEAT_HEATER_LEVEL {
        return Err(Error::validation(format!(
            "seat heater level {} must be in range [0, {}]",
            level, MAX_SEAT_HEATER_LEVEL
        )));
    }
    Ok(())
}
