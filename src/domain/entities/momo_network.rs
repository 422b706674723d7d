use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Mobile-money networks the gateway can charge against.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, sqlx::Type,
)]
#[sqlx(type_name = "momo_network", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MomoNetwork {
    Mtn,
    Vodafone,
    AirtelTigo,
}

impl MomoNetwork {
    /// Provider code the gateway expects in the `mobile_money` charge block.
    pub fn gateway_code(&self) -> &'static str {
        match self {
            MomoNetwork::Mtn => "mtn",
            MomoNetwork::Vodafone => "vod",
            MomoNetwork::AirtelTigo => "atl",
        }
    }
}
