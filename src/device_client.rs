use crate::{
    config::{AppConfig, TimeEndpoint},
    http_client::{device_http_client, handle_http_response},
    types::{ClockState, DeviceSettings, Effect, IgnoreSunToggle, Region, Rgb, SunTimes},
};
use anyhow::{Context, Result};
use log::debug;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use reqwest::Client;
use serde::de::DeserializeOwned;
use trait_variant::make;

#[make(Send)]
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait DeviceClient {
    async fn set_brightness(&self, value: u16) -> Result<String>;
    async fn set_stairs_speed(&self, value: u16) -> Result<String>;
    async fn set_led_count(&self, value: u16) -> Result<String>;
    async fn set_color(&self, color: Rgb) -> Result<String>;
    async fn set_stairs_group_size(&self, value: u16) -> Result<String>;
    async fn save_parameters(&self) -> Result<String>;
    async fn erase_network_data(&self) -> Result<String>;
    async fn restart(&self) -> Result<()>;
    async fn toggle_ignore_sun(&self) -> Result<IgnoreSunToggle>;
    async fn settings(&self) -> Result<DeviceSettings>;
    async fn current_time(&self) -> Result<ClockState>;
    async fn sun_times(&self) -> Result<SunTimes>;
    async fn regions(&self) -> Result<Vec<Region>>;
    async fn set_region(&self, region: Region) -> Result<String>;
    async fn trigger_effect(&self, effect: Effect) -> Result<String>;
}

/// HTTP client for the staircase controller firmware
#[derive(Clone)]
pub struct StairsDeviceClient {
    client: Client,
    base_url: String,
    time_endpoint: TimeEndpoint,
}

impl StairsDeviceClient {
    // API endpoint constants
    const SET_BRIGHTNESS_ENDPOINT: &str = "/set-brightness";
    const SET_STAIRS_SPEED_ENDPOINT: &str = "/set-stairs-speed";
    const SET_LED_COUNT_ENDPOINT: &str = "/set-led-count";
    const SET_COLOR_ENDPOINT: &str = "/set-color";
    const SET_STAIRS_GROUP_SIZE_ENDPOINT: &str = "/set-stairs-group-size";
    const SAVE_PARAMETERS_ENDPOINT: &str = "/save-parameters";
    const ERASE_NETWORK_DATA_ENDPOINT: &str = "/erase-network-data";
    const RESTART_ENDPOINT: &str = "/restart";
    const TOGGLE_IGNORE_SUN_ENDPOINT: &str = "/toggle-ignore-sun";
    const GET_SETTINGS_ENDPOINT: &str = "/get-settings";
    const GET_SUN_TIMES_ENDPOINT: &str = "/get-sun-times";
    const GET_REGIONS_ENDPOINT: &str = "/get-regions";
    const SET_REGIONS_ENDPOINT: &str = "/set-regions";

    /// Create a client from the application configuration
    pub fn new() -> Result<Self> {
        let config = AppConfig::get();
        let client = device_http_client(config.device.credentials.as_ref())?;

        Ok(Self::with_client(
            client,
            &config.device.base_url,
            config.variant.time_endpoint,
        ))
    }

    pub fn with_client(client: Client, base_url: &str, time_endpoint: TimeEndpoint) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            time_endpoint,
        }
    }

    fn build_url(&self, path: &str) -> String {
        // Normalize path to always start with a single "/"
        let normalized_path = path.trim_start_matches('/');
        format!("{}/{normalized_path}", self.base_url)
    }

    /// GET request returning the plain text acknowledgement
    async fn get<Q>(&self, path: &str, query: &Q) -> Result<String>
    where
        Q: serde::Serialize + ?Sized,
    {
        let url = self.build_url(path);
        debug!("GET {url}");

        let res = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .context(format!("failed to send GET request to {url}"))?;

        handle_http_response(res, &format!("GET {url}")).await
    }

    /// GET request without parameters, parsing the body as JSON
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.get(path, NO_QUERY).await?;
        serde_json::from_str(&body).with_context(|| format!("failed to parse response of {path}"))
    }

    async fn set_value(&self, path: &str, value: u16) -> Result<String> {
        self.get(path, &[("value", value)]).await
    }
}

const NO_QUERY: &[(&str, &str)] = &[];

impl DeviceClient for StairsDeviceClient {
    async fn set_brightness(&self, value: u16) -> Result<String> {
        self.set_value(Self::SET_BRIGHTNESS_ENDPOINT, value).await
    }

    async fn set_stairs_speed(&self, value: u16) -> Result<String> {
        self.set_value(Self::SET_STAIRS_SPEED_ENDPOINT, value).await
    }

    async fn set_led_count(&self, value: u16) -> Result<String> {
        self.set_value(Self::SET_LED_COUNT_ENDPOINT, value).await
    }

    async fn set_color(&self, color: Rgb) -> Result<String> {
        self.get(
            Self::SET_COLOR_ENDPOINT,
            &[("r", color.r), ("g", color.g), ("b", color.b)],
        )
        .await
    }

    async fn set_stairs_group_size(&self, value: u16) -> Result<String> {
        self.set_value(Self::SET_STAIRS_GROUP_SIZE_ENDPOINT, value)
            .await
    }

    async fn save_parameters(&self) -> Result<String> {
        self.get(Self::SAVE_PARAMETERS_ENDPOINT, NO_QUERY).await
    }

    async fn erase_network_data(&self) -> Result<String> {
        self.get(Self::ERASE_NETWORK_DATA_ENDPOINT, NO_QUERY).await
    }

    async fn restart(&self) -> Result<()> {
        self.get(Self::RESTART_ENDPOINT, NO_QUERY).await?;
        Ok(())
    }

    async fn toggle_ignore_sun(&self) -> Result<IgnoreSunToggle> {
        self.get_json(Self::TOGGLE_IGNORE_SUN_ENDPOINT).await
    }

    async fn settings(&self) -> Result<DeviceSettings> {
        self.get_json(Self::GET_SETTINGS_ENDPOINT).await
    }

    async fn current_time(&self) -> Result<ClockState> {
        self.get_json(self.time_endpoint.path()).await
    }

    async fn sun_times(&self) -> Result<SunTimes> {
        self.get_json(Self::GET_SUN_TIMES_ENDPOINT).await
    }

    async fn regions(&self) -> Result<Vec<Region>> {
        self.get_json(Self::GET_REGIONS_ENDPOINT).await
    }

    async fn set_region(&self, region: Region) -> Result<String> {
        self.get(
            Self::SET_REGIONS_ENDPOINT,
            &[
                ("regions", region.name.as_str()),
                ("timezone", region.timezone.as_str()),
            ],
        )
        .await
    }

    async fn trigger_effect(&self, effect: Effect) -> Result<String> {
        self.get(effect.endpoint(), NO_QUERY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_client(base_url: &str) -> StairsDeviceClient {
        StairsDeviceClient::with_client(
            reqwest::Client::new(),
            base_url,
            TimeEndpoint::CurrentTime,
        )
    }

    mod build_url {
        use super::*;

        #[test]
        fn normalizes_path_with_leading_slash() {
            let client = create_test_client("http://192.168.4.1");
            assert_eq!(
                client.build_url("/get-settings"),
                "http://192.168.4.1/get-settings"
            );
        }

        #[test]
        fn normalizes_path_without_leading_slash() {
            let client = create_test_client("http://192.168.4.1");
            assert_eq!(
                client.build_url("get-settings"),
                "http://192.168.4.1/get-settings"
            );
        }

        #[test]
        fn normalizes_base_url_with_trailing_slash() {
            let client = create_test_client("http://stairs.local/");
            assert_eq!(
                client.build_url("//restart"),
                "http://stairs.local/restart"
            );
        }

        #[test]
        fn handles_root_path() {
            let client = create_test_client("http://stairs.local");
            assert_eq!(client.build_url("/"), "http://stairs.local/");
        }
    }

    mod constants {
        use super::*;

        #[test]
        fn api_endpoints_are_correctly_defined() {
            assert_eq!(
                StairsDeviceClient::SET_BRIGHTNESS_ENDPOINT,
                "/set-brightness"
            );
            assert_eq!(
                StairsDeviceClient::SET_STAIRS_SPEED_ENDPOINT,
                "/set-stairs-speed"
            );
            assert_eq!(StairsDeviceClient::SET_LED_COUNT_ENDPOINT, "/set-led-count");
            assert_eq!(StairsDeviceClient::SET_COLOR_ENDPOINT, "/set-color");
            assert_eq!(
                StairsDeviceClient::SET_STAIRS_GROUP_SIZE_ENDPOINT,
                "/set-stairs-group-size"
            );
            assert_eq!(
                StairsDeviceClient::SAVE_PARAMETERS_ENDPOINT,
                "/save-parameters"
            );
            assert_eq!(
                StairsDeviceClient::ERASE_NETWORK_DATA_ENDPOINT,
                "/erase-network-data"
            );
            assert_eq!(StairsDeviceClient::RESTART_ENDPOINT, "/restart");
            assert_eq!(
                StairsDeviceClient::TOGGLE_IGNORE_SUN_ENDPOINT,
                "/toggle-ignore-sun"
            );
            assert_eq!(StairsDeviceClient::GET_SETTINGS_ENDPOINT, "/get-settings");
            assert_eq!(StairsDeviceClient::GET_SUN_TIMES_ENDPOINT, "/get-sun-times");
            assert_eq!(StairsDeviceClient::GET_REGIONS_ENDPOINT, "/get-regions");
            assert_eq!(StairsDeviceClient::SET_REGIONS_ENDPOINT, "/set-regions");
        }
    }
}
