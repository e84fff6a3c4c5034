use std::net::SocketAddr;
use std::time::Duration;

use super::reader::Validatable;

fn default_amqp_url() -> String {
    "amqp://localhost:5672".to_string()
}

fn default_listen_address() -> String {
    "127.0.0.1:55550".to_string()
}

fn default_exchange() -> String {
    "naemon".to_string()
}

fn default_idle_timeout_sec() -> u64 {
    360
}

fn default_spawn_wait_ms() -> u64 {
    500
}

/// Agent configuration, loadable from YAML. Every field has a default,
/// so an empty file (or no file at all) is a valid configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Agent {
    #[serde(default = "default_amqp_url")]
    amqp_url: String,
    #[serde(default = "default_listen_address")]
    listen_address: String,
    #[serde(default = "default_exchange")]
    exchange: String,
    #[serde(default = "default_idle_timeout_sec")]
    idle_timeout_sec: u64,
    #[serde(default = "default_spawn_wait_ms")]
    spawn_wait_ms: u64,
}

impl Default for Agent {
    fn default() -> Self {
        Self {
            amqp_url: default_amqp_url(),
            listen_address: default_listen_address(),
            exchange: default_exchange(),
            idle_timeout_sec: default_idle_timeout_sec(),
            spawn_wait_ms: default_spawn_wait_ms(),
        }
    }
}

impl Agent {
    pub fn amqp_url(&self) -> &str {
        &self.amqp_url
    }

    pub fn listen_address(&self) -> &str {
        &self.listen_address
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_sec)
    }

    pub fn spawn_wait(&self) -> Duration {
        Duration::from_millis(self.spawn_wait_ms)
    }

    pub fn set_amqp_url(&mut self, amqp_url: String) {
        self.amqp_url = amqp_url;
    }

    pub fn set_listen_address(&mut self, listen_address: String) {
        self.listen_address = listen_address;
    }
}

impl Validatable for Agent {
    fn validate(&self) -> Result<(), String> {
        if self.amqp_url.is_empty() {
            return Err("amqp_url is empty".to_string());
        }
        if self.exchange.is_empty() {
            return Err("exchange is empty".to_string());
        }
        if self.listen_address.parse::<SocketAddr>().is_err() {
            return Err(format!(
                "listen_address '{}' is not a socket address",
                self.listen_address
            ));
        }
        if self.idle_timeout_sec == 0 {
            return Err("idle_timeout_sec must be positive".to_string());
        }
        Ok(())
    }
}
