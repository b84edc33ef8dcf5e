use std::collections::HashMap;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the attach endpoint, the router and its peers,
/// link timing and logging.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub router: RouterSettings,
    pub link: LinkSettings,
    pub log: LogSettings,
}

/// Configuration settings for the server.
///
/// Defines where the attach endpoint listens and the path clients and peer
/// routers upgrade on.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub path: String,
}

/// Configuration settings for the router.
///
/// `routes` maps an inbound topic to the topics it is re-emitted under;
/// `peers` lists the addresses of peer routers to dial at startup.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RouterSettings {
    pub message_logs: bool,
    pub status_interval_secs: u64,
    pub peers: Vec<String>,
    pub routes: HashMap<String, Vec<String>>,
}

/// Link timing in whole seconds, as written in configuration.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LinkSettings {
    pub write_wait_secs: u64,
    pub pong_wait_secs: u64,
    pub ping_wait_secs: u64,
    pub retry_interval_secs: u64,
    pub handshake_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub router: Option<PartialRouterSettings>,
    pub link: Option<PartialLinkSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialRouterSettings {
    pub message_logs: Option<bool>,
    pub status_interval_secs: Option<u64>,
    pub peers: Option<Vec<String>>,
    pub routes: Option<HashMap<String, Vec<String>>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLinkSettings {
    pub write_wait_secs: Option<u64>,
    pub pong_wait_secs: Option<u64>,
    pub ping_wait_secs: Option<u64>,
    pub retry_interval_secs: Option<u64>,
    pub handshake_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl PartialSettings {
    /// Fill every missing value from `default`.
    pub fn merge(self, default: Settings) -> Settings {
        let server = self.server.unwrap_or_default();
        let router = self.router.unwrap_or_default();
        let link = self.link.unwrap_or_default();
        let log = self.log.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(default.server.host),
                port: server.port.unwrap_or(default.server.port),
                path: server.path.unwrap_or(default.server.path),
            },
            router: RouterSettings {
                message_logs: router.message_logs.unwrap_or(default.router.message_logs),
                status_interval_secs: router
                    .status_interval_secs
                    .unwrap_or(default.router.status_interval_secs),
                peers: router.peers.unwrap_or(default.router.peers),
                routes: router.routes.unwrap_or(default.router.routes),
            },
            link: LinkSettings {
                write_wait_secs: link.write_wait_secs.unwrap_or(default.link.write_wait_secs),
                pong_wait_secs: link.pong_wait_secs.unwrap_or(default.link.pong_wait_secs),
                ping_wait_secs: link.ping_wait_secs.unwrap_or(default.link.ping_wait_secs),
                retry_interval_secs: link
                    .retry_interval_secs
                    .unwrap_or(default.link.retry_interval_secs),
                handshake_timeout_secs: link
                    .handshake_timeout_secs
                    .unwrap_or(default.link.handshake_timeout_secs),
            },
            log: LogSettings {
                level: log.level.unwrap_or(default.log.level),
            },
        }
    }
}

impl Settings {
    /// Reject settings the links cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.link.validate()
    }
}

impl LinkSettings {
    /// Every wait must be non-zero. A peer's `ping_wait` must outlast the
    /// remote's ping period (half its `pong_wait`, assumed configured alike).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("link.write_wait_secs", self.write_wait_secs),
            ("link.pong_wait_secs", self.pong_wait_secs),
            ("link.ping_wait_secs", self.ping_wait_secs),
            ("link.retry_interval_secs", self.retry_interval_secs),
            ("link.handshake_timeout_secs", self.handshake_timeout_secs),
        ];
        if let Some((key, _)) = non_zero.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigError::Message(format!("{key} must be greater than zero")));
        }

        if self.ping_wait_secs * 2 <= self.pong_wait_secs {
            return Err(ConfigError::Message(format!(
                "link.ping_wait_secs ({}) must exceed the ping period, half of link.pong_wait_secs ({})",
                self.ping_wait_secs, self.pong_wait_secs
            )));
        }
        Ok(())
    }
}

/// Provides default values for `Settings`.
///
/// Ensures the application has sensible defaults if no configuration is provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
                path: "/subscribe".to_string(),
            },
            router: RouterSettings {
                message_logs: false,
                status_interval_secs: 0,
                peers: Vec::new(),
                routes: HashMap::new(),
            },
            link: LinkSettings {
                write_wait_secs: 10,
                pong_wait_secs: 60,
                ping_wait_secs: 90,
                retry_interval_secs: 3,
                handshake_timeout_secs: 10,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

/// Link timing handed to every client and peer link.
///
/// `ping_period` is derived from `pong_wait` and must stay below it so a
/// probe can be answered before the subscriber's read deadline expires.
/// `ping_wait` must exceed the remote's ping period so a peer link survives
/// one lost probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTiming {
    pub write_wait: Duration,
    pub pong_wait: Duration,
    pub ping_period: Duration,
    pub ping_wait: Duration,
    pub retry_interval: Duration,
    pub handshake_timeout: Duration,
}

impl LinkTiming {
    pub fn new(
        write_wait: Duration,
        pong_wait: Duration,
        ping_wait: Duration,
        retry_interval: Duration,
        handshake_timeout: Duration,
    ) -> Self {
        Self {
            write_wait,
            pong_wait,
            ping_period: pong_wait / 2,
            ping_wait,
            retry_interval,
            handshake_timeout,
        }
    }
}

impl From<&LinkSettings> for LinkTiming {
    fn from(link: &LinkSettings) -> Self {
        Self::new(
            Duration::from_secs(link.write_wait_secs),
            Duration::from_secs(link.pong_wait_secs),
            Duration::from_secs(link.ping_wait_secs),
            Duration::from_secs(link.retry_interval_secs),
            Duration::from_secs(link.handshake_timeout_secs),
        )
    }
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self::from(&Settings::default().link)
    }
}
