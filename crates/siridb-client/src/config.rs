//! Connection configuration.

use std::fmt;
use std::time::Duration;

use siridb_codec::DEFAULT_READ_SIZE;
use siridb_protocol::DEFAULT_MAX_PACKAGE_SIZE;

use crate::error::{Error, Result};

/// Default SiriDB client port.
pub const DEFAULT_PORT: u16 = 9000;

/// Credentials sent in the authentication handshake.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Database user.
    pub username: String,
    /// User password.
    pub password: String,
    /// Database to authenticate against.
    pub database: String,
}

impl Credentials {
    /// Create credentials for a user and database.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            database: database.into(),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("iris", "siri", "")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("database", &self.database)
            .finish()
    }
}

/// Configuration for a SiriDB connection.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname or IP address.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Handshake credentials.
    pub credentials: Credentials,

    /// Largest payload accepted from or sent to the server.
    pub max_package_size: usize,

    /// Suggested allocation size for each read.
    pub read_buffer_size: usize,

    /// Timeout for establishing the TCP connection.
    pub connect_timeout: Duration,

    /// Disable Nagle's algorithm on the socket.
    pub tcp_nodelay: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            credentials: Credentials::default(),
            max_package_size: DEFAULT_MAX_PACKAGE_SIZE,
            read_buffer_size: DEFAULT_READ_SIZE,
            connect_timeout: Duration::from_secs(15),
            tcp_nodelay: true,
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a connection string into configuration.
    ///
    /// The format is `key=value` pairs separated by `;`:
    ///
    /// ```text
    /// host=localhost;port=9000;user=iris;password=siri;database=dbtest
    /// ```
    ///
    /// Keys are case-insensitive. Unknown keys are rejected.
    pub fn from_connection_string(conn_str: &str) -> Result<Self> {
        let mut config = Self::default();

        for part in conn_str.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("invalid key-value: {part}")))?;

            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "host" | "server" => {
                    // host:port shorthand
                    if let Some((host, port)) = value.rsplit_once(':') {
                        config.host = host.to_string();
                        config.port = parse_port(port)?;
                    } else {
                        config.host = value.to_string();
                    }
                }
                "port" => config.port = parse_port(value)?,
                "user" | "username" => config.credentials.username = value.to_string(),
                "password" | "pwd" => config.credentials.password = value.to_string(),
                "database" | "db" | "dbname" => config.credentials.database = value.to_string(),
                "max package size" | "max_package_size" => {
                    config.max_package_size = value
                        .parse()
                        .map_err(|_| Error::Config(format!("invalid max package size: {value}")))?;
                }
                "read buffer size" | "read_buffer_size" => {
                    config.read_buffer_size = value
                        .parse()
                        .map_err(|_| Error::Config(format!("invalid read buffer size: {value}")))?;
                }
                "connect timeout" | "connect_timeout" => {
                    let secs: u64 = value
                        .parse()
                        .map_err(|_| Error::Config(format!("invalid timeout: {value}")))?;
                    config.connect_timeout = Duration::from_secs(secs);
                }
                "tcp nodelay" | "tcp_nodelay" => {
                    config.tcp_nodelay = value.eq_ignore_ascii_case("true")
                        || value.eq_ignore_ascii_case("yes")
                        || value == "1";
                }
                _ => return Err(Error::Config(format!("unknown key: {key}"))),
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::Config("host must not be empty".into()));
        }
        if self.read_buffer_size == 0 {
            return Err(Error::Config("read buffer size must be positive".into()));
        }
        if self.max_package_size == 0 || u32::try_from(self.max_package_size).is_err() {
            return Err(Error::Config(format!(
                "max package size must be between 1 and {}",
                u32::MAX
            )));
        }
        Ok(())
    }

    /// Socket address as `host:port`.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Set the host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set all credentials at once.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the user name.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.credentials.username = username.into();
        self
    }

    /// Set the password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.credentials.password = password.into();
        self
    }

    /// Set the database.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.credentials.database = database.into();
        self
    }

    /// Set the maximum package payload size.
    #[must_use]
    pub fn max_package_size(mut self, size: usize) -> Self {
        self.max_package_size = size;
        self
    }

    /// Set the suggested read size.
    #[must_use]
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable or disable `TCP_NODELAY`.
    #[must_use]
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }
}

fn parse_port(value: &str) -> Result<u16> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("invalid port: {value}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert_eq!(config.port, 9000);
        assert_eq!(config.max_package_size, 209_715_200);
        assert_eq!(config.read_buffer_size, 64 * 1024);
        assert_eq!(config.connect_timeout, Duration::from_secs(15));
        assert!(config.tcp_nodelay);
        assert_eq!(config.addr(), "localhost:9000");
    }

    #[test]
    fn test_connection_string_parsing() {
        let config = Config::from_connection_string(
            "Host=siri.local;Port=9010;User=iris;Password=siri;Database=dbtest;",
        )
        .unwrap();

        assert_eq!(config.host, "siri.local");
        assert_eq!(config.port, 9010);
        assert_eq!(config.credentials.username, "iris");
        assert_eq!(config.credentials.password, "siri");
        assert_eq!(config.credentials.database, "dbtest");
    }

    #[test]
    fn test_connection_string_host_port_shorthand() {
        let config = Config::from_connection_string("host=10.0.0.1:9001;db=x").unwrap();
        assert_eq!(config.host, "10.0.0.1");
        assert_eq!(config.port, 9001);
    }

    #[test]
    fn test_connection_string_limits() {
        let config = Config::from_connection_string(
            "max_package_size=1024;read_buffer_size=16;connect_timeout=3;tcp_nodelay=no",
        )
        .unwrap();
        assert_eq!(config.max_package_size, 1024);
        assert_eq!(config.read_buffer_size, 16);
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert!(!config.tcp_nodelay);
    }

    #[test]
    fn test_connection_string_errors() {
        assert!(Config::from_connection_string("port=notanumber").is_err());
        assert!(Config::from_connection_string("novalue").is_err());
        assert!(matches!(
            Config::from_connection_string("colour=blue"),
            Err(Error::Config(_))
        ));
        assert!(Config::from_connection_string("read_buffer_size=0").is_err());
    }

    #[test]
    fn test_builder() {
        let config = Config::new()
            .host("db")
            .port(9100)
            .username("u")
            .password("p")
            .database("d")
            .read_buffer_size(128);
        assert_eq!(config.addr(), "db:9100");
        assert_eq!(config.credentials, Credentials::new("u", "p", "d"));
        assert_eq!(config.read_buffer_size, 128);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let debug = format!("{:?}", Credentials::new("iris", "secret", "db"));
        assert!(!debug.contains("secret"));
        assert!(debug.contains("REDACTED"));
    }
}
