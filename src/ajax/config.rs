use std::time::Duration;

/// Configuration for ajax clients
#[derive(Debug, Clone)]
pub struct AjaxConfig {
    /// Prefix for relative request URLs, e.g. `http://127.0.0.1:8080`
    pub base_url: Option<String>,
    /// Timeout for establishing the connection
    pub connect_timeout: Duration,
    /// Timeout for the whole request, unless the request overrides it
    pub request_timeout: Duration,
    /// Initial read buffer capacity
    pub buffer_size: usize,
    /// Maximum response size to prevent memory exhaustion
    pub max_response_size: usize,
}

impl Default for AjaxConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            buffer_size: 8192,
            max_response_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Builder for ajax client configuration
pub struct AjaxConfigBuilder {
    config: AjaxConfig,
}

impl AjaxConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AjaxConfig::default(),
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = Some(base_url.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    pub fn max_response_size(mut self, size: usize) -> Self {
        self.config.max_response_size = size;
        self
    }

    pub fn build(self) -> AjaxConfig {
        self.config
    }
}

impl Default for AjaxConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
