//! Construction options and lazy client setup.
//!
//! # Design
//! A builder starts from `TransportConfig::default()`, an explicit value
//! rather than a process-wide client. Options override pieces of it. The
//! `ureq::Agent` itself is only built at dispatch time, unless the caller
//! supplied one with `ClientOption::Client`, in which case the transport,
//! cookie store and timeout options are ignored.
//!
//! `TransportConfig` derives `Deserialize` so it can sit inside an
//! application's own config file.

use std::time::Duration;

use serde::Deserialize;

/// Connection-level settings used when the builder constructs its own agent.
///
/// Durations are in milliseconds; `None` leaves the `ureq` default in place.
/// `cancellable_timeout_ms` caps any exchange whose context carries a cancel
/// token, so a cancelled exchange still ends and closes its connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub connect_timeout_ms: Option<u64>,
    pub read_timeout_ms: Option<u64>,
    pub write_timeout_ms: Option<u64>,
    pub max_idle_connections: usize,
    pub max_idle_connections_per_host: usize,
    pub redirects: u32,
    pub user_agent: Option<String>,
    pub no_delay: bool,
    pub cancellable_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: Some(30_000),
            read_timeout_ms: None,
            write_timeout_ms: None,
            max_idle_connections: 100,
            max_idle_connections_per_host: 2,
            redirects: 10,
            user_agent: None,
            no_delay: true,
            cancellable_timeout_ms: 30_000,
        }
    }
}

/// An option applied when a `RequestBuilder` is constructed.
pub enum ClientOption {
    /// Connection settings for the lazily built agent.
    Transport(TransportConfig),
    /// Use this agent as-is. Clones of one agent share a pool and cookies.
    Client(ureq::Agent),
    /// Seed the lazily built agent's cookie jar.
    CookieStore(cookie_store::CookieStore),
    /// Overall timeout for each exchange. Zero means unbounded.
    Timeout(Duration),
}

/// Everything needed to build an agent, gathered from the options.
#[derive(Default)]
pub(crate) struct ClientSettings {
    pub(crate) transport: TransportConfig,
    pub(crate) client: Option<ureq::Agent>,
    pub(crate) cookies: Option<cookie_store::CookieStore>,
    pub(crate) timeout: Duration,
}

impl ClientSettings {
    pub(crate) fn apply(&mut self, option: ClientOption) {
        match option {
            ClientOption::Transport(transport) => self.transport = transport,
            ClientOption::Client(agent) => self.client = Some(agent),
            ClientOption::CookieStore(store) => self.cookies = Some(store),
            ClientOption::Timeout(timeout) => self.timeout = timeout,
        }
    }

    pub(crate) fn cancellable_timeout(&self) -> Duration {
        Duration::from_millis(self.transport.cancellable_timeout_ms)
    }

    /// Returns the supplied agent, building and caching one on first use.
    pub(crate) fn agent(&mut self) -> ureq::Agent {
        if let Some(agent) = &self.client {
            return agent.clone();
        }
        let agent = self.build_agent();
        self.client = Some(agent.clone());
        agent
    }

    fn build_agent(&mut self) -> ureq::Agent {
        let t = &self.transport;
        let mut builder = ureq::AgentBuilder::new()
            .max_idle_connections(t.max_idle_connections)
            .max_idle_connections_per_host(t.max_idle_connections_per_host)
            .redirects(t.redirects)
            .no_delay(t.no_delay);
        if let Some(ms) = t.connect_timeout_ms {
            builder = builder.timeout_connect(Duration::from_millis(ms));
        }
        if let Some(ms) = t.read_timeout_ms {
            builder = builder.timeout_read(Duration::from_millis(ms));
        }
        if let Some(ms) = t.write_timeout_ms {
            builder = builder.timeout_write(Duration::from_millis(ms));
        }
        if let Some(ua) = &t.user_agent {
            builder = builder.user_agent(ua);
        }
        if !self.timeout.is_zero() {
            builder = builder.timeout(self.timeout);
        }
        if let Some(store) = self.cookies.take() {
            builder = builder.cookie_store(store);
        }
        tracing::debug!(timeout = ?self.timeout, "constructed HTTP agent");
        builder.build()
    }
}
