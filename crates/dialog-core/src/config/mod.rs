//! Configuration for the dialog manager
//!
//! ```rust
//! use sipflow_dialog_core::config::DialogManagerConfig;
//!
//! let config = DialogManagerConfig::new("client.atlanta.example.com:5060")
//!     .with_transport_name("TCP")
//!     .with_user_agent("sipflow/0.1");
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sipflow_sip_core::Uri;

use crate::errors::{DialogError, DialogResult};
pub use crate::transaction::timer::TimerSettings;

/// Settings for a [`DialogManager`](crate::manager::DialogManager)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogManagerConfig {
    /// RFC 3261 timer base values
    pub timers: TimerSettings,

    /// `host[:port]` written into the Via of outgoing requests
    pub sent_by: String,

    /// Transport token written into Via (`UDP`, `TCP`, `WS`, ...)
    pub transport_name: String,

    /// Contact and local target for dialogs; derived from `sent_by` when unset
    pub local_contact: Option<Uri>,

    /// User-Agent added to outgoing requests when set
    pub user_agent: Option<String>,

    /// Max-Forwards for outgoing requests
    pub max_forwards: u32,
}

impl Default for DialogManagerConfig {
    fn default() -> Self {
        Self {
            timers: TimerSettings::default(),
            sent_by: "localhost".to_string(),
            transport_name: "UDP".to_string(),
            local_contact: None,
            user_agent: None,
            max_forwards: 70,
        }
    }
}

impl DialogManagerConfig {
    pub fn new(sent_by: impl Into<String>) -> Self {
        Self {
            sent_by: sent_by.into(),
            ..Default::default()
        }
    }

    pub fn with_timers(mut self, timers: TimerSettings) -> Self {
        self.timers = timers;
        self
    }

    pub fn with_t1(mut self, t1: Duration) -> Self {
        self.timers.t1 = t1;
        self
    }

    pub fn with_transport_name(mut self, name: impl Into<String>) -> Self {
        self.transport_name = name.into().to_ascii_uppercase();
        self
    }

    pub fn with_local_contact(mut self, contact: Uri) -> Self {
        self.local_contact = Some(contact);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_max_forwards(mut self, hops: u32) -> Self {
        self.max_forwards = hops;
        self
    }

    /// Loads a configuration from TOML; durations are in milliseconds
    pub fn from_toml_str(text: &str) -> DialogResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| DialogError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DialogResult<()> {
        if self.timers.t1.is_zero() {
            return Err(DialogError::Config("T1 must be greater than zero".to_string()));
        }
        if self.timers.t2 < self.timers.t1 {
            return Err(DialogError::Config("T2 must not be shorter than T1".to_string()));
        }
        if self.sent_by.trim().is_empty() {
            return Err(DialogError::Config("sent_by must not be empty".to_string()));
        }
        if self.transport_name.trim().is_empty() {
            return Err(DialogError::Config("transport_name must not be empty".to_string()));
        }
        Ok(())
    }

    /// Contact URI for dialogs created by this manager
    pub fn contact_uri(&self) -> DialogResult<Uri> {
        match &self.local_contact {
            Some(uri) => Ok(uri.clone()),
            None => format!("sip:{}", self.sent_by)
                .parse()
                .map_err(|e: sipflow_sip_core::Error| DialogError::Config(e.to_string())),
        }
    }
}

/// Serde adapter storing a [`Duration`] as whole milliseconds
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
