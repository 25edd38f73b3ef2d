//! Dialog configuration.
//!
//! With Cargo feature `serde`, [`DialogConfig`] can be deserialized; keys
//! other than `url`, `bank` and `user_id` may be left out.

use crate::sans::segments::{
    dialog::DEFAULT_LANGUAGE, parameters::BankId, security::SECURITY_FUNCTION_PIN_TAN,
};

/// How a [`Dialog`](super::Dialog) identifies itself to a bank.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct DialogConfig {
    /// Address of the bank's server.
    pub url: String,
    pub bank: BankId,
    pub user_id: String,
    /// Defaults to the user id.
    #[cfg_attr(feature = "serde", serde(default))]
    pub customer_id: Option<String>,
    /// A client system id from an earlier synchronisation. Without one, the
    /// dialog synchronises before its first initialisation.
    #[cfg_attr(feature = "serde", serde(default))]
    pub client_system_id: Option<String>,
    #[cfg_attr(feature = "serde", serde(default = "default_product_name"))]
    pub product_name: String,
    #[cfg_attr(feature = "serde", serde(default = "default_product_version"))]
    pub product_version: String,
    #[cfg_attr(feature = "serde", serde(default = "default_security_function"))]
    pub security_function: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub language: u8,
}

fn default_product_name() -> String {
    env!("CARGO_PKG_NAME").into()
}

fn default_product_version() -> String {
    env!("CARGO_PKG_VERSION").into()
}

fn default_security_function() -> String {
    SECURITY_FUNCTION_PIN_TAN.into()
}

impl DialogConfig {
    pub fn new(url: impl Into<String>, bank: BankId, user_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bank,
            user_id: user_id.into(),
            customer_id: None,
            client_system_id: None,
            product_name: default_product_name(),
            product_version: default_product_version(),
            security_function: default_security_function(),
            language: DEFAULT_LANGUAGE,
        }
    }

    pub fn with_customer_id(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_client_system_id(mut self, client_system_id: impl Into<String>) -> Self {
        self.client_system_id = Some(client_system_id.into());
        self
    }

    pub fn with_product(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.product_name = name.into();
        self.product_version = version.into();
        self
    }

    pub fn with_security_function(mut self, security_function: impl Into<String>) -> Self {
        self.security_function = security_function.into();
        self
    }

    pub fn customer_id(&self) -> &str {
        self.customer_id.as_deref().unwrap_or(&self.user_id)
    }
}
