//! Application state management

use std::sync::Arc;

use crate::auth::{Authenticator, JwtKeys, Mailer, MemoryMailbox, PasswordHasher, SmtpMailer};
use crate::config::Config;
use crate::error::Result;
use crate::handlers::{ErrorMode, QueryPolicy};
use crate::models::{Booking, Review, Tour, User};
use crate::payments::{PaymentGateway, StripeGateway};
use crate::repository::{MemoryRepository, ModelSchema};

/// The four document collections
#[derive(Clone)]
pub struct Collections {
    pub tours: MemoryRepository,
    pub users: MemoryRepository,
    pub reviews: MemoryRepository,
    pub bookings: MemoryRepository,
}

impl Collections {
    /// Empty collections
    pub fn new() -> Self {
        Self {
            tours: MemoryRepository::new(ModelSchema::<Tour>::new()),
            users: MemoryRepository::new(ModelSchema::<User>::new()),
            reviews: MemoryRepository::new(ModelSchema::<Review>::new()),
            bookings: MemoryRepository::new(ModelSchema::<Booking>::new()),
        }
    }
}

impl Default for Collections {
    fn default() -> Self {
        Self::new()
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    collections: Collections,
    authenticator: Authenticator,
    hasher: PasswordHasher,
    mailer: Arc<dyn Mailer>,
    payments: Option<Arc<dyn PaymentGateway>>,
}

impl AppState {
    /// Create a builder for constructing AppState
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Document collections
    pub fn collections(&self) -> &Collections {
        &self.collections
    }

    /// Token guard
    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Token signing keys
    pub fn keys(&self) -> &JwtKeys {
        self.authenticator.keys()
    }

    /// Password hasher
    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// Outbound mail
    pub fn mailer(&self) -> &dyn Mailer {
        self.mailer.as_ref()
    }

    /// Payment gateway, absent when payments are not configured
    pub fn payments(&self) -> Option<&dyn PaymentGateway> {
        self.payments.as_deref()
    }

    /// Query limits from configuration
    pub fn query_policy(&self) -> QueryPolicy {
        QueryPolicy::from_config(&self.config.query)
    }

    /// Error rendering mode for the current environment
    pub fn error_mode(&self) -> ErrorMode {
        ErrorMode::for_environment(self.config.is_production())
    }
}

/// Builder for AppState
///
/// Collaborators that are not supplied are built from configuration: SMTP
/// when `email` is configured (an in-memory mailbox otherwise) and Stripe
/// when `payments` is configured.
#[derive(Default)]
pub struct AppStateBuilder {
    config: Option<Config>,
    collections: Option<Collections>,
    mailer: Option<Arc<dyn Mailer>>,
    payments: Option<Arc<dyn PaymentGateway>>,
}

impl AppStateBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Use existing collections
    pub fn collections(mut self, collections: Collections) -> Self {
        self.collections = Some(collections);
        self
    }

    /// Set the mailer
    pub fn mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Set the payment gateway
    pub fn payments(mut self, payments: Arc<dyn PaymentGateway>) -> Self {
        self.payments = Some(payments);
        self
    }

    /// Build the AppState
    pub fn build(self) -> Result<AppState> {
        let config = self.config.unwrap_or_default();
        let collections = self.collections.unwrap_or_default();

        let keys = JwtKeys::new(&config.jwt, config.is_production())?;
        let hasher = PasswordHasher::new(&config.password)?;

        let mailer: Arc<dyn Mailer> = match (self.mailer, &config.email) {
            (Some(mailer), _) => mailer,
            (None, Some(email)) => {
                tracing::info!(
                    host = %email.smtp_host,
                    port = email.smtp_port,
                    "SMTP mailer configured"
                );
                Arc::new(SmtpMailer::new(email)?)
            }
            (None, None) => {
                tracing::warn!("email not configured, outgoing messages are kept in memory");
                Arc::new(MemoryMailbox::new())
            }
        };

        let payments: Option<Arc<dyn PaymentGateway>> = match (self.payments, &config.payments) {
            (Some(payments), _) => Some(payments),
            (None, Some(settings)) => Some(Arc::new(StripeGateway::new(settings)?)),
            (None, None) => {
                tracing::info!("payments not configured, checkout is disabled");
                None
            }
        };

        Ok(AppState {
            authenticator: Authenticator::new(keys, collections.users.clone()),
            config: Arc::new(config),
            collections,
            hasher,
            mailer,
            payments,
        })
    }
}
