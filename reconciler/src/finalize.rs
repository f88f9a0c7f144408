use remote_settings::RemoteSettingsClient;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Deployment the collection lives in.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Stage,
    Prod,
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("unknown environment {0:?}, expected one of: dev, stage, prod")]
pub struct UnknownEnvironment(pub String);

impl Environment {
    pub const ALL: [Environment; 3] = [Environment::Dev, Environment::Stage, Environment::Prod];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Stage => "stage",
            Environment::Prod => "prod",
        }
    }

    /// Whether the writer may sign its own changes here.
    pub fn self_approves(&self) -> bool {
        matches!(self, Environment::Dev)
    }
}

impl FromStr for Environment {
    type Err = UnknownEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Environment::ALL
            .into_iter()
            .find(|env| env.as_str() == s)
            .ok_or_else(|| UnknownEnvironment(s.to_string()))
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publishes the applied changes: approves them directly where that is
/// allowed, otherwise asks for review.
///
/// Failures are logged and swallowed. The records are already written at this
/// point and an operator can re-trigger the review by hand.
pub async fn finalize(client: &RemoteSettingsClient, environment: Option<Environment>) {
    let self_approves = environment.is_some_and(|env| env.self_approves());

    let result = if self_approves {
        client.approve().await
    } else {
        client.request_review().await
    };

    match result {
        Ok(true) if self_approves => tracing::info!("Changes approved"),
        Ok(true) => tracing::info!("Review requested"),
        Ok(false) => {
            tracing::error!(
                environment = environment.map(|env| env.as_str()),
                "Collection was not moved to {}",
                if self_approves { "signing" } else { "review" }
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to finalize collection changes");
        }
    }
}
