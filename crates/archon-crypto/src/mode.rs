use archon_types::ModeWatermark;
use serde::{Deserialize, Serialize};

/// H1 pattern (§4.4): two independent signals — `DEV_MODE` and
/// `ENVIRONMENT` — must agree before the process is allowed to sign
/// anything. A single env var is never sufficient to cross the
/// dev/production boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Production,
    Development,
}

impl Mode {
    pub fn watermark(self) -> ModeWatermark {
        match self {
            Mode::Production => ModeWatermark::Production,
            Mode::Development => ModeWatermark::DevStub,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ModeResolutionError {
    #[error(
        "DEV_MODE=true but ENVIRONMENT={0:?} names a production-like environment; refusing to start"
    )]
    DevModeEnvironmentMismatch(String),
}

const PRODUCTION_LIKE_ENVIRONMENTS: &[&str] = &["production", "staging", "prod"];

/// Resolves the signing mode from the two raw env-style flags. Fails fast
/// (`DevModeEnvironmentMismatch`) rather than guessing when the two signals
/// disagree, per §8.3 boundary behavior:
/// `DEV_MODE=true, ENVIRONMENT=production` must fail startup.
pub fn resolve_mode(dev_mode: bool, environment: &str) -> Result<Mode, ModeResolutionError> {
    let environment_lower = environment.to_lowercase();
    let is_production_like = PRODUCTION_LIKE_ENVIRONMENTS.contains(&environment_lower.as_str());

    if dev_mode && is_production_like {
        return Err(ModeResolutionError::DevModeEnvironmentMismatch(
            environment.to_string(),
        ));
    }

    Ok(if dev_mode {
        Mode::Development
    } else {
        Mode::Production
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_mode_in_production_fails_startup() {
        let result = resolve_mode(true, "production");
        assert_eq!(
            result,
            Err(ModeResolutionError::DevModeEnvironmentMismatch(
                "production".into()
            ))
        );
    }

    #[test]
    fn dev_mode_in_dev_environment_succeeds() {
        assert_eq!(resolve_mode(true, "development"), Ok(Mode::Development));
    }

    #[test]
    fn prod_mode_in_production_succeeds() {
        assert_eq!(resolve_mode(false, "production"), Ok(Mode::Production));
    }
}
