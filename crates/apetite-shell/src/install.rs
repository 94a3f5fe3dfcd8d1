//! Install-prompt state machine.
//!
//! The platform decides when the app may be installed and hands the page a
//! deferred prompt. The controller retains it, suppresses the platform's own
//! banner, and shows it on demand. A prompt is single-use: once consumed the
//! controller is back to not-installable until the platform offers another.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::prefs::{PrefStore, PREF_INSTALL_BANNER_DISMISSED};

/// Errors from the platform install prompt.
#[derive(Debug, Error)]
pub enum InstallError {
    /// The platform prompt could not be shown.
    #[error("install prompt failed: {0}")]
    Prompt(String),
}

/// Installability state of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    /// No prompt has been offered.
    NotInstallable,
    /// A prompt is retained and can be shown.
    Installable,
    /// The app is installed.
    Installed,
    /// The user dismissed the prompt.
    Dismissed,
}

impl std::fmt::Display for InstallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInstallable => write!(f, "not installable"),
            Self::Installable => write!(f, "installable"),
            Self::Installed => write!(f, "installed"),
            Self::Dismissed => write!(f, "dismissed"),
        }
    }
}

/// The user's choice on a shown prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChoice {
    /// The user accepted the install.
    Accepted,
    /// The user dismissed the prompt.
    Dismissed,
}

/// Outcome of an install attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The user accepted; the app is installed.
    Installed,
    /// The user dismissed the prompt.
    Dismissed,
    /// No usable prompt was available.
    Unavailable,
}

/// A deferred install prompt retained from the platform.
#[async_trait]
pub trait DeferredPrompt: Send {
    /// Show the prompt and wait for the user's choice.
    async fn prompt(&mut self) -> std::result::Result<PromptChoice, InstallError>;
}

/// Owns the retained prompt and the installability state.
pub struct InstallPromptController {
    state: InstallState,
    standalone: bool,
    prompt: Option<Box<dyn DeferredPrompt>>,
}

impl InstallPromptController {
    /// Create a controller for a page launched in the given display mode.
    ///
    /// A standalone launch means the app is already installed; the
    /// controller starts `Installed` and ignores prompt offers.
    #[must_use]
    pub fn new(standalone: bool) -> Self {
        let state = if standalone {
            debug!("Launched standalone, app is installed");
            InstallState::Installed
        } else {
            InstallState::NotInstallable
        };
        Self {
            state,
            standalone,
            prompt: None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> InstallState {
        self.state
    }

    /// Whether the page was launched standalone.
    #[must_use]
    pub fn is_standalone(&self) -> bool {
        self.standalone
    }

    /// Whether an install can be attempted right now.
    #[must_use]
    pub fn can_install(&self) -> bool {
        self.state == InstallState::Installable && self.prompt.is_some()
    }

    /// Retain a deferred prompt offered by the platform.
    ///
    /// Ignored when launched standalone or already installed.
    pub fn retain_prompt(&mut self, prompt: Box<dyn DeferredPrompt>) {
        if self.standalone || self.state == InstallState::Installed {
            debug!("Ignoring install prompt offer, app is installed");
            return;
        }
        debug!("Install prompt retained");
        self.prompt = Some(prompt);
        self.state = InstallState::Installable;
    }

    /// Show the retained prompt and wait for the user's choice.
    ///
    /// With no retained prompt this is a negative outcome, not an error;
    /// the same goes for a prompt that fails to show. Either way the
    /// retained prompt is consumed.
    pub async fn install(&mut self) -> InstallOutcome {
        let Some(mut prompt) = self.prompt.take() else {
            debug!("Install requested with no retained prompt");
            return InstallOutcome::Unavailable;
        };

        match prompt.prompt().await {
            Ok(PromptChoice::Accepted) => {
                info!("Install prompt accepted");
                self.state = InstallState::Installed;
                InstallOutcome::Installed
            }
            Ok(PromptChoice::Dismissed) => {
                info!("Install prompt dismissed");
                self.state = InstallState::Dismissed;
                InstallOutcome::Dismissed
            }
            Err(e) => {
                warn!("Install prompt failed: {}", e);
                self.state = InstallState::NotInstallable;
                InstallOutcome::Unavailable
            }
        }
    }

    /// Handle the platform reporting the app installed.
    ///
    /// Forces the state to `Installed`, drops any retained prompt, and
    /// clears the persisted banner-dismissed preference so a later
    /// uninstall shows the banner again.
    pub fn handle_app_installed(&mut self, prefs: &mut PrefStore) {
        info!("App installed");
        self.state = InstallState::Installed;
        self.prompt = None;
        match prefs.remove(PREF_INSTALL_BANNER_DISMISSED) {
            Ok(true) => debug!("Cleared dismissed install banner preference"),
            Ok(false) => {}
            Err(e) => warn!("Failed to clear install banner preference: {}", e),
        }
    }
}

impl std::fmt::Debug for InstallPromptController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallPromptController")
            .field("state", &self.state)
            .field("standalone", &self.standalone)
            .field("has_prompt", &self.prompt.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestPrompt {
        answer: Option<std::result::Result<PromptChoice, InstallError>>,
    }

    impl TestPrompt {
        fn accepting() -> Box<Self> {
            Box::new(Self {
                answer: Some(Ok(PromptChoice::Accepted)),
            })
        }

        fn dismissing() -> Box<Self> {
            Box::new(Self {
                answer: Some(Ok(PromptChoice::Dismissed)),
            })
        }

        fn failing() -> Box<Self> {
            Box::new(Self {
                answer: Some(Err(InstallError::Prompt("gesture required".to_string()))),
            })
        }
    }

    #[async_trait]
    impl DeferredPrompt for TestPrompt {
        async fn prompt(&mut self) -> std::result::Result<PromptChoice, InstallError> {
            self.answer.take().expect("prompt shown twice")
        }
    }

    fn temp_prefs(name: &str) -> PrefStore {
        let path = std::env::temp_dir().join(format!(
            "apetite-install-{}-{}.json",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        PrefStore::open(path).unwrap()
    }

    #[test]
    fn test_install_state_display() {
        assert_eq!(InstallState::NotInstallable.to_string(), "not installable");
        assert_eq!(InstallState::Installable.to_string(), "installable");
        assert_eq!(InstallState::Installed.to_string(), "installed");
        assert_eq!(InstallState::Dismissed.to_string(), "dismissed");
    }

    #[test]
    fn test_standalone_launch_is_installed() {
        let controller = InstallPromptController::new(true);
        assert_eq!(controller.state(), InstallState::Installed);
        assert!(!controller.can_install());
    }

    #[test]
    fn test_standalone_ignores_prompt_offers() {
        let mut controller = InstallPromptController::new(true);
        controller.retain_prompt(TestPrompt::accepting());
        assert_eq!(controller.state(), InstallState::Installed);
        assert!(!controller.can_install());
    }

    #[test]
    fn test_retained_prompt_makes_installable() {
        let mut controller = InstallPromptController::new(false);
        assert_eq!(controller.state(), InstallState::NotInstallable);

        controller.retain_prompt(TestPrompt::accepting());
        assert_eq!(controller.state(), InstallState::Installable);
        assert!(controller.can_install());
    }

    #[tokio::test]
    async fn test_install_without_prompt_is_unavailable() {
        let mut controller = InstallPromptController::new(false);
        let outcome = controller.install().await;
        assert_eq!(outcome, InstallOutcome::Unavailable);
        assert_eq!(controller.state(), InstallState::NotInstallable);
    }

    #[tokio::test]
    async fn test_install_accepted() {
        let mut controller = InstallPromptController::new(false);
        controller.retain_prompt(TestPrompt::accepting());

        let outcome = controller.install().await;
        assert_eq!(outcome, InstallOutcome::Installed);
        assert_eq!(controller.state(), InstallState::Installed);

        // The prompt was consumed
        assert!(!controller.can_install());
        assert_eq!(controller.install().await, InstallOutcome::Unavailable);
    }

    #[tokio::test]
    async fn test_install_dismissed() {
        let mut controller = InstallPromptController::new(false);
        controller.retain_prompt(TestPrompt::dismissing());

        let outcome = controller.install().await;
        assert_eq!(outcome, InstallOutcome::Dismissed);
        assert_eq!(controller.state(), InstallState::Dismissed);
        assert!(!controller.can_install());
    }

    #[tokio::test]
    async fn test_prompt_failure_is_negative_outcome() {
        let mut controller = InstallPromptController::new(false);
        controller.retain_prompt(TestPrompt::failing());

        let outcome = controller.install().await;
        assert_eq!(outcome, InstallOutcome::Unavailable);
        assert_eq!(controller.state(), InstallState::NotInstallable);
    }

    #[tokio::test]
    async fn test_new_offer_after_dismissal() {
        let mut controller = InstallPromptController::new(false);
        controller.retain_prompt(TestPrompt::dismissing());
        controller.install().await;
        assert_eq!(controller.state(), InstallState::Dismissed);

        controller.retain_prompt(TestPrompt::accepting());
        assert_eq!(controller.state(), InstallState::Installable);
        assert_eq!(controller.install().await, InstallOutcome::Installed);
    }

    #[test]
    fn test_app_installed_clears_banner_preference() {
        let mut prefs = temp_prefs("banner");
        prefs.set(PREF_INSTALL_BANNER_DISMISSED, "true").unwrap();

        let mut controller = InstallPromptController::new(false);
        controller.retain_prompt(TestPrompt::accepting());
        controller.handle_app_installed(&mut prefs);

        assert_eq!(controller.state(), InstallState::Installed);
        assert!(!controller.can_install());
        assert!(!prefs.contains(PREF_INSTALL_BANNER_DISMISSED));

        let _ = std::fs::remove_file(prefs.path());
    }

    #[test]
    fn test_app_installed_with_clean_prefs() {
        let mut prefs = temp_prefs("clean");
        let mut controller = InstallPromptController::new(false);
        controller.handle_app_installed(&mut prefs);
        assert_eq!(controller.state(), InstallState::Installed);
    }
}
