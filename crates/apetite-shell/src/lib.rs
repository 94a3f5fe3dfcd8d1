//! `apetite-shell` - Page-side controllers for the Meu Apetite runtime
//!
//! This crate provides the page side of the offline and push subsystem:
//! worker registration and push subscription, the install-prompt state
//! machine, the audio relay for notification sounds, page-local preferences,
//! the visitor session, the REST boundary client, and the `apetite` CLI.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod api;
pub mod audio;
pub mod cli;
pub mod install;
pub mod prefs;
pub mod registration;
pub mod session;

pub use api::{ApiClient, ApiError, Credentials};
pub use audio::{relay_audio, AudioError, AudioSink, NullAudioSink};
pub use install::{
    DeferredPrompt, InstallError, InstallOutcome, InstallPromptController, InstallState,
    PromptChoice,
};
pub use prefs::{PrefStore, PrefsError, PREF_INSTALL_BANNER_DISMISSED, PREF_LANGUAGE};
pub use registration::{
    AlwaysGranted, HostCapabilities, NotificationPermission, Permissions,
    PushRegistrationController, RegistrationStatus,
};
pub use session::VisitorSession;
