//! Domain models for the sign-in pipeline.
//!
//! - [`credential`] - provider-specific raw credentials and the values
//!   derived from them before and after the backend exchange
//! - [`session`] - what a finished sign-in hands to the application

pub mod credential;
pub mod session;

pub use credential::{
    AppleCredential, FacebookCredential, FederatedIdentity, GoogleCredential, GraphPicture,
    GraphPictureData, GraphProfile, IdpAssertion, IdpToken, RawCredential, StoredAppleCredential,
};
pub use session::{SignInOutcome, SignInSession, secure_keys};
