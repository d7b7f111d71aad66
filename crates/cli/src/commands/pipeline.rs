//! Offline normalize and reconcile commands.
//!
//! Both read JSON documents from disk, run the same pure functions the
//! orchestrator uses and print the result. Nothing touches the network or
//! the database.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use social_signin::models::{FederatedIdentity, RawCredential};
use social_signin::{NormalizeError, ReconcileError};
use social_signin_core::{IdError, IdentityClaim, Uid, UserProfile};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid uid: {0}")]
    Uid(#[from] IdError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("Failed to write output: {0}")]
    Output(#[source] serde_json::Error),
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PipelineError> {
    let text = fs::read_to_string(path).map_err(|source| PipelineError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| PipelineError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Normalize a raw credential and print the claim.
///
/// Without `--federated` the backend is assumed to have returned nothing,
/// which is enough for Facebook and Apple but leaves Google claims without
/// their authoritative fields.
///
/// # Errors
///
/// Returns `PipelineError` if a file is unreadable or the credential is
/// rejected.
pub fn normalize(file: &Path, federated: Option<&Path>) -> Result<(), PipelineError> {
    let raw: RawCredential = read_json(file)?;
    let federated: FederatedIdentity = match federated {
        Some(path) => read_json(path)?,
        None => FederatedIdentity::default(),
    };

    let claim = social_signin::normalize(&raw, &federated)?;
    tracing::info!(provider = %claim.provider, "Credential normalized");
    super::emit(&claim).map_err(PipelineError::Output)
}

/// Reconcile a claim against an optional existing profile and print the
/// next profile.
///
/// # Errors
///
/// Returns `PipelineError` if a file is unreadable, the uid is blank or the
/// claim is invalid.
pub fn reconcile(claim: &Path, existing: Option<&Path>, uid: &str) -> Result<(), PipelineError> {
    let uid = Uid::parse(uid)?;
    let claim: IdentityClaim = read_json(claim)?;
    let existing: Option<UserProfile> = existing.map(read_json).transpose()?;

    let profile = social_signin::reconcile(&uid, &claim, existing.as_ref())?;
    tracing::info!(uid = %uid, created = existing.is_none(), "Profile reconciled");
    super::emit(&profile).map_err(PipelineError::Output)
}
