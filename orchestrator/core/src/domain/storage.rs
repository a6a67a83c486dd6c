// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};

/// Object bucket. Every bucket is encrypted at rest and blocks public access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSpec {
    /// What the bucket holds; surfaced as a stack output description
    pub purpose: String,
}

/// Generated credential stored in the secret store.
///
/// Only the generation recipe is modelled. The password is produced by the
/// provider under `password_key` and is read back at boot time by whoever was
/// granted access; it never appears in the model, the logs or a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretSpec {
    pub description: String,
    pub username: String,
    pub password_key: String,
    pub exclude_punctuation: bool,
}

impl SecretSpec {
    pub fn admin_credential(description: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            username: username.into(),
            password_key: "password".to_string(),
            exclude_punctuation: true,
        }
    }
}
