// Copyright (C) 2022-2024 Bridgeworks Developers.
//
// Bridgeworks is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Bridgeworks is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should receive a copy of the GNU General Public License
// If not, see <http://www.gnu.org/licenses/>.

use std::str::FromStr;

use ethereum_types::Secret;
use serde::Deserialize;

/// A raw secp256k1 signing key, loaded from config.
///
/// Accepted forms are a `0x`-prefixed 32 byte hex string or an `$ENV_VAR`
/// reference to one. The value never appears in `Debug` output and the
/// wrapper is deliberately not `Serialize`.
#[derive(Clone)]
pub struct PrivateKey(Secret);

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PrivateKey").finish()
    }
}

impl PrivateKey {
    /// Returns the raw 32 key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<Secret> for PrivateKey {
    fn from(secret: Secret) -> Self {
        PrivateKey(secret)
    }
}

impl std::ops::Deref for PrivateKey {
    type Target = Secret;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn resolve(value: &str) -> Result<Secret, String> {
    let raw = match value.strip_prefix('$') {
        Some(var) => {
            tracing::trace!("Reading {} from env", var);
            std::env::var(var)
                .map_err(|e| format!("error while loading this env {var}: {e}"))?
        }
        None => value.to_string(),
    };
    if !raw.starts_with("0x") {
        return Err(String::from(
            "expected a 0x-prefixed hex string or an $ENV_VAR",
        ));
    }
    Secret::from_str(&raw).map_err(|e| {
        format!(
            "{e}; got {} chars but expected a 66 chars string (including the 0x prefix)",
            raw.len()
        )
    })
}

impl<'de> Deserialize<'de> for PrivateKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        resolve(&value)
            .map(PrivateKey)
            .map_err(serde::de::Error::custom)
    }
}
