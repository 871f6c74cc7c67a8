// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TPA configuration source trait.

use async_trait::async_trait;

use crate::error::EligoError;
use crate::types::TpaConfig;

/// Read access to a clinic's stored TPA configurations.
#[async_trait]
pub trait TpaConfigSource: Send + Sync + 'static {
    async fn tpa_configs(&self, clinic_id: &str) -> Result<Vec<TpaConfig>, EligoError>;
}
