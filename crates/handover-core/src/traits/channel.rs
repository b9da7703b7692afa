// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel connector trait for provider API integrations.

use async_trait::async_trait;

use crate::error::HandoverError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Channel, ChannelCredential, OutboundReply};

/// One provider's outbound API surface.
///
/// A connector performs exactly one delivery or probe attempt and classifies
/// failures into [`HandoverError::ChannelSend`] (permanent) or
/// [`HandoverError::Transient`] (retryable). Retry policy lives in the
/// channel adapter's sender, not here.
#[async_trait]
pub trait ChannelConnector: PluginAdapter {
    /// The channel this connector serves.
    fn channel(&self) -> Channel;

    /// Delivers one reply using the given credential. Returns the
    /// provider-side message id.
    async fn deliver(
        &self,
        reply: &OutboundReply,
        credential: &ChannelCredential,
    ) -> Result<String, HandoverError>;

    /// Lightweight provider call confirming the credential is usable.
    /// Used by the verification scheduler.
    async fn probe(&self, credential: &ChannelCredential) -> Result<(), HandoverError>;
}
