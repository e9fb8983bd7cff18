// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::{Request, Response, Result, StreamEvent};

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// The polymorphic provider surface.
///
/// The original runtime exposed a cooperative descriptor driver
/// (`fdset`/`perform`/`timeout`/`info_read`); under tokio those four calls
/// collapse into the executor, and completion callbacks become items on the
/// returned [`EventStream`].  What remains provider-specific is request
/// serialisation, stream parsing, and cancellation.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Static provider name for status display and registry lookups.
    fn name(&self) -> &'static str;

    /// Issue a non-streaming request and wait for the parsed response.
    async fn start_request(&self, req: &Request) -> Result<Response>;

    /// Issue a streaming request.  Events are yielded in arrival order; the
    /// stream ends after `Done` or `Error`, or early when cancelled.
    async fn start_stream(&self, req: &Request) -> Result<EventStream>;

    /// Request cancellation of all in-flight transfers.
    ///
    /// Async-signal-safe by contract: implementations may only flip atomic
    /// flags read by the streaming loop — no allocation, no locks.
    fn cancel(&self);
}
