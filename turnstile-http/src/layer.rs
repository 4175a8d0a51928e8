//! Axum middleware enforcing the turnstile gate on protected routes.
//!
//! Apply a [`TurnstileLayer`] to the routes that require payment. For each
//! request the layer reads the credential and payment-proof headers, asks the
//! [`Gate`] for a decision, and then:
//!
//! - forwards admitted requests to the inner service, with the
//!   [`CredentialClaims`](turnstile::CredentialClaims) available as a request extension;
//! - adds the freshly minted credential to the response when a payment proof
//!   was redeemed;
//! - answers with a JSON challenge or rejection otherwise.
//!
//! ```rust,ignore
//! let ledger = RpcLedger::for_config(&config)?;
//! let gate = Gate::new(config, ledger);
//! let app = Router::new()
//!     .route("/api/data", get(handler))
//!     .layer(TurnstileLayer::new(gate));
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum_core::extract::Request;
use axum_core::response::Response;
use http::{HeaderMap, HeaderValue};
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service};
use turnstile::gate::{Gate, GateOutcome, GateRequest};
use turnstile::ledger::Ledger;
use turnstile::replay::{MemoryReplayGuard, ReplayGuard};

#[cfg(feature = "telemetry")]
use tracing::Instrument;

use crate::constants::{CREDENTIAL_HEADER, PAYMENT_PROOF_HEADER};
use crate::response::{attach_credential, challenge_response, rejection_response};

/// Layer wrapping services with a shared [`Gate`].
pub struct TurnstileLayer<L, G = MemoryReplayGuard> {
    gate: Arc<Gate<L, G>>,
}

impl<L, G> Clone for TurnstileLayer<L, G> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
        }
    }
}

impl<L: std::fmt::Debug, G: std::fmt::Debug> std::fmt::Debug for TurnstileLayer<L, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnstileLayer")
            .field("gate", &self.gate)
            .finish()
    }
}

impl<L, G> TurnstileLayer<L, G> {
    /// Creates a layer enforcing `gate`.
    #[must_use]
    pub fn new(gate: Gate<L, G>) -> Self {
        Self::shared(Arc::new(gate))
    }

    /// Creates a layer from a gate shared with other parts of the application.
    #[must_use]
    pub const fn shared(gate: Arc<Gate<L, G>>) -> Self {
        Self { gate }
    }

    /// Returns the gate enforced by this layer.
    #[must_use]
    pub fn gate(&self) -> &Gate<L, G> {
        &self.gate
    }
}

impl<S, L, G> Layer<S> for TurnstileLayer<L, G>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    type Service = TurnstileService<L, G>;

    fn layer(&self, inner: S) -> Self::Service {
        TurnstileService {
            gate: Arc::clone(&self.gate),
            inner: BoxCloneSyncService::new(inner),
        }
    }
}

/// Service enforcing the gate in front of an inner axum service.
#[allow(missing_debug_implementations)] // BoxCloneSyncService does not implement Debug
pub struct TurnstileService<L, G = MemoryReplayGuard> {
    gate: Arc<Gate<L, G>>,
    inner: BoxCloneSyncService<Request, Response, Infallible>,
}

impl<L, G> Clone for TurnstileService<L, G> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
            inner: self.inner.clone(),
        }
    }
}

impl<L, G> Service<Request> for TurnstileService<L, G>
where
    L: Ledger + 'static,
    G: ReplayGuard + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let gate = Arc::clone(&self.gate);
        let inner = self.inner.clone();

        Box::pin(async move {
            let outcome = {
                let headers = req.headers();
                let request = GateRequest {
                    credential: header_str(headers, CREDENTIAL_HEADER),
                    payment_proof: header_str(headers, PAYMENT_PROOF_HEADER),
                };
                gate.decide(&request).await
            };

            match outcome {
                GateOutcome::Admit { claims } => {
                    req.extensions_mut().insert(claims);
                    call_inner(inner, req).await
                }
                GateOutcome::AdmitAndIssue { credential, .. } => {
                    req.extensions_mut().insert(credential.claims);
                    let mut response = call_inner(inner, req).await?;
                    attach_credential(&mut response, &credential.token);
                    Ok(response)
                }
                GateOutcome::Reject(reason) => Ok(rejection_response(&reason)),
                GateOutcome::Challenge(challenge) => Ok(challenge_response(&challenge)),
            }
        })
    }
}

/// Returns a header value as a string, ignoring absent and non-visible-ASCII values.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).map(HeaderValue::to_str).and_then(Result::ok)
}

async fn call_inner(
    mut inner: BoxCloneSyncService<Request, Response, Infallible>,
    req: Request,
) -> Result<Response, Infallible> {
    #[cfg(feature = "telemetry")]
    {
        inner
            .call(req)
            .instrument(tracing::info_span!("inner"))
            .await
    }
    #[cfg(not(feature = "telemetry"))]
    {
        inner.call(req).await
    }
}
