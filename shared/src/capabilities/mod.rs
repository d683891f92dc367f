//! Side-effecting seams of the core.
//!
//! The app talks to the shell only through the crux capabilities collected in
//! [`Capabilities`]. The native shell pieces live next to them: the HTTP
//! client, the retry policy around it, and the analyzer that ties them to the
//! inference service.

mod analyzer;
mod http;
mod inference;
mod retry;

pub use crux_core::render::Render;

pub use self::analyzer::{Analyzer, InferenceEndpoint};
pub use self::http::{HttpClient, HttpError, HttpResponse, HttpResult, ValidatedUrl, MAX_URL_LENGTH};
pub use self::inference::{Inference, InferenceOperation};
pub use self::retry::{
    generate_jitter, RetryConfig, RetryingTransport, TransportError, MALFORMED_REQUEST_STATUS,
};

#[cfg(feature = "native-client")]
pub use self::http::ReqwestClient;

use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub render: Render<Event>,
    pub inference: Inference<Event>,
}
