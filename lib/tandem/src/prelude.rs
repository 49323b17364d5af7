//! Prelude module for convenient imports.
//!
//! ```ignore
//! use tandem::prelude::*;
//! ```

pub use crate::{
    Call, CallbackExecutor, Client, ClientBuilder, ClientConfig, Decoder, Error, FailureKind,
    FileAttachment, Json, JsonWith, KeyPolicy, Method, Request, Response, Result, TrustPolicy,
};
pub use serde::{Deserialize, Serialize};
