#![forbid(unsafe_code)]

//! # retrieve-rank
//!
//! Typed async client for a hosted retrieve-and-rank service: search clusters,
//! configuration sets, collections, document indexing, search, and rankers.
//!
//! The interesting part is ranker training. [`training::TrainingDataGenerator`]
//! runs one scoring query per ground-truth row and stitches the returned
//! ranker-input fragments into a single training payload, which
//! [`RetrieveAndRankClient::create_ranker`] submits to the service.
//!
//! Every operation returns `Result<_, ClientError>`; every request is reported
//! to an injected [`CallObserver`].

pub mod client;
pub mod config;
pub mod error;
pub mod ground_truth;
pub mod observer;
pub mod training;
pub mod transport;

pub use client::{ClusterSize, DocumentSource, RetrieveAndRankClient};
pub use config::ServiceConfig;
pub use error::{ClientError, TransportError};
pub use ground_truth::{parse_ground_truth, read_ground_truth, GroundTruthRow};
pub use observer::{
    CallObserver, CallRecord, CallStatus, MemoryCallObserver, NoopCallObserver,
    TracingCallObserver,
};
pub use training::{QueryParameters, RowFailure, TrainingData, TrainingDataGenerator};
pub use transport::{
    Download, HttpMethod, HttpRequest, HttpResponse, MultipartPart, ReqwestTransport, Transport,
};
