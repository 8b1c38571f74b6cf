//! # Quiz & Recommendation Server Library
//!
//! Authoritative server core for the mathquest platform. It owns every
//! multiplayer quiz session, answers similarity queries over the concept
//! catalog, and exposes both over a UDP wire protocol.
//!
//! ## Core Responsibilities
//!
//! ### Session Coordination
//! All game sessions live inside a single `SessionCoordinator`: creation,
//! join/leave, readiness, starting, answer scoring, question advancement,
//! closing, and idle eviction. Sessions move through a forward-only state
//! machine (Waiting, Ready, Active, Finished) and callers only ever see
//! snapshots of internal state.
//!
//! ### Similarity Search
//! The `SimilarityEngine` keeps fixed-dimension concept embeddings in
//! insertion order and answers top-K cosine-similarity queries for both
//! semantic search and per-concept recommendations. A deterministic
//! `TextEmbedder` stands in for a production embedding model behind the
//! same contract.
//!
//! ### Knowledge Graph
//! Concepts and their typed connections live in a `GraphStore`; the
//! in-memory implementation defines the upsert-by-name semantics a real
//! graph backend must match.
//!
//! ## Architecture Design
//!
//! A single dispatch loop processes every incoming packet sequentially,
//! which preserves per-session message ordering without extra machinery.
//! Supporting tasks (receiver, sender, idle sweeper) communicate with the
//! loop over channels, and the cores sit behind `RwLock`s so the sweeper
//! and the loop can never observe each other's partial mutations.
//!
//! Scoring is decoupled from question progression: submitting an answer
//! never advances the question. Progression comes either from an explicit
//! advance request or from the dispatch loop's deadline tick, so timing
//! policy lives entirely outside the scoring invariants.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         5,                            // embedding dimension
//!         Duration::from_secs(600),     // idle session eviction
//!         Duration::from_secs(30),      // sweep interval
//!     ).await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod coordinator;
pub mod embedding;
pub mod graph;
pub mod network;
pub mod question;
pub mod session;
pub mod similarity;
pub mod vector;
