//! Actor-based sampling engine
//!
//! A single sampler actor owns all mutable engine state and runs as an
//! independent async task. Hosts interact with it through a cloneable
//! [`sampler::EngineHandle`].
//!
//! ## Architecture Overview
//!
//! ```text
//!          ┌────────────────┐   commands (mpsc)   ┌──────────────┐
//!          │  EngineHandle  │ ──────────────────► │ SamplerActor │ ◄── interval timer
//!          └────────────────┘                     └──────┬───────┘
//!                  ▲                                     │
//!                  │ borrow()                            │
//!      ┌───────────┴──────────┐          ┌───────────────┴────────────┐
//!      │ watch: Arc<Snapshot> │ ◄─────── │ broadcast: EngineEvent     │
//!      │ watch: Arc<Vec<..>>  │          │ (alerts, failures, state)  │
//!      └──────────────────────┘          └────────────────────────────┘
//! ```
//!
//! ## Communication Patterns
//!
//! - **Commands**: mpsc with a oneshot responder per request
//! - **State**: watch channels; the whole snapshot is swapped on every tick
//! - **Events**: broadcast; slow subscribers may lag

pub mod messages;
pub mod sampler;
