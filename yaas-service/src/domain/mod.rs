//! # Domain Layer
//!
//! Framework-agnostic business entities and domain events for the
//! authentication engine: users, refresh tokens, flows, and actions.
//!
//! | Module     | Purpose                                           |
//! |------------|---------------------------------------------------|
//! | `entities` | Core domain entities mapped to database tables    |
//! | `events`   | Domain events emitted by the service layer        |

pub mod entities;
pub mod events;

pub use entities::*;
