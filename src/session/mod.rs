//! Tutoring session orchestration
//!
//! A `TutorSession` wires the pipeline together for one user: capture →
//! encode → upload → transcript, transcript → chat → reply, reply →
//! synthesized speech. It also owns the conversation history.

mod session;

pub use session::TutorSession;
