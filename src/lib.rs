//! Acoustic feature extraction for voice gender classification.
//!
//! A clip is decoded to mono, windowed, and summarised into twenty named
//! statistics ([`features`]). The ordered vector can then be run through
//! externally fitted scaling, PCA and classifier artifacts ([`inference`]).

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod features;
pub mod inference;
pub mod types;

pub use error::{Result, VoiceError};
