//! Use-case services over the row repository.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep host layers decoupled from storage details.

pub mod ignore_list_service;
