#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]

//! Core library for the Bookwise CLI.
//!
//! `bookwise_core` provides:
//! - the search/analyze/recommend facade via [`assistant`]
//! - book metadata sources via [`catalog`]
//! - text completion adapters via [`providers`]
//! - prompt assembly via [`prompt`]
//! - shared HTTP plumbing via [`http`]
//! - shared configuration and record types via [`types`]
//!
//! # Quick Start
//!
//! ```no_run
//! use bookwise_core::assistant::Assistant;
//! use bookwise_core::catalog::StaticCatalog;
//! use bookwise_core::providers::MockProvider;
//! use bookwise_core::types::BookRecord;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = StaticCatalog::new().with_results(
//!     "artificial intelligence ethics",
//!     vec![BookRecord::new("Superintelligence").with_authors(["Nick Bostrom"])],
//! );
//! let assistant = Assistant::new(catalog, MockProvider);
//! let books = assistant.search("artificial intelligence ethics", 5).await?;
//! let answer = assistant
//!     .analyze(&books, "What ethical concerns do these books raise?")
//!     .await?;
//! assert!(answer.contains("1 book(s)"));
//! # Ok(())
//! # }
//! ```

pub mod assistant;
pub mod catalog;
pub mod http;
pub mod prompt;
pub mod providers;
pub mod types;
