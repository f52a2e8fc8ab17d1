//! Ownership resolution for code review.
//!
//! Parses per-directory ownership rule files ([`rules::OwnersFile`]), ranks
//! owners by directory proximity ([`index::OwnershipIndex`]), classifies
//! per-file approval status ([`approval`]), and searches for a minimal
//! reviewer set covering a group of files ([`suggest::ReviewerSuggester`]).
//!
//! Everything downstream of rule resolution is written against the
//! [`client::OwnersClient`] trait, so a local rule database and a remote
//! ranking service are interchangeable.

pub mod approval;
pub mod client;
pub mod index;
pub mod rules;
pub mod suggest;
