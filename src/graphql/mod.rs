//! GraphQL query assistance: parsing, schema validation, fuzzy field
//! suggestions, and template generation.
//!
//! Everything in this module is pure, synchronous computation over immutable
//! inputs. Network access lives in `client`; the current schema snapshot is
//! passed in by reference.

pub mod parser;
pub mod suggest;
pub mod template;
pub mod validator;

pub use parser::{parse_query, Argument, ParseError, SelectionNode};
pub use suggest::{suggest, Suggestion, SUGGESTION_LIMIT};
pub use template::{generate_template, TemplateResult};
pub use validator::{validate, validate_text, IssueKind, ValidationIssue, ValidationReport};
