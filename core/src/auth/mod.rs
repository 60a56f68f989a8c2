//! Rule/scope-based authorization

mod evaluator;
mod rules;

pub use evaluator::{is_allowed, ResourceContext};
pub use rules::{Operation, Resource, Rule, Scope};
