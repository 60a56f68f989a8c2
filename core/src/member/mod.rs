//! Participant entities: organizations, collaborations and users

mod model;

pub use model::{Collaboration, Organization, User};
