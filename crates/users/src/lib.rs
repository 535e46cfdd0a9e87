//! Users domain module.
//!
//! A user owns a profile avatar uploaded through the two-stage flow
//! (`uploading → local → cloud | failed`).

pub mod user;

pub use user::{AVATAR_PREFIX, CreateUser, UpdateProfile, User};
