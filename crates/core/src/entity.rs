//! Identity shared by stored entities.

/// A persisted record with a stable, typed id.
pub trait Entity {
    /// Lowercase noun used in error messages and log fields.
    const KIND: &'static str;

    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    fn id(&self) -> &Self::Id;
}
