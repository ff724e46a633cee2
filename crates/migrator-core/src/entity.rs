//! The entity contract.

/// A record that can be migrated between two stores.
///
/// Implemented per concrete record type. Equality is explicit rather than
/// derived so that bookkeeping columns that legitimately differ between the
/// stores (for example a surrogate column only the new schema has) can be
/// left out of the comparison.
///
/// # Example
///
/// ```
/// use migrator_core::Entity;
///
/// #[derive(Debug, Clone)]
/// struct Article {
///     id: i64,
///     title: String,
///     utime: i64,
/// }
///
/// impl Entity for Article {
///     fn id(&self) -> i64 {
///         self.id
///     }
///
///     fn utime(&self) -> i64 {
///         self.utime
///     }
///
///     fn equals(&self, other: &Self) -> bool {
///         self.id == other.id && self.title == other.title && self.utime == other.utime
///     }
/// }
///
/// let a = Article { id: 1, title: "a".into(), utime: 10 };
/// assert!(a.equals(&a.clone()));
/// ```
pub trait Entity: Clone + Send + Sync + 'static {
    /// Stable primary key. Never changes once assigned.
    fn id(&self) -> i64;

    /// Last modification time in epoch milliseconds.
    ///
    /// Writers must advance it on every change; incremental validation
    /// relies on it as a watermark.
    fn utime(&self) -> i64;

    /// Compare the migration-relevant columns of two records.
    ///
    /// Must be reflexive, symmetric and transitive.
    fn equals(&self, other: &Self) -> bool;
}
