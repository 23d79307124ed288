//! Provider registry infrastructure macros.
//!
//! Used by `registry/` modules for auto-registration via `linkme`.

/// Implement registry infrastructure for a provider type: a static
/// `linkme` slice of named constructors, a `resolve_*` lookup, and a
/// `list_*` enumerator.
#[macro_export]
macro_rules! impl_registry {
    (
        provider_trait: $trait:path,
        config_type: $config:ty,
        entry_type: $entry:ident,
        slice_name: $slice:ident,
        resolve_fn: $resolve:ident,
        list_fn: $list:ident
    ) => {
        /// Registry entry for providers.
        pub struct $entry {
            /// Unique provider name.
            pub name: &'static str,
            /// Human-readable description.
            pub description: &'static str,
            /// Constructor function to create a provider instance.
            pub build: fn(&$config) -> std::result::Result<std::sync::Arc<dyn $trait>, String>,
        }

        #[linkme::distributed_slice]
        pub static $slice: [$entry] = [..];

        /// Resolve a provider by name from the registry.
        ///
        /// # Errors
        ///
        /// Returns a [`$crate::error::Error::Configuration`] if the name is
        /// unknown or the constructor fails.
        pub fn $resolve(
            name: &str,
            config: &$config,
        ) -> $crate::error::Result<std::sync::Arc<dyn $trait>> {
            for entry in $slice {
                if entry.name == name {
                    return (entry.build)(config).map_err($crate::error::Error::config);
                }
            }

            let available: Vec<&str> = $slice.iter().map(|e| e.name).collect();
            Err($crate::error::Error::config(format!(
                "unknown provider '{name}'. available providers: {available:?}"
            )))
        }

        /// List all registered providers.
        #[must_use]
        pub fn $list() -> Vec<(&'static str, &'static str)> {
            $slice.iter().map(|e| (e.name, e.description)).collect()
        }
    };
}

/// Variant of [`impl_registry`] for ports where every registered entry is
/// active simultaneously rather than selected by name — the priority
/// chain of text extraction engines (spec §4.8) being the motivating
/// case. `build_all` constructs one instance per registered entry,
/// skipping (and logging) any that fail to build instead of failing the
/// whole chain.
#[macro_export]
macro_rules! impl_chain_registry {
    (
        provider_trait: $trait:path,
        config_type: $config:ty,
        entry_type: $entry:ident,
        slice_name: $slice:ident,
        build_all_fn: $build_all:ident
    ) => {
        /// Registry entry for a chain member.
        pub struct $entry {
            /// Unique member name.
            pub name: &'static str,
            /// Human-readable description.
            pub description: &'static str,
            /// Constructor function to create an instance.
            pub build: fn(&$config) -> std::result::Result<std::sync::Arc<dyn $trait>, String>,
        }

        #[linkme::distributed_slice]
        pub static $slice: [$entry] = [..];

        /// Construct every registered chain member, skipping ones whose
        /// constructor fails (logged at `warn`, not propagated).
        #[must_use]
        pub fn $build_all(config: &$config) -> Vec<std::sync::Arc<dyn $trait>> {
            $slice
                .iter()
                .filter_map(|entry| match (entry.build)(config) {
                    Ok(instance) => Some(instance),
                    Err(err) => {
                        tracing::warn!(member = entry.name, error = %err, "chain member failed to build");
                        None
                    }
                })
                .collect()
        }
    };
}
