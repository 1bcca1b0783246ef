//! Search engine adapters and the static registry that dispatches to them.

mod bing;
mod duckduckgo;
mod google;
mod yandex;

pub use bing::Bing;
pub use duckduckgo::DuckDuckGo;
pub use google::Google;
pub use yandex::Yandex;

use crate::{EngineAdapter, EngineKind, Result};

/// Returns the adapter registered for `kind`.
pub fn adapter_for(kind: EngineKind) -> &'static dyn EngineAdapter {
    match kind {
        EngineKind::Google => &Google,
        EngineKind::Bing => &Bing,
        EngineKind::DuckDuckGo => &DuckDuckGo,
        EngineKind::Yandex => &Yandex,
    }
}

/// Resolves an engine by name. Unknown names are a configuration error.
pub fn adapter_named(name: &str) -> Result<&'static dyn EngineAdapter> {
    Ok(adapter_for(name.parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DorkError;

    #[test]
    fn test_registry_covers_every_engine() {
        for kind in EngineKind::ALL {
            assert_eq!(adapter_for(kind).kind(), kind);
        }
    }

    #[test]
    fn test_adapter_named() {
        assert_eq!(adapter_named("ddg").unwrap().kind(), EngineKind::DuckDuckGo);
        assert!(matches!(
            adapter_named("lycos"),
            Err(DorkError::UnknownEngine(_))
        ));
    }
}
