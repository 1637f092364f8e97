/// Validates that an agent's `class_path` names a construction recipe the
/// running binary actually knows how to build.
///
/// This replaces dynamic, dotted-path class loading: there is no runtime
/// import step, only a lookup against a static table the binary compiled in.
/// Implementations live one layer up (in `conduit-agent`), which is the crate
/// that actually knows how to construct agents and leaders; the catalog only
/// needs to know whether a name is recognized.
pub trait AgentLoader: Send + Sync {
    /// Returns `true` if `class_path` is a construction key this binary
    /// recognizes.
    fn is_known(&self, class_path: &str) -> bool;

    /// All recognized construction keys, for diagnostics and the settings UI.
    fn known_classes(&self) -> Vec<&'static str>;
}

/// A loader that recognizes nothing. Useful as a placeholder before the real
/// agent-construction registry is wired in, and in catalog-only unit tests.
#[derive(Default)]
pub struct EmptyAgentLoader;

impl AgentLoader for EmptyAgentLoader {
    fn is_known(&self, _class_path: &str) -> bool {
        false
    }

    fn known_classes(&self) -> Vec<&'static str> {
        Vec::new()
    }
}
