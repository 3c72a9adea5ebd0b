//! Built-in scenario plugins

mod ddos;
mod noop;

pub use ddos::DdosPlugin;
pub use noop::NoopPlugin;

use simulation_core::PluginRegistry;

/// Register every built-in scenario
pub fn register_builtins(registry: &mut PluginRegistry) {
    registry.register(NoopPlugin::NAME, || Box::new(NoopPlugin));
    registry.register(DdosPlugin::NAME, || Box::new(DdosPlugin));
}

/// Registry holding only the built-in scenarios
pub fn builtin_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    register_builtins(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use simulation_core::Params;

    #[test]
    fn test_builtins_registered() {
        let registry = builtin_registry();
        assert_eq!(registry.names(), vec!["ddos".to_string(), "noop".to_string()]);
    }

    #[test]
    fn test_every_builtin_constructs() {
        let registry = builtin_registry();
        for name in registry.names() {
            let factory = registry.lookup(&name).unwrap();
            let plugin = factory();
            // ddos needs a target; noop accepts anything
            let mut params = Params::new();
            params.insert("target_ip".to_string(), "127.0.0.1:1".into());
            params.insert("duration".to_string(), 0.into());
            assert!(plugin.start(params).is_ok(), "{} failed to start", name);
        }
    }
}
