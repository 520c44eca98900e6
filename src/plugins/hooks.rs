//! Load-gating hook chain
//!
//! An ordered sequence of named predicates the host consults before a load
//! proceeds. Policy is deny-wins: the first predicate saying no ends
//! evaluation, there is no voting or aggregation.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::application::errors::PluginError;

/// What a predicate gets to look at
#[derive(Debug, Clone)]
pub struct HookContext {
    pub plugin_id: String,
}

/// Outcome of evaluating the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookVerdict {
    Pass,
    Blocked { hook: String },
}

type HookPredicate = Box<dyn Fn(&HookContext) -> bool + Send + Sync>;

struct NamedHook {
    name: String,
    predicate: HookPredicate,
}

/// Registration-ordered chain with unique hook names
#[derive(Default)]
pub struct HookChain {
    hooks: Vec<NamedHook>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, predicate: F) -> Result<(), PluginError>
    where
        F: Fn(&HookContext) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        if self.hooks.iter().any(|h| h.name == name) {
            return Err(PluginError::DuplicateHook(name));
        }
        self.hooks.push(NamedHook {
            name,
            predicate: Box::new(predicate),
        });
        Ok(())
    }

    /// Run predicates in registration order; the first `false` short-circuits.
    /// A panicking predicate counts as a rejection by that hook and never
    /// unwinds into the host.
    pub fn evaluate(&self, ctx: &HookContext) -> HookVerdict {
        for hook in &self.hooks {
            let passed = catch_unwind(AssertUnwindSafe(|| (hook.predicate)(ctx)));
            match passed {
                Ok(true) => continue,
                Ok(false) => {
                    return HookVerdict::Blocked {
                        hook: hook.name.clone(),
                    }
                }
                Err(_) => {
                    tracing::error!("load hook '{}' panicked, treating as rejection", hook.name);
                    return HookVerdict::Blocked {
                        hook: hook.name.clone(),
                    };
                }
            }
        }
        HookVerdict::Pass
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn ctx() -> HookContext {
        HookContext {
            plugin_id: "nami-plugin-ping".to_string(),
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut chain = HookChain::new();
        chain.register("policy", |_| true).unwrap();
        assert!(matches!(
            chain.register("policy", |_| true),
            Err(PluginError::DuplicateHook(_))
        ));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn first_rejection_short_circuits() {
        let a_ran = Arc::new(AtomicBool::new(false));
        let c_ran = Arc::new(AtomicBool::new(false));

        let mut chain = HookChain::new();
        let a = a_ran.clone();
        chain
            .register("a", move |_| {
                a.store(true, Ordering::SeqCst);
                true
            })
            .unwrap();
        chain.register("b", |_| false).unwrap();
        let c = c_ran.clone();
        chain
            .register("c", move |_| {
                c.store(true, Ordering::SeqCst);
                true
            })
            .unwrap();

        assert_eq!(
            chain.evaluate(&ctx()),
            HookVerdict::Blocked {
                hook: "b".to_string()
            }
        );
        assert!(a_ran.load(Ordering::SeqCst));
        assert!(!c_ran.load(Ordering::SeqCst));
    }

    #[test]
    fn all_passing_hooks_yield_pass() {
        let mut chain = HookChain::new();
        chain.register("a", |_| true).unwrap();
        chain.register("b", |_| true).unwrap();
        assert_eq!(chain.evaluate(&ctx()), HookVerdict::Pass);
    }

    #[test]
    fn panicking_predicate_is_a_rejection() {
        let mut chain = HookChain::new();
        chain
            .register("broken", |_| panic!("predicate bug"))
            .unwrap();
        assert_eq!(
            chain.evaluate(&ctx()),
            HookVerdict::Blocked {
                hook: "broken".to_string()
            }
        );
    }
}
