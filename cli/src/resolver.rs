//! Interactive rename resolution
//!
//! Configured and `--rename` hints are applied first. Anything they leave
//! open is put to the operator one pair at a time.

use std::collections::BTreeSet;

use driftless_migrations::resolver::needs_confirmation;
use driftless_migrations::{
    Candidate, Decision, DeterministicResolver, EntityKey, EntityKind, RenameResolver,
    ResolveError,
};
use inquire::{Confirm, InquireError};

/// Yes/no question source
pub trait Prompt {
    fn confirm(&mut self, message: &str) -> Result<bool, ResolveError>;
}

/// Terminal prompt backed by `inquire`
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn confirm(&mut self, message: &str) -> Result<bool, ResolveError> {
        Confirm::new(message)
            .with_default(false)
            .prompt()
            .map_err(|e| match e {
                InquireError::OperationCanceled | InquireError::OperationInterrupted => {
                    ResolveError::Cancelled
                }
                other => ResolveError::Prompt(other.to_string()),
            })
    }
}

/// Asks the operator about every drop/create pair no hint explains
pub struct InteractiveResolver<P = TerminalPrompt> {
    hints: DeterministicResolver,
    prompt: P,
    declined: BTreeSet<(EntityKey, EntityKey)>,
}

impl InteractiveResolver {
    pub fn new(hints: DeterministicResolver) -> Self {
        Self::with_prompt(hints, TerminalPrompt)
    }
}

impl<P: Prompt> InteractiveResolver<P> {
    pub fn with_prompt(hints: DeterministicResolver, prompt: P) -> Self {
        Self {
            hints,
            prompt,
            declined: BTreeSet::new(),
        }
    }
}

impl<P: Prompt> RenameResolver for InteractiveResolver<P> {
    fn resolve(
        &mut self,
        kind: EntityKind,
        deleted: &[Candidate],
        created: &[Candidate],
    ) -> Result<Decision, ResolveError> {
        let decision = self.hints.resolve(kind, deleted, created)?;
        if decision != Decision::NoRename || !needs_confirmation(kind) {
            return Ok(decision);
        }

        for to in created {
            for from in deleted {
                let pair = (from.original.clone(), to.key.clone());
                if self.declined.contains(&pair) {
                    continue;
                }
                let message = format!(
                    "Is {} '{}' a rename of '{}'?",
                    kind,
                    to.key.qualified(),
                    from.display_name()
                );
                if self.prompt.confirm(&message)? {
                    tracing::debug!(kind = %kind, from = %from.display_name(), "rename confirmed");
                    return Ok(Decision::Rename {
                        from: pair.0,
                        to: pair.1,
                    });
                }
                self.declined.insert(pair);
            }
        }
        Ok(Decision::NoRename)
    }
}
