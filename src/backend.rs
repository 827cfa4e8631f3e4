use crate::ast::Program;
use crate::history::HistoryStore;
use crate::interpreter::RuntimeError;

/// Host runtime that executes an instrumented program.
///
/// `execute` runs `program` from a clean global namespace with `store` bound
/// as the target of every recorder statement, and returns the printed output.
pub trait Backend {
    fn name(&self) -> &'static str;
    fn execute(&self, program: &Program, store: &mut HistoryStore) -> Result<String, RuntimeError>;
}

pub fn backends() -> Vec<Box<dyn Backend>> {
    vec![Box::new(crate::interpreter::Interpreter::new())]
}

/// Looks a backend up by its `name`.
pub fn backend_by_name(name: &str) -> Option<Box<dyn Backend>> {
    backends().into_iter().find(|backend| backend.name() == name)
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn execute(&self, program: &Program, store: &mut HistoryStore) -> Result<String, RuntimeError> {
        (**self).execute(program, store)
    }
}
